use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// At most one top-level detection run in flight per page.
#[derive(Debug, Clone, Default)]
pub struct DetectionGuard {
    in_flight: Arc<AtomicBool>,
}

impl DetectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a run is already in flight; the caller's request is coalesced.
    pub fn try_acquire(&self) -> Option<DetectionToken> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DetectionToken {
                in_flight: self.in_flight.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; released on drop, including on early return.
#[derive(Debug)]
pub struct DetectionToken {
    in_flight: Arc<AtomicBool>,
}

impl Drop for DetectionToken {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let guard = DetectionGuard::new();
        let token = guard.try_acquire().unwrap();
        assert!(guard.is_running());
        assert!(guard.clone().try_acquire().is_none());
        drop(token);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }
}
