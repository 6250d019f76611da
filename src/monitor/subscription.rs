use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Callback invoked for each delivered event.
pub type Sink<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A source of events a host adapter feeds (subtree changes, network exchanges).
pub trait Feed<T>: Send + Sync {
    fn subscribe(&self, sink: Sink<T>) -> Subscription;
}

/// Handle returned by every subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the subscription alive for as long as the source lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct SubscriberList<T> {
    next_id: u64,
    entries: Vec<(u64, Sink<T>)>,
}

/// Fan-out list of sinks.
pub struct Subscribers<T> {
    inner: Arc<Mutex<SubscriberList<T>>>,
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SubscriberList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, sink: Sink<T>) -> Subscription {
        let id = {
            let mut list = self.inner.lock();
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, sink));
            id
        };

        let weak: Weak<Mutex<SubscriberList<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(list) = weak.upgrade() {
                list.lock().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Deliver `event` to every sink. Sinks run outside the lock so they may
    /// subscribe or unsubscribe re-entrantly.
    pub fn emit(&self, event: &T) {
        let sinks: Vec<Sink<T>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in sinks {
            sink(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process feed: the host pushes events with `publish`.
pub struct ManualFeed<T> {
    subscribers: Subscribers<T>,
}

impl<T: 'static> ManualFeed<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Subscribers::new(),
        }
    }

    pub fn publish(&self, event: T) {
        self.subscribers.emit(&event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: 'static> Default for ManualFeed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Feed<T> for ManualFeed<T> {
    fn subscribe(&self, sink: Sink<T>) -> Subscription {
        self.subscribers.subscribe(sink)
    }
}
