use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::multi_step::MultiStepWeights;

/// One scoring round: wait `delay_ms` after the previous pass, then keep
/// candidates scoring at least `threshold` (a fraction of the score scale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPass {
    pub name: String,
    pub delay_ms: u64,
    pub threshold: f64,
    /// Use the multi-lens scan instead of the primary scorer.
    #[serde(default)]
    pub broad: bool,
}

impl DetectionPass {
    pub fn new(name: &str, delay_ms: u64, threshold: f64) -> Self {
        Self {
            name: name.to_string(),
            delay_ms,
            threshold,
            broad: false,
        }
    }

    pub fn broad(mut self) -> Self {
        self.broad = true;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn is_immediate(&self) -> bool {
        self.delay_ms == 0
    }
}

pub fn default_passes() -> Vec<DetectionPass> {
    vec![
        DetectionPass::new("immediate", 0, 0.8),
        DetectionPass::new("fast", 500, 0.7),
        DetectionPass::new("medium", 1500, 0.6),
        DetectionPass::new("thorough", 3000, 0.5),
        DetectionPass::new("final", 5000, 0.4).broad(),
    ]
}

/// Orchestrator tuning. Every magnitude is configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub passes: Vec<DetectionPass>,
    pub quiet_window_ms: u64,
    /// Per-pass stability wait is `min(stability_cap_ms, delay + stability_slack_ms)`.
    pub stability_cap_ms: u64,
    pub stability_slack_ms: u64,
    /// A pass replaces the best result when its aggregate beats it by more than this.
    pub adoption_margin: f64,
    /// ...or when it finds at least this many times as many candidates.
    pub growth_ratio: f64,
    /// Stop once a schema was captured and the mean score exceeds this.
    pub schema_mean_score: f64,
    pub strong_candidate_count: usize,
    pub strong_score: f64,
    pub strong_required: usize,
    pub thorough_pass: String,
    pub thorough_min_candidates: usize,
    pub thorough_mean_score: f64,
    pub multi_step: MultiStepWeights,
    pub debounce_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_attempts: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            passes: default_passes(),
            quiet_window_ms: 1000,
            stability_cap_ms: 2000,
            stability_slack_ms: 1000,
            adoption_margin: 5.0,
            growth_ratio: 1.5,
            schema_mean_score: 70.0,
            strong_candidate_count: 5,
            strong_score: 80.0,
            strong_required: 3,
            thorough_pass: "thorough".to_string(),
            thorough_min_candidates: 2,
            thorough_mean_score: 60.0,
            multi_step: MultiStepWeights::default(),
            debounce_ms: 300,
            retry_backoff_ms: 2000,
            max_attempts: 3,
        }
    }
}

impl DetectionConfig {
    /// Upper bound on the stability wait before `pass` scores.
    pub fn stability_bound(&self, pass: &DetectionPass) -> Duration {
        Duration::from_millis(self.stability_cap_ms.min(pass.delay_ms + self.stability_slack_ms))
    }

    /// Only the first, immediate pass.
    pub fn immediate_only(mut self) -> Self {
        self.passes.truncate(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_run_slower_and_looser() {
        let passes = default_passes();
        assert!(passes.windows(2).all(|w| w[0].delay_ms < w[1].delay_ms));
        assert!(passes.windows(2).all(|w| w[0].threshold > w[1].threshold));
        assert!(passes.last().unwrap().broad);
    }

    #[test]
    fn stability_bound_is_capped() {
        let config = DetectionConfig::default();
        let passes = default_passes();
        assert_eq!(config.stability_bound(&passes[0]), Duration::from_millis(1000));
        assert_eq!(config.stability_bound(&passes[1]), Duration::from_millis(1500));
        assert_eq!(config.stability_bound(&passes[4]), Duration::from_millis(2000));
    }
}
