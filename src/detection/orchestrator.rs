use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, info};

use crate::detection::guard::DetectionGuard;
use crate::detection::merge::merge_results;
use crate::detection::multi_step::MultiStepDetector;
use crate::detection::passes::{DetectionConfig, DetectionPass};
use crate::dom::document::ElementRef;
use crate::dom::traversal::{Page, SharedPage};
use crate::monitor::network::NetworkObserver;
use crate::monitor::stability::StabilityMonitor;
use crate::scoring::candidate::{CandidateContainer, mean_score};
use crate::scoring::scorer::{CandidateScorer, HeuristicScorer};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

/// Why the pass loop stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// A schema was captured on the network and the best result is convincing.
    SchemaSignal { pass: String },
    /// Enough high-scoring candidates.
    StrongCandidates { pass: String },
    /// The thorough pass found a consistent result.
    ThoroughPass { pass: String },
    /// Every pass ran.
    Exhausted,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::SchemaSignal { pass } => write!(f, "schema signal after {pass}"),
            Termination::StrongCandidates { pass } => write!(f, "strong candidates after {pass}"),
            Termination::ThoroughPass { pass } => write!(f, "thorough result after {pass}"),
            Termination::Exhausted => write!(f, "all passes ran"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassOutcome {
    pub name: String,
    pub threshold: f64,
    pub candidates: usize,
    pub fields: usize,
    pub mean_score: f64,
    pub aggregate: f64,
    pub adopted: bool,
    pub stable: bool,
    pub schema_signal: bool,
}

/// Result of one top-level detection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub run: u64,
    pub containers: Vec<CandidateContainer>,
    pub passes: Vec<PassOutcome>,
    pub termination: Termination,
    /// Candidates contributed by the multi-step pass before merging.
    pub multi_step_candidates: usize,
}

impl DetectionReport {
    pub fn elements(&self) -> Vec<ElementRef> {
        self.containers.iter().map(|c| c.element).collect()
    }
}

/// Mean score + 2 x total fields + 5 x candidate count.
pub fn aggregate_score(candidates: &[CandidateContainer]) -> f64 {
    let fields: usize = candidates.iter().map(|c| c.field_count).sum();
    mean_score(candidates) + 2.0 * fields as f64 + 5.0 * candidates.len() as f64
}

struct BestResult {
    candidates: Vec<CandidateContainer>,
    aggregate: f64,
}

/// Progressive multi-pass detection over every document of a page.
pub struct FormDetector {
    config: DetectionConfig,
    scorer: Arc<dyn CandidateScorer>,
    multi_step: MultiStepDetector,
    monitor: Arc<StabilityMonitor>,
    network: Arc<NetworkObserver>,
    tracer: Arc<TraceLogger>,
    guard: DetectionGuard,
    runs: AtomicU64,
}

impl Default for FormDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

impl FormDetector {
    pub fn new(config: DetectionConfig) -> Self {
        let quiet_window = std::time::Duration::from_millis(config.quiet_window_ms);
        Self {
            multi_step: MultiStepDetector::new(config.multi_step.clone()),
            scorer: Arc::new(HeuristicScorer::default()),
            monitor: Arc::new(StabilityMonitor::new(quiet_window)),
            network: Arc::new(NetworkObserver::default()),
            tracer: Arc::new(TraceLogger::disabled()),
            guard: DetectionGuard::new(),
            runs: AtomicU64::new(0),
            config,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn CandidateScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<StabilityMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_network(mut self, network: Arc<NetworkObserver>) -> Self {
        self.network = network;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<TraceLogger>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<StabilityMonitor> {
        &self.monitor
    }

    pub fn network(&self) -> &Arc<NetworkObserver> {
        &self.network
    }

    pub fn guard(&self) -> &DetectionGuard {
        &self.guard
    }

    /// Final container elements for the whole traversal set.
    pub async fn detect_form_like_containers(&self, page: &SharedPage) -> Vec<ElementRef> {
        self.detect_candidates(page).await.elements()
    }

    /// Like `detect_candidates`, but returns `None` instead of starting a
    /// second run while one is in flight.
    pub async fn run_guarded(&self, page: &SharedPage) -> Option<DetectionReport> {
        let Some(_token) = self.guard.try_acquire() else {
            debug!("detection already in flight; request coalesced");
            return None;
        };
        Some(self.detect_candidates(page).await)
    }

    /// Run every pass in order, stopping early when a termination rule fires,
    /// then merge in multi-step results.
    pub async fn detect_candidates(&self, page: &SharedPage) -> DetectionReport {
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        let mut best: Option<BestResult> = None;
        let mut passes = Vec::new();
        let mut termination = Termination::Exhausted;

        for pass in &self.config.passes {
            tokio::time::sleep(pass.delay()).await;

            let documents = page.read().document_ids();
            let schema_signal = self.network.any_schema_signal(&documents);
            let stability = self
                .monitor
                .wait_for_stability(&documents, self.config.stability_bound(pass))
                .await;

            let candidates = {
                let page = page.read();
                self.score_pass(&page, pass)
            };

            let fields: usize = candidates.iter().map(|c| c.field_count).sum();
            let mean = mean_score(&candidates);
            let aggregate = aggregate_score(&candidates);
            let adopted = match &best {
                None => true,
                Some(b) => {
                    aggregate > b.aggregate + self.config.adoption_margin
                        || self.grew(b.candidates.len(), candidates.len())
                }
            };

            let outcome = PassOutcome {
                name: pass.name.clone(),
                threshold: pass.threshold,
                candidates: candidates.len(),
                fields,
                mean_score: mean,
                aggregate,
                adopted,
                stable: stability.stable,
                schema_signal,
            };
            if adopted {
                debug!(run, pass = %pass.name, candidates = candidates.len(), aggregate, "pass adopted");
                best = Some(BestResult { candidates, aggregate });
            }

            let stop = best
                .as_ref()
                .and_then(|b| self.termination(pass, schema_signal, &b.candidates));

            if self.tracer.is_enabled() {
                let mut event = TraceEvent::now(run, &pass.name, pass.threshold)
                    .with_documents(documents.len())
                    .with_outcome(outcome.candidates, fields, mean, aggregate)
                    .with_schema_signal(schema_signal)
                    .with_stability(stability.stable)
                    .with_adopted(adopted);
                if let Some(reason) = &stop {
                    event = event.with_termination(reason);
                }
                self.tracer.log(&event);
            }
            passes.push(outcome);

            if let Some(reason) = stop {
                info!(run, %reason, "detection terminated early");
                termination = reason;
                break;
            }
        }

        let (containers, multi_step_candidates) = {
            let page = page.read();
            let multi: Vec<CandidateContainer> = page
                .documents()
                .iter()
                .flat_map(|doc| self.multi_step.detect(doc))
                .collect();
            let count = multi.len();
            let progressive = best.map(|b| b.candidates).unwrap_or_default();
            (merge_results(&page, progressive.into_iter().chain(multi)), count)
        };

        info!(
            run,
            containers = containers.len(),
            passes = passes.len(),
            %termination,
            "detection finished"
        );

        DetectionReport {
            run,
            containers,
            passes,
            termination,
            multi_step_candidates,
        }
    }

    /// One immediate primary pass, no waiting. For hosts that need an answer now.
    pub fn detect_now(&self, page: &Page) -> Vec<CandidateContainer> {
        let threshold = self.config.passes.first().map_or(0.8, |p| p.threshold);
        let candidates: Vec<CandidateContainer> = page
            .documents()
            .iter()
            .flat_map(|doc| self.scorer.score(doc, threshold))
            .collect();
        merge_results(page, candidates)
    }

    fn score_pass(&self, page: &Page, pass: &DetectionPass) -> Vec<CandidateContainer> {
        page.documents()
            .iter()
            .flat_map(|doc| {
                if pass.broad {
                    self.scorer.scan(doc, pass.threshold)
                } else {
                    self.scorer.score(doc, pass.threshold)
                }
            })
            .collect()
    }

    fn grew(&self, previous: usize, current: usize) -> bool {
        if previous == 0 {
            return current > 0;
        }
        current > previous && current as f64 >= previous as f64 * self.config.growth_ratio
    }

    fn termination(
        &self,
        pass: &DetectionPass,
        schema_signal: bool,
        candidates: &[CandidateContainer],
    ) -> Option<Termination> {
        let c = &self.config;
        let mean = mean_score(candidates);

        if schema_signal && !pass.is_immediate() && !candidates.is_empty() && mean > c.schema_mean_score {
            return Some(Termination::SchemaSignal { pass: pass.name.clone() });
        }

        let strong = candidates.iter().filter(|x| x.score > c.strong_score).count();
        if candidates.len() >= c.strong_candidate_count && strong >= c.strong_required {
            return Some(Termination::StrongCandidates { pass: pass.name.clone() });
        }

        if pass.name == c.thorough_pass && candidates.len() >= c.thorough_min_candidates && mean > c.thorough_mean_score {
            return Some(Termination::ThoroughPass { pass: pass.name.clone() });
        }

        None
    }
}
