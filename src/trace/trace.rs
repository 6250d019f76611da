use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// One JSONL record per detection pass.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub run: u64,
    pub pass: String,
    pub threshold: f64,

    pub documents: usize,
    pub candidates: usize,
    pub fields: usize,
    pub mean_score: f64,
    pub aggregate: f64,

    pub schema_signal: bool,
    pub stable: Option<bool>,
    pub adopted: bool,
    pub termination: Option<String>,
}

impl TraceEvent {
    pub fn now(run: u64, pass: &str, threshold: f64) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            run,
            pass: pass.to_string(),
            threshold,
            documents: 0,
            candidates: 0,
            fields: 0,
            mean_score: 0.0,
            aggregate: 0.0,
            schema_signal: false,
            stable: None,
            adopted: false,
            termination: None,
        }
    }

    pub fn with_documents(mut self, documents: usize) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_outcome(mut self, candidates: usize, fields: usize, mean_score: f64, aggregate: f64) -> Self {
        self.candidates = candidates;
        self.fields = fields;
        self.mean_score = mean_score;
        self.aggregate = aggregate;
        self
    }

    pub fn with_schema_signal(mut self, signal: bool) -> Self {
        self.schema_signal = signal;
        self
    }

    pub fn with_stability(mut self, stable: bool) -> Self {
        self.stable = Some(stable);
        self
    }

    pub fn with_adopted(mut self, adopted: bool) -> Self {
        self.adopted = adopted;
        self
    }

    pub fn with_termination(mut self, reason: impl ToString) -> Self {
        self.termination = Some(reason.to_string());
        self
    }
}
