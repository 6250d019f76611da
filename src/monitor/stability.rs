use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::dom::document::DocumentId;
use crate::monitor::subscription::{Feed, Sink, Subscribers, Subscription};

/// Class/id tokens that mark a loading placeholder.
const LOADING_TOKENS: &[&str] = &["loading", "loader", "spinner", "skeleton", "shimmer", "placeholder-glow"];
const INTERACTIVE_TAGS: &[&str] = &["input", "select", "textarea", "button", "form", "fieldset"];

const LOADING_REMOVED: f64 = 0.2;
const LOADING_ADDED: f64 = -0.1;
const ENABLED: f64 = 0.1;
const NOT_BUSY: f64 = 0.1;
const FIELD_INSERTED: f64 = 0.1;

/// Minimal description of a changed element, as a host adapter reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// The node has field descendants.
    #[serde(default)]
    pub contains_field: bool,
}

impl NodeSummary {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_fields(mut self) -> Self {
        self.contains_field = true;
        self
    }

    pub fn is_loading_marker(&self) -> bool {
        self.attributes.get("aria-busy").is_some_and(|v| v == "true")
            || self.attributes.get("role").is_some_and(|r| r == "progressbar")
            || ["class", "id"]
                .iter()
                .filter_map(|a| self.attributes.get(*a))
                .any(|v| has_loading_token(v))
    }

    pub fn is_interactive(&self) -> bool {
        self.contains_field || INTERACTIVE_TAGS.contains(&self.tag.as_str())
    }
}

fn has_loading_token(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower
        .split(|c: char| c.is_whitespace() || c == '_')
        .any(|token| LOADING_TOKENS.iter().any(|t| token == *t || token.ends_with(&format!("-{t}")) || token.starts_with(&format!("{t}-"))))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    Attribute {
        name: String,
        #[serde(default)]
        old_value: Option<String>,
        #[serde(default)]
        new_value: Option<String>,
    },
    ChildList {
        #[serde(default)]
        added: Vec<NodeSummary>,
        #[serde(default)]
        removed: Vec<NodeSummary>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub target: NodeSummary,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

/// One batched delivery from a subtree change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub document: DocumentId,
    pub records: Vec<ChangeRecord>,
}

/// A change that matched a readiness or loading pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualifyingChange {
    pub document: DocumentId,
    pub delta: f64,
    pub confidence: f64,
}

/// Confidence contribution of one record; `None` if it does not qualify.
pub fn classify_change(record: &ChangeRecord) -> Option<f64> {
    match &record.kind {
        ChangeKind::Attribute { name, old_value, new_value } => {
            let old = old_value.as_deref();
            let new = new_value.as_deref();
            match name.as_str() {
                "class" | "id" => {
                    let was = old.is_some_and(has_loading_token);
                    let is = new.is_some_and(has_loading_token);
                    match (was, is) {
                        (true, false) => Some(LOADING_REMOVED),
                        (false, true) => Some(LOADING_ADDED),
                        _ => None,
                    }
                }
                "disabled" if old.is_some() && new.is_none() => Some(ENABLED),
                "aria-busy" if old == Some("true") && new != Some("true") => Some(NOT_BUSY),
                "aria-busy" if old != Some("true") && new == Some("true") => Some(LOADING_ADDED),
                _ => None,
            }
        }
        ChangeKind::ChildList { added, removed } => {
            let mut delta = 0.0;
            let mut qualified = false;
            if removed.iter().any(NodeSummary::is_loading_marker) {
                delta += LOADING_REMOVED;
                qualified = true;
            }
            if added.iter().any(NodeSummary::is_loading_marker) {
                delta += LOADING_ADDED;
                qualified = true;
            }
            if added.iter().any(|n| n.is_interactive() && !n.is_loading_marker()) {
                delta += FIELD_INSERTED;
                qualified = true;
            }
            qualified.then_some(delta)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StabilityOutcome {
    /// Every tracked document was quiet for the full window.
    pub stable: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub waited: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Clone, Copy)]
struct DocumentState {
    confidence: f64,
    last_change: Option<Instant>,
}

/// Rolling per-document readiness estimate fed by subtree change batches.
pub struct StabilityMonitor {
    quiet_window: Duration,
    initial_confidence: f64,
    state: Mutex<HashMap<DocumentId, DocumentState>>,
    qualifying: Subscribers<QualifyingChange>,
}

impl StabilityMonitor {
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            initial_confidence: 0.5,
            state: Mutex::new(HashMap::new()),
            qualifying: Subscribers::new(),
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    /// Wire a change feed into this monitor.
    pub fn attach(self: &Arc<Self>, feed: &dyn Feed<ChangeBatch>) -> Subscription {
        let monitor = Arc::downgrade(self);
        feed.subscribe(Arc::new(move |batch: &ChangeBatch| {
            if let Some(monitor) = monitor.upgrade() {
                monitor.record_changes(batch);
            }
        }))
    }

    /// Notified after every batch that contained at least one qualifying change.
    pub fn on_qualifying_change(&self, sink: Sink<QualifyingChange>) -> Subscription {
        self.qualifying.subscribe(sink)
    }

    /// Apply a batch. Returns the resulting event when anything qualified.
    pub fn record_changes(&self, batch: &ChangeBatch) -> Option<QualifyingChange> {
        let deltas: Vec<f64> = batch.records.iter().filter_map(classify_change).collect();
        if deltas.is_empty() {
            return None;
        }

        let delta: f64 = deltas.iter().sum();
        let event = {
            let mut state = self.state.lock();
            let entry = state.entry(batch.document).or_insert(DocumentState {
                confidence: self.initial_confidence,
                last_change: None,
            });
            entry.confidence = (entry.confidence + delta).clamp(0.0, 1.0);
            entry.last_change = Some(Instant::now());
            QualifyingChange {
                document: batch.document,
                delta,
                confidence: entry.confidence,
            }
        };

        debug!(
            doc = batch.document.0,
            qualifying = deltas.len(),
            delta,
            confidence = event.confidence,
            "qualifying changes"
        );
        self.qualifying.emit(&event);
        Some(event)
    }

    pub fn confidence(&self, document: DocumentId) -> f64 {
        self.state
            .lock()
            .get(&document)
            .map_or(self.initial_confidence, |s| s.confidence)
    }

    pub fn last_change(&self, document: DocumentId) -> Option<Instant> {
        self.state.lock().get(&document).and_then(|s| s.last_change)
    }

    /// Instant at which every listed document will have been quiet for the
    /// window, given what has been recorded so far.
    fn quiet_at(&self, documents: &[DocumentId]) -> Option<Instant> {
        let state = self.state.lock();
        documents
            .iter()
            .filter_map(|d| state.get(d).and_then(|s| s.last_change))
            .max()
            .map(|last| last + self.quiet_window)
    }

    /// Resolve once every document has had no qualifying change for the quiet
    /// window, or once `max_wait` elapses. Never errors.
    pub async fn wait_for_stability(&self, documents: &[DocumentId], max_wait: Duration) -> StabilityOutcome {
        let start = Instant::now();
        let deadline = start + max_wait;

        loop {
            let now = Instant::now();
            let quiet_at = self.quiet_at(documents);
            if quiet_at.is_none_or(|at| at <= now) {
                return StabilityOutcome {
                    stable: true,
                    waited: now - start,
                };
            }
            if now >= deadline {
                debug!(waited_ms = (now - start).as_millis() as u64, "stability wait capped");
                return StabilityOutcome {
                    stable: false,
                    waited: now - start,
                };
            }

            let wake = quiet_at.map_or(deadline, |at| at.min(deadline));
            tokio::time::sleep_until(wake).await;
        }
    }
}

impl Default for StabilityMonitor {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, old: Option<&str>, new: Option<&str>) -> ChangeRecord {
        ChangeRecord {
            target: NodeSummary::new("div"),
            kind: ChangeKind::Attribute {
                name: name.into(),
                old_value: old.map(Into::into),
                new_value: new.map(Into::into),
            },
        }
    }

    #[test]
    fn loading_class_transitions_qualify() {
        assert_eq!(classify_change(&attr("class", Some("card is-loading"), Some("card"))), Some(0.2));
        assert_eq!(classify_change(&attr("class", Some("card"), Some("card spinner"))), Some(-0.1));
        assert_eq!(classify_change(&attr("class", Some("a"), Some("b"))), None);
    }

    #[test]
    fn cleared_flags_qualify() {
        assert_eq!(classify_change(&attr("disabled", Some(""), None)), Some(0.1));
        assert_eq!(classify_change(&attr("aria-busy", Some("true"), Some("false"))), Some(0.1));
        assert_eq!(classify_change(&attr("disabled", None, Some(""))), None);
        assert_eq!(classify_change(&attr("title", None, Some("x"))), None);
    }

    #[test]
    fn inserted_fields_qualify() {
        let record = ChangeRecord {
            target: NodeSummary::new("div"),
            kind: ChangeKind::ChildList {
                added: vec![NodeSummary::new("input")],
                removed: vec![NodeSummary::new("div").with_attr("class", "skeleton")],
            },
        };
        let delta = classify_change(&record).unwrap();
        assert!((delta - 0.3).abs() < 1e-9);

        let noise = ChangeRecord {
            target: NodeSummary::new("div"),
            kind: ChangeKind::ChildList {
                added: vec![NodeSummary::new("span")],
                removed: vec![],
            },
        };
        assert_eq!(classify_change(&noise), None);
    }

    #[test]
    fn change_records_deserialize_from_host_json() {
        let json = r#"{"document":0,"records":[
            {"target":{"tag":"div"},"type":"attribute","name":"class","old_value":"loading","new_value":""},
            {"target":{"tag":"form"},"type":"child_list","added":[{"tag":"input"}]}
        ]}"#;
        let batch: ChangeBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert!(matches!(batch.records[1].kind, ChangeKind::ChildList { .. }));
    }
}
