use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dom::document::DocumentId;
use crate::monitor::schema::{InterceptedSchema, normalize_body};
use crate::monitor::subscription::{Feed, Sink, Subscribers, Subscription};

/// URL shapes of form-definition and form-schema endpoints.
const SCHEMA_URL_PATTERNS: &[&str] = &[
    r"/forms?/[^/?#]+(/(schema|definition|fields|config|render))?",
    r"/form[-_]?(schema|definition|config|builder|fields)",
    r"/api/v?\d*/?forms?\b",
    r"/(questionnaire|survey|surveys)s?/",
    r"/(wizard|onboarding|checkout)/(steps|schema|config)",
    r"/schemas?/.*form",
    r"typeform\.com/.*forms",
    r"jotform\.com/.*(form|questions)",
    r"hsforms\.(com|net)",
    r"forms\.hubspot\.com",
    r"formstack\.com/api",
    r"surveymonkey\.com/.*(surveys|pages)",
    r"/graphql.*form",
];

/// One request/response pair passively seen on a document's network channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedExchange {
    #[serde(default = "root_document")]
    pub document: DocumentId,
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

fn root_document() -> DocumentId {
    DocumentId(0)
}

fn default_method() -> String {
    "GET".to_string()
}

impl ObservedExchange {
    pub fn new(document: DocumentId, url: &str, status: u16, body: &str) -> Self {
        Self {
            document,
            method: default_method(),
            url: url.to_string(),
            status,
            content_type: Some("application/json".to_string()),
            body: Some(body.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// JSON by content type, or by sniffing the body when no type was reported.
    pub fn is_json(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) if ct.to_ascii_lowercase().contains("json") => true,
            Some(ct) if !ct.trim().is_empty() => false,
            _ => self
                .body
                .as_deref()
                .map(str::trim_start)
                .is_some_and(|b| b.starts_with('{') || b.starts_with('[')),
        }
    }
}

/// Schema captured from a document's traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaCaptured {
    pub document: DocumentId,
    pub schema: InterceptedSchema,
}

/// Tests observed traffic against the schema URL library and normalizes
/// matching payloads. Never alters or issues requests.
pub struct NetworkObserver {
    patterns: Vec<Regex>,
    captured: Mutex<HashMap<DocumentId, Vec<InterceptedSchema>>>,
    subscribers: Subscribers<SchemaCaptured>,
}

impl Default for NetworkObserver {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl NetworkObserver {
    /// Built-in patterns plus `extra_patterns`. Invalid extras are logged and skipped.
    pub fn new(extra_patterns: &[String]) -> Self {
        let patterns = SCHEMA_URL_PATTERNS
            .iter()
            .copied()
            .chain(extra_patterns.iter().map(String::as_str))
            .filter_map(|p| match RegexBuilder::new(p).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = p, error = %e, "ignoring invalid schema URL pattern");
                    None
                }
            })
            .collect();

        Self {
            patterns,
            captured: Mutex::new(HashMap::new()),
            subscribers: Subscribers::new(),
        }
    }

    pub fn matches_url(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(url))
    }

    /// Inspect one exchange. Non-matching, failed, non-JSON or unrecognized
    /// responses yield `None`.
    pub fn observe_response(&self, exchange: &ObservedExchange) -> Option<InterceptedSchema> {
        if !self.matches_url(&exchange.url) {
            return None;
        }
        if !exchange.is_success() || !exchange.is_json() {
            debug!(url = %exchange.url, status = exchange.status, "schema endpoint response skipped");
            return None;
        }

        let body = exchange.body.as_deref()?;
        let Some(schema) = normalize_body(&exchange.url, body) else {
            debug!(url = %exchange.url, "no form schema in matching response");
            return None;
        };

        info!(
            doc = exchange.document.0,
            url = %exchange.url,
            fields = schema.fields.len(),
            steps = schema.steps.len(),
            "captured form schema"
        );
        self.captured
            .lock()
            .entry(exchange.document)
            .or_default()
            .push(schema.clone());
        self.subscribers.emit(&SchemaCaptured {
            document: exchange.document,
            schema: schema.clone(),
        });
        Some(schema)
    }

    pub fn has_schema_signal(&self, document: DocumentId) -> bool {
        self.captured.lock().get(&document).is_some_and(|s| !s.is_empty())
    }

    pub fn any_schema_signal(&self, documents: &[DocumentId]) -> bool {
        let captured = self.captured.lock();
        documents
            .iter()
            .any(|d| captured.get(d).is_some_and(|s| !s.is_empty()))
    }

    pub fn schemas(&self, document: DocumentId) -> Vec<InterceptedSchema> {
        self.captured.lock().get(&document).cloned().unwrap_or_default()
    }

    pub fn clear(&self) {
        self.captured.lock().clear();
    }

    /// Fired for every captured schema.
    pub fn subscribe(&self, sink: Sink<SchemaCaptured>) -> Subscription {
        self.subscribers.subscribe(sink)
    }

    /// Wire a request/response feed into this observer.
    pub fn attach(self: &Arc<Self>, feed: &dyn Feed<ObservedExchange>) -> Subscription {
        let observer = Arc::downgrade(self);
        feed.subscribe(Arc::new(move |exchange: &ObservedExchange| {
            if let Some(observer) = observer.upgrade() {
                observer.observe_response(exchange);
            }
        }))
    }
}
