use serde::Serialize;

use crate::detection::orchestrator::DetectionReport;
use crate::dom::traversal::InaccessibleFrame;
use crate::error::DetectionError;
use crate::monitor::schema::InterceptedSchema;
use crate::registry::unified::{ContainerInfo, FieldButtonData, FieldEntry};

// ============================================================================
// Detection summary: one detect-and-register run over a page
// ============================================================================

/// Everything a run produced, in a shape reporters and JSON output share.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionSummary {
    /// URL of the root document
    pub url: String,

    /// Documents traversed (root plus nested)
    pub documents: usize,

    /// Nested documents that could not be inspected
    pub inaccessible: Vec<InaccessibleFrame>,

    pub detection: DetectionReport,

    /// One entry per registered container, in detection order
    pub containers: Vec<ContainerInfo>,

    pub fields: Vec<FieldEntry>,

    /// Actionable entries: one per individual field, one per group
    pub buttons: Vec<FieldButtonData>,

    /// Schemas captured from observed traffic, if any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<InterceptedSchema>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
}

impl DetectionSummary {
    pub fn with_duration(mut self, duration_ms: u128) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_schemas(mut self, schemas: Vec<InterceptedSchema>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Fields without a backing element.
    pub fn unresolved(&self) -> usize {
        self.fields.iter().filter(|f| f.element.is_none()).count()
    }

    pub fn to_json(&self) -> Result<String, DetectionError> {
        serde_json::to_string_pretty(self).map_err(|source| DetectionError::Serialize {
            context: "detection summary".into(),
            source,
        })
    }
}
