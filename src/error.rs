use thiserror::Error;

/// Errors surfaced by loading entry points. Detection itself degrades
/// instead of failing; these only come from reading inputs.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// A snapshot, payload or recorded exchange was not valid JSON for its shape.
    #[error("JSON parse error ({context}): {source}")]
    Snapshot {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A YAML config file could not be parsed.
    #[error("config error ({path}): {source}")]
    Config {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization of a report failed.
    #[error("JSON serialize error ({context}): {source}")]
    Serialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
