use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::detection::passes::DetectionConfig;
use crate::error::DetectionError;
use crate::scoring::scorer::ScoringConfig;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "form-detection",
    version,
    about = "Find form-like regions and their fields in document snapshots"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: form-detection.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect form containers in a document snapshot and register their fields
    Detect {
        /// Path to a JSON document snapshot
        #[arg(long)]
        snapshot: String,

        /// Path to a JSON array of observed request/response exchanges
        #[arg(long)]
        network: Option<String>,

        /// Output format: console, json
        #[arg(long, default_value = "console")]
        format: String,

        /// Run only the immediate pass
        #[arg(long)]
        immediate: bool,
    },

    /// Normalize a captured form-schema payload
    Schema {
        /// Path to the JSON payload
        #[arg(long)]
        payload: String,

        /// URL the payload was served from
        #[arg(long, default_value = "")]
        url: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `form-detection.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub trace: TraceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Regexes added to the built-in schema URL library
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    /// JSONL file receiving one event per detection pass
    pub path: Option<String>,
}

// ============================================================================
// Config File Loading
// ============================================================================

pub const DEFAULT_CONFIG_PATH: &str = "form-detection.yaml";

pub fn parse_config(content: &str, path: &str) -> Result<AppConfig, DetectionError> {
    serde_yaml::from_str(content).map_err(|source| DetectionError::Config {
        path: path.to_string(),
        source,
    })
}

/// Load config from a YAML file. Returns defaults if the file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content, config_path).unwrap_or_else(|e| {
            warn!(error = %e, "using default configuration");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let yaml = "detection:\n  debounce_ms: 50\nscoring:\n  weights:\n    semantic: 25\n";
        let config = parse_config(yaml, "inline").unwrap();
        assert_eq!(config.detection.debounce_ms, 50);
        assert_eq!(config.detection.passes.len(), 5);
        assert_eq!(config.scoring.weights.semantic, 25.0);
        assert_eq!(config.scoring.weights.native_form, 40.0);
        assert!(config.network.extra_patterns.is_empty());
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(matches!(
            parse_config("detection: [1, 2", "bad.yaml"),
            Err(DetectionError::Config { .. })
        ));
    }
}
