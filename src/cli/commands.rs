use std::time::Instant;

use tracing::info;

use crate::cli::config::AppConfig;
use crate::dom::traversal::Page;
use crate::error::DetectionError;
use crate::monitor::network::ObservedExchange;
use crate::monitor::schema::{InterceptedSchema, normalize_payload};
use crate::registry::unified::UnifiedFieldRegistry;
use crate::report::console::format_console_report;
use crate::report::report_model::DetectionSummary;
use crate::{build_detector, detect_and_register};

fn read_file(path: &str) -> Result<String, DetectionError> {
    std::fs::read_to_string(path).map_err(|source| DetectionError::Io {
        path: path.to_string(),
        source,
    })
}

// ============================================================================
// detect subcommand
// ============================================================================

/// Load a snapshot (and optional recorded traffic), run detection and
/// registration, and return the summary.
pub async fn run_detect(
    config: &AppConfig,
    snapshot_path: &str,
    network_path: Option<&str>,
    immediate: bool,
) -> Result<DetectionSummary, DetectionError> {
    let started = Instant::now();
    let page = Page::from_json(&read_file(snapshot_path)?)?;

    let mut config = config.clone();
    if immediate {
        config.detection = config.detection.immediate_only();
    }
    let detector = build_detector(&config);

    let exchanges: Vec<ObservedExchange> = match network_path {
        Some(path) => serde_json::from_str(&read_file(path)?).map_err(|source| DetectionError::Snapshot {
            context: path.to_string(),
            source,
        })?,
        None => Vec::new(),
    };
    let schemas: Vec<InterceptedSchema> = exchanges
        .iter()
        .filter_map(|e| detector.network().observe_response(e))
        .collect();
    if !exchanges.is_empty() {
        info!(exchanges = exchanges.len(), schemas = schemas.len(), "replayed network traffic");
    }

    let page = page.into_shared();
    let mut registry = UnifiedFieldRegistry::default();
    let summary = detect_and_register(&detector, &mut registry, &page).await;

    Ok(summary
        .with_schemas(schemas)
        .with_duration(started.elapsed().as_millis()))
}

pub async fn cmd_detect(
    config: &AppConfig,
    snapshot_path: &str,
    network_path: Option<&str>,
    format: &str,
    immediate: bool,
) -> Result<(), DetectionError> {
    let summary = run_detect(config, snapshot_path, network_path, immediate).await?;

    match format {
        "json" => println!("{}", summary.to_json()?),
        _ => print!("{}", format_console_report(&summary)),
    }
    Ok(())
}

// ============================================================================
// schema subcommand
// ============================================================================

/// Normalize a payload file. `Ok(None)` when it holds no recognizable schema.
pub fn run_schema(payload_path: &str, url: &str) -> Result<Option<InterceptedSchema>, DetectionError> {
    let raw = read_file(payload_path)?;
    let payload: serde_json::Value = serde_json::from_str(&raw).map_err(|source| DetectionError::Snapshot {
        context: payload_path.to_string(),
        source,
    })?;
    let source_url = if url.is_empty() { payload_path } else { url };
    Ok(normalize_payload(source_url, &payload))
}

pub fn cmd_schema(payload_path: &str, url: &str) -> Result<(), DetectionError> {
    match run_schema(payload_path, url)? {
        Some(schema) => {
            let json = serde_json::to_string_pretty(&schema).map_err(|source| DetectionError::Serialize {
                context: "schema".into(),
                source,
            })?;
            println!("{}", json);
        }
        None => println!("No form schema found in {}", payload_path),
    }
    Ok(())
}
