use std::sync::Arc;

use crate::{
    cli::config::AppConfig,
    detection::orchestrator::FormDetector,
    dom::{document::ElementRef, traversal::SharedPage},
    monitor::network::NetworkObserver,
    registry::unified::UnifiedFieldRegistry,
    report::report_model::DetectionSummary,
    scoring::scorer::HeuristicScorer,
    trace::logger::TraceLogger,
};

pub mod cli;
pub mod detection;
pub mod dom;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod report;
pub mod scoring;
pub mod trace;

/// Build a detector wired to the configured scorer, network patterns and trace file.
pub fn build_detector(config: &AppConfig) -> FormDetector {
    let tracer = match &config.trace.path {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };

    FormDetector::new(config.detection.clone())
        .with_scorer(Arc::new(HeuristicScorer::new(config.scoring.clone())))
        .with_network(Arc::new(NetworkObserver::new(&config.network.extra_patterns)))
        .with_tracer(Arc::new(tracer))
}

/// Stable container id used when registering a detected container.
pub fn container_id(element: ElementRef) -> String {
    format!("container-{}-{}", element.doc.0, element.node.0)
}

/// One full top-level run: start a new registry epoch, detect containers,
/// register them in order, and collect the field actions.
pub async fn detect_and_register(
    detector: &FormDetector,
    registry: &mut UnifiedFieldRegistry,
    page: &SharedPage,
) -> DetectionSummary {
    registry.clear();
    let detection = detector.detect_candidates(page).await;

    let mut page = page.write();
    let containers = detection
        .containers
        .iter()
        .map(|c| registry.register_container(&mut page, c.element, &container_id(c.element)))
        .collect();

    let fields = registry.entries().to_vec();
    let buttons = registry.get_field_buttons_data(&page, None);

    DetectionSummary {
        url: page.root().url().to_string(),
        documents: page.documents().len(),
        inaccessible: page.inaccessible().to_vec(),
        detection,
        containers,
        fields,
        buttons,
        schemas: Vec::new(),
        duration_ms: None,
    }
}
