mod common;

use common::*;
use form_detection::detection::orchestrator::FormDetector;
use form_detection::detection::passes::DetectionConfig;
use form_detection::registry::field::Field;
use form_detection::registry::unified::UnifiedFieldRegistry;
use form_detection::report::console::format_console_report;
use form_detection::report::report_model::DetectionSummary;
use form_detection::{container_id, detect_and_register};

async fn signup_summary() -> DetectionSummary {
    let detector = FormDetector::new(DetectionConfig::default().immediate_only());
    let mut registry = UnifiedFieldRegistry::default();
    let page = page(signup_form()).into_shared();
    detect_and_register(&detector, &mut registry, &page).await
}

// ============================================================================
// Detect and register
// ============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn summary_covers_containers_fields_and_actions() {
    let summary = signup_summary().await;

    assert_eq!(summary.url, "https://shop.test/signup");
    assert_eq!(summary.documents, 1);
    assert!(summary.inaccessible.is_empty());
    assert_eq!(summary.containers.len(), 1);
    assert_eq!(summary.containers[0].container_id, container_id(summary.detection.containers[0].element));
    assert_eq!(summary.fields.len(), 3);
    assert_eq!(summary.buttons.len(), 2);
    assert_eq!(summary.unresolved(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn repeated_runs_start_a_fresh_epoch() {
    let detector = FormDetector::new(DetectionConfig::default().immediate_only());
    let mut registry = UnifiedFieldRegistry::default();
    let page = page(signup_form()).into_shared();

    let first = detect_and_register(&detector, &mut registry, &page).await;
    let second = detect_and_register(&detector, &mut registry, &page).await;

    assert_eq!(first.fields.len(), second.fields.len());
    assert_eq!(registry.epoch(), 2);
    let ids = |s: &DetectionSummary| -> Vec<String> { s.fields.iter().map(|f| f.field.id.clone()).collect() };
    assert_eq!(ids(&first), ids(&second));
}

// ============================================================================
// Console Reporter Tests
// ============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn console_report_lists_each_container() {
    let summary = signup_summary().await;
    let output = format_console_report(&summary);

    assert!(output.contains("=== Form detection: https://shop.test/signup ==="));
    assert!(output.contains("Documents: 1\n"));
    assert!(output.contains("Passes: immediate 1*"));
    assert!(output.contains("container-0-1"));
    assert!(output.contains("native-form"));
    assert!(output.contains("radio-group-plan (2 options)"));
    assert!(output.contains("=== Results: 1 containers, 3 fields, 2 actions ==="));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn console_report_mentions_unresolved_fields_and_duration() {
    let mut summary = signup_summary().await;
    let mut ghost = summary.fields[0].clone();
    ghost.field = Field::new("field-ghost", ghost.field.field_type);
    ghost.element = None;
    summary.fields.push(ghost);

    let output = format_console_report(&summary.with_duration(1500));

    assert!(output.contains("4 fields, 2 actions, 1 unresolved in 1.5s ==="));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn console_report_counts_inaccessible_documents() {
    let detector = FormDetector::new(DetectionConfig::default().immediate_only());
    let mut registry = UnifiedFieldRegistry::default();
    let page = page(body([
        el("iframe").with_frame(denied_frame("https://pay.other.test/card")),
        el("form").with_children([input("text", "a"), input("text", "b"), el("button").with_text("Pay")]),
    ]))
    .into_shared();

    let summary = detect_and_register(&detector, &mut registry, &page).await;
    let output = format_console_report(&summary);

    assert_eq!(summary.inaccessible.len(), 1);
    assert!(output.contains("Documents: 1 (1 inaccessible)"));
}

// ============================================================================
// JSON output
// ============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn json_output_is_structured() {
    let summary = signup_summary().await.with_duration(42);
    let json = summary.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["url"], "https://shop.test/signup");
    assert_eq!(value["containers"].as_array().unwrap().len(), 1);
    assert_eq!(value["buttons"].as_array().unwrap().len(), 2);
    assert_eq!(value["duration_ms"], 42);
    assert!(value.get("schemas").is_none());
}
