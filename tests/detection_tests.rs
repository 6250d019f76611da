mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use form_detection::detection::orchestrator::{FormDetector, Termination};
use form_detection::detection::passes::DetectionConfig;
use form_detection::detection::scheduler::{DetectionScheduler, Trigger};
use form_detection::dom::document::{Document, DocumentId, ElementRef, NodeId};
use form_detection::monitor::network::ObservedExchange;
use form_detection::scoring::candidate::CandidateContainer;
use form_detection::scoring::scorer::CandidateScorer;

/// Scorer that returns fixed candidates and counts how often it ran.
struct CountingScorer {
    scores: Vec<f64>,
    calls: AtomicUsize,
}

impl CountingScorer {
    fn new(scores: &[f64]) -> Self {
        Self {
            scores: scores.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    fn candidates(&self, doc: &Document) -> Vec<CandidateContainer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scores
            .iter()
            .enumerate()
            .map(|(i, score)| CandidateContainer {
                element: ElementRef::new(doc.id(), NodeId(i + 1)),
                score: *score,
                field_count: 1,
                reasons: vec!["fixed".into()],
                explicit: true,
                depth: 1,
            })
            .collect()
    }
}

impl CandidateScorer for CountingScorer {
    fn score(&self, doc: &Document, _threshold: f64) -> Vec<CandidateContainer> {
        self.candidates(doc)
    }

    fn scan(&self, doc: &Document, _threshold: f64) -> Vec<CandidateContainer> {
        self.candidates(doc)
    }
}

fn five_sections() -> form_detection::dom::traversal::SharedPage {
    page(body((0..5).map(|i| el("section").with_attr("data-slot", &i.to_string())))).into_shared()
}

// ============================================================================
// Progressive passes
// ============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn strong_first_pass_stops_the_run() {
    let scorer = Arc::new(CountingScorer::new(&[95.0, 90.0, 85.0, 50.0, 40.0]));
    let detector = FormDetector::default().with_scorer(scorer.clone());
    let page = five_sections();

    let report = detector.detect_candidates(&page).await;

    assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.passes.len(), 1);
    assert_eq!(
        report.termination,
        Termination::StrongCandidates {
            pass: "immediate".into()
        }
    );
    assert_eq!(report.containers.len(), 5);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn weak_results_run_every_pass() {
    let scorer = Arc::new(CountingScorer::new(&[45.0]));
    let detector = FormDetector::default().with_scorer(scorer.clone());
    let page = five_sections();
    let start = tokio::time::Instant::now();

    let report = detector.detect_candidates(&page).await;

    assert_eq!(scorer.calls.load(Ordering::SeqCst), 5);
    assert_eq!(report.termination, Termination::Exhausted);
    // Each pass waits its own delay after the previous one: 0 + 500 + 1500 + 3000 + 5000.
    assert!(start.elapsed() >= Duration::from_millis(10_000));
    // Only the first pass is adopted: later passes neither grow nor improve.
    let adopted: Vec<bool> = report.passes.iter().map(|p| p.adopted).collect();
    assert_eq!(adopted, vec![true, false, false, false, false]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn thorough_pass_accepts_a_consistent_result() {
    let scorer = Arc::new(CountingScorer::new(&[70.0, 65.0]));
    let detector = FormDetector::default().with_scorer(scorer.clone());

    let report = detector.detect_candidates(&five_sections()).await;

    assert_eq!(
        report.termination,
        Termination::ThoroughPass {
            pass: "thorough".into()
        }
    );
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn captured_schema_ends_detection_after_the_immediate_pass() {
    let detector = FormDetector::default();
    let exchange = ObservedExchange::new(
        DocumentId(0),
        "https://shop.test/api/forms/signup",
        200,
        r#"{"fields": [{"name": "email", "type": "email"}]}"#,
    );
    assert!(detector.network().observe_response(&exchange).is_some());

    let report = detector.detect_candidates(&page(signup_form()).into_shared()).await;

    assert_eq!(report.termination, Termination::SchemaSignal { pass: "fast".into() });
    assert_eq!(report.passes.len(), 2);
    assert!(report.passes.iter().all(|p| p.schema_signal));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn native_form_is_the_only_container() {
    let detector = FormDetector::default();
    let page = page(signup_form()).into_shared();

    let elements = detector.detect_form_like_containers(&page).await;

    assert_eq!(elements, vec![ElementRef::new(DocumentId(0), NodeId(1))]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn nested_documents_are_scored_too() {
    let inner = snapshot(
        "/embed",
        body([el("form").with_children([
            input("email", "email"),
            input("text", "name"),
            el("button").with_text("Subscribe"),
        ])]),
    );
    let root = body([
        el("iframe").with_frame(frame(&format!("{ORIGIN}/embed"), inner)),
        el("form").with_children([input("text", "q"), input("text", "zip"), el("button").with_text("Send")]),
    ]);
    let detector = FormDetector::new(DetectionConfig::default().immediate_only());

    let elements = detector.detect_form_like_containers(&page(root).into_shared()).await;

    assert_eq!(elements.len(), 2);
    assert!(elements.iter().any(|e| e.doc == DocumentId(1)));
    assert!(elements.iter().any(|e| e.doc == DocumentId(0)));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn overlapping_runs_are_coalesced() {
    let detector = FormDetector::default();
    let page = page(signup_form()).into_shared();

    let (first, second) = tokio::join!(detector.run_guarded(&page), detector.run_guarded(&page));

    assert_eq!(first.is_some() as u8 + second.is_some() as u8, 1);
    assert!(!detector.guard().is_running());
    assert!(detector.run_guarded(&page).await.is_some());
}

#[test]
fn detect_now_runs_one_pass_without_waiting() {
    let detector = FormDetector::default();
    let page = page(signup_form());

    let found = detector.detect_now(&page);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].field_count, 3);
}

// ============================================================================
// Multi-step merge
// ============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn wizard_steps_collapse_into_the_wizard() {
    let wizard = el("div")
        .with_attr("class", "onboarding-wizard")
        .with_rect(0.0, 0.0, 600.0, 500.0)
        .with_children([
            el("ol").with_attr("class", "step-indicator"),
            el("fieldset")
                .with_attr("data-step", "1")
                .with_children([
                    input("text", "first").with_rect(0.0, 40.0, 200.0, 30.0),
                    input("text", "last").with_rect(0.0, 90.0, 200.0, 30.0),
                ]),
            el("fieldset")
                .with_attr("data-step", "2")
                .hidden()
                .with_children([input("text", "company"), input("text", "role")]),
            el("button").with_attr("data-action", "next").with_text("Next"),
        ]);
    let detector = FormDetector::new(DetectionConfig::default().immediate_only());

    let report = detector.detect_candidates(&page(body([wizard])).into_shared()).await;

    assert!(report.multi_step_candidates >= 1);
    assert_eq!(report.containers.len(), 1);
    let container = &report.containers[0];
    assert_eq!(container.element.node, NodeId(1));
    assert!(container.reasons.iter().any(|r| r.starts_with("multi-step:")));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stepper_chrome_without_fields_is_not_reported() {
    let stepper = el("div")
        .with_attr("class", "stepper")
        .with_rect(0.0, 0.0, 600.0, 400.0)
        .with_children([
            el("div").with_attr("class", "progress"),
            el("button").with_attr("data-action", "next").with_text("Next"),
        ]);
    let detector = FormDetector::new(DetectionConfig::default().immediate_only());

    let report = detector.detect_candidates(&page(body([stepper])).into_shared()).await;

    assert_eq!(report.multi_step_candidates, 0);
    assert!(report.containers.is_empty());
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn bursts_of_triggers_run_detection_once() {
    let detector = Arc::new(FormDetector::new(DetectionConfig::default().immediate_only()));
    let page = page(signup_form()).into_shared();
    let scheduler = DetectionScheduler::start(detector, page);
    let (sink, reports) = recorder();
    let _results = scheduler.on_result(sink);

    scheduler.trigger(Trigger::Initial);
    scheduler.trigger(Trigger::Mutation(DocumentId(0)));
    scheduler.trigger(Trigger::NewDocument(DocumentId(0)));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].containers.len(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn empty_results_are_retried_a_bounded_number_of_times() {
    let detector = Arc::new(FormDetector::new(DetectionConfig::default().immediate_only()));
    let page = page(body([el("p").with_text("Nothing to fill in")])).into_shared();
    let scheduler = DetectionScheduler::start(detector, page);
    let (sink, reports) = recorder();
    let _results = scheduler.on_result(sink);

    scheduler.trigger(Trigger::Initial);
    tokio::time::sleep(Duration::from_secs(30)).await;

    let reports = reports.lock();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.containers.is_empty()));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn late_documents_trigger_detection() {
    let detector = Arc::new(FormDetector::new(DetectionConfig::default().immediate_only()));
    let page = page(body([el("iframe").with_frame(pending_frame(&format!("{ORIGIN}/late")))])).into_shared();
    let scheduler = DetectionScheduler::start(detector.clone(), page.clone());
    let _connections = scheduler.connect(&page, &detector);
    let (sink, reports) = recorder();
    let _results = scheduler.on_result(sink);

    let late = snapshot("/late", signup_form());
    let added = page
        .write()
        .attach_frame(ElementRef::new(DocumentId(0), NodeId(1)), frame(&format!("{ORIGIN}/late"), late));
    assert_eq!(added, vec![DocumentId(1)]);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].containers[0].element.doc, DocumentId(1));
}
