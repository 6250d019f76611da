use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::detection::orchestrator::{DetectionReport, FormDetector};
use crate::dom::document::DocumentId;
use crate::dom::traversal::{DocumentAdded, SharedPage};
use crate::monitor::network::SchemaCaptured;
use crate::monitor::stability::QualifyingChange;
use crate::monitor::subscription::{Sink, Subscribers, Subscription};

/// Reasons to (re)run detection. All funnel into one guarded entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Initial,
    NewDocument(DocumentId),
    Mutation(DocumentId),
    SchemaCaptured(DocumentId),
    /// Scheduled after an empty result; carries the attempt number.
    Retry(u32),
}

/// Debounces triggers and runs at most one detection at a time, retrying
/// with a fixed backoff while results stay empty.
pub struct DetectionScheduler {
    tx: UnboundedSender<Trigger>,
    results: Arc<Subscribers<DetectionReport>>,
    task: JoinHandle<()>,
}

impl DetectionScheduler {
    /// Spawn the scheduling loop on the current runtime.
    pub fn start(detector: Arc<FormDetector>, page: SharedPage) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let results = Arc::new(Subscribers::new());

        let worker = Worker {
            debounce: Duration::from_millis(detector.config().debounce_ms),
            backoff: Duration::from_millis(detector.config().retry_backoff_ms),
            max_attempts: detector.config().max_attempts,
            retry_tx: tx.downgrade(),
            results: results.clone(),
            detector,
            page,
        };
        let task = tokio::spawn(worker.run(rx));

        Self { tx, results, task }
    }

    pub fn trigger(&self, trigger: Trigger) {
        if self.tx.send(trigger).is_err() {
            debug!(?trigger, "scheduler stopped; trigger dropped");
        }
    }

    /// Receive every completed report.
    pub fn on_result(&self, sink: Sink<DetectionReport>) -> Subscription {
        self.results.subscribe(sink)
    }

    /// Route new documents, qualifying mutations and captured schemas into
    /// triggers. Drop the returned handles to disconnect.
    pub fn connect(&self, page: &SharedPage, detector: &FormDetector) -> Vec<Subscription> {
        let documents = {
            let tx = self.tx.clone();
            page.read().on_document_added(Arc::new(move |added: &DocumentAdded| {
                let _ = tx.send(Trigger::NewDocument(added.document));
            }))
        };

        let tx = self.tx.clone();
        let mutations = detector
            .monitor()
            .on_qualifying_change(Arc::new(move |change: &QualifyingChange| {
                let _ = tx.send(Trigger::Mutation(change.document));
            }));

        let tx = self.tx.clone();
        let schemas = detector.network().subscribe(Arc::new(move |captured: &SchemaCaptured| {
            let _ = tx.send(Trigger::SchemaCaptured(captured.document));
        }));

        vec![documents, mutations, schemas]
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Worker {
    detector: Arc<FormDetector>,
    page: SharedPage,
    debounce: Duration,
    backoff: Duration,
    max_attempts: u32,
    retry_tx: WeakUnboundedSender<Trigger>,
    results: Arc<Subscribers<DetectionReport>>,
}

impl Worker {
    async fn run(self, mut rx: UnboundedReceiver<Trigger>) {
        let mut attempts = 0u32;

        while let Some(first) = rx.recv().await {
            let (trigger, open) = self.settle(first, &mut rx).await;
            if !matches!(trigger, Trigger::Retry(_)) {
                attempts = 0;
            }

            debug!(?trigger, "running detection");
            if let Some(report) = self.detector.run_guarded(&self.page).await {
                if report.containers.is_empty() {
                    attempts += 1;
                    if attempts < self.max_attempts {
                        self.schedule_retry(attempts);
                    } else {
                        info!(attempts, "no form containers found; giving up");
                    }
                } else {
                    attempts = 0;
                }
                self.results.emit(&report);
            }

            if !open {
                break;
            }
        }
    }

    /// Absorb triggers until `debounce` passes without a new one. Returns the
    /// last trigger and whether the channel is still open.
    async fn settle(&self, first: Trigger, rx: &mut UnboundedReceiver<Trigger>) -> (Trigger, bool) {
        let mut latest = first;
        loop {
            match tokio::time::timeout(self.debounce, rx.recv()).await {
                Ok(Some(next)) => {
                    // A real change outranks a pending retry.
                    if !matches!(next, Trigger::Retry(_)) || matches!(latest, Trigger::Retry(_)) {
                        latest = next;
                    }
                }
                Ok(None) => return (latest, false),
                Err(_) => return (latest, true),
            }
        }
    }

    fn schedule_retry(&self, attempt: u32) {
        let Some(tx) = self.retry_tx.upgrade() else {
            return;
        };
        let backoff = self.backoff;
        debug!(attempt, backoff_ms = backoff.as_millis() as u64, "retry scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let _ = tx.send(Trigger::Retry(attempt));
        });
    }
}
