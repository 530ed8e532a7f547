use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use crate::config::{RunMode, SweepConfig};
use crate::store::{EncryptionTarget, ObjectStore};
use super::tracker::CompletionTracker;

/// Run-scoped handles given to every stage at construction.
#[derive(Clone)]
pub struct SweepContext {
    pub store: Arc<dyn ObjectStore>,
    pub tracker: Arc<CompletionTracker>,
    pub bucket: String,
    pub prefix: Option<String>,
    pub target: EncryptionTarget,
    pub mode: RunMode,
    pub dry_run: bool,
    pub verify_attempts: u32,
    pub verify_delay: Duration,
}

impl SweepContext {
    pub fn new(store: Arc<dyn ObjectStore>, config: &SweepConfig, mode: RunMode) -> Self {
        Self {
            store,
            tracker: Arc::new(CompletionTracker::new()),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            target: config.encryption_target(),
            mode,
            dry_run: config.dry_run,
            verify_attempts: config.verify_attempts.max(1),
            verify_delay: Duration::from_millis(config.verify_delay_ms),
        }
    }

    /// Whether non-compliant records are sent on to the remediation pool.
    pub fn remediates(&self) -> bool {
        self.mode == RunMode::Remediate && !self.dry_run
    }
}

/// Bounded queue consumed by a fixed pool of workers.
pub struct SharedQueue<T> {
    rx: Mutex<mpsc::Receiver<T>>,
}

impl<T: Send> SharedQueue<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Arc<Self> {
        Arc::new(Self { rx: Mutex::new(rx) })
    }

    /// Next item, or `None` once the queue is closed and empty or the run aborted.
    pub async fn next(&self, tracker: &CompletionTracker) -> Option<T> {
        if tracker.is_aborted() {
            return None;
        }

        tokio::select! {
            biased;
            _ = tracker.aborted() => None,
            item = async { self.rx.lock().await.recv().await } => item,
        }
    }
}
