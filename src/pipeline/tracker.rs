use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Drained,
    Aborted,
}

/// Live count of records between discovery and their terminal log write.
///
/// The total object count is unknown until the last page arrives, so the
/// run ends when this count crosses zero rather than after a fixed number of
/// items. The Lister holds a [`ScanGuard`] for the whole scan, which keeps
/// the count above zero while pages remain.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    in_flight: AtomicUsize,
    aborted: AtomicBool,
    changed: Notify,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per record, before it is handed to the first queue.
    pub fn register(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Called once per record, after its outcome has been written.
    pub fn complete(&self) {
        let prev = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match prev {
            Ok(1) => self.changed.notify_waiters(),
            Ok(_) => {}
            Err(_) => warn!("completion recorded with nothing in flight"),
        }
    }

    pub fn scan_guard(self: &Arc<Self>) -> ScanGuard {
        self.register();
        ScanGuard {
            tracker: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.changed.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Resolves once [`abort`](Self::abort) has been called.
    pub async fn aborted(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Blocks until every registered record has completed, or the run aborts.
    pub async fn wait_idle(&self) -> Completion {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_aborted() {
                return Completion::Aborted;
            }
            if self.in_flight() == 0 {
                return Completion::Drained;
            }
            notified.await;
        }
    }
}

/// Holds one slot in the tracker for the duration of a scan.
pub struct ScanGuard {
    tracker: Arc<CompletionTracker>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.tracker.complete();
    }
}
