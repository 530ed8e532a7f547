use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use crate::record::{Encryption, FailureStage, ObjectRecord};
use super::context::{SharedQueue, SweepContext};

/// Fixed pool of workers reading each discovered object's encryption attribute.
pub struct EnrichmentPool;

impl EnrichmentPool {
    pub fn spawn(
        ctx: &SweepContext,
        workers: usize,
        input: mpsc::Receiver<ObjectRecord>,
        output: mpsc::Sender<ObjectRecord>,
    ) -> Vec<JoinHandle<()>> {
        let queue = SharedQueue::new(input);

        (0..workers.max(1))
            .map(|id| {
                let ctx = ctx.clone();
                let queue = Arc::clone(&queue);
                let output = output.clone();
                tokio::spawn(async move {
                    while let Some(mut record) = queue.next(&ctx.tracker).await {
                        enrich_record(&ctx, &mut record).await;
                        if output.send(record).await.is_err() {
                            break;
                        }
                    }
                    debug!("enrichment worker {} exiting", id);
                })
            })
            .collect()
    }
}

/// A failed metadata read leaves the record at `Unknown` with a failure
/// annotation; it never stops the run.
pub async fn enrich_record(ctx: &SweepContext, record: &mut ObjectRecord) {
    match ctx.store.get_encryption(&record.container, &record.key).await {
        Ok(attribute) => {
            let encryption = Encryption::classify(attribute.as_ref(), &ctx.target);
            record.apply_encryption(encryption);
        }
        Err(e) => {
            warn!("HeadObject failed for {}: {}", record.uri(), e);
            record.mark_failed(FailureStage::Metadata, e.to_string());
        }
    }
}
