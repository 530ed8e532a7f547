use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::record::{FailureStage, ObjectRecord};
use super::context::{SharedQueue, SweepContext};

/// Fixed pool of workers rewriting non-compliant objects under the target
/// encryption and confirming the result with a fresh metadata read.
pub struct RemediationPool;

impl RemediationPool {
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
                        remediate_record(&ctx, &mut record).await;
                        if output.send(record).await.is_err() {
                            break;
                        }
                    }
                    debug!("remediation worker {} exiting", id);
                })
            })
            .collect()
    }
}

/// Copies the object onto itself under the target encryption. Success means
/// the copy returned and a later read shows the target attribute; the store
/// may lag behind its own copy, so up to `verify_attempts` reads are made.
///
/// Records that are already compliant, or whose state is unknown, are left
/// alone without touching the store.
pub async fn remediate_record(ctx: &SweepContext, record: &mut ObjectRecord) {
    if record.failure.is_some() || !record.encryption.needs_remediation() {
        return;
    }

    info!("{} encryption:{} -> {}", record.key, record.encryption, ctx.target.algorithm);
    record.remediation_attempted = true;

    if let Err(e) = ctx
        .store
        .copy_with_encryption(&record.container, &record.key, &ctx.target)
        .await
    {
        warn!("CopyObject failed for {}: {}", record.uri(), e);
        record.mark_failed(FailureStage::Copy, e.to_string());
        return;
    }

    let mut last_problem = String::new();
    for attempt in 1..=ctx.verify_attempts {
        match ctx.store.get_encryption(&record.container, &record.key).await {
            Ok(Some(observed)) if ctx.target.is_satisfied_by(&observed) => {
                record.mark_remediated(&observed.algorithm);
                return;
            }
            Ok(observed) => {
                last_problem = format!(
                    "expected {} after copy, read {}",
                    ctx.target.algorithm,
                    observed.map_or_else(|| "NONE".to_string(), |o| o.to_string())
                );
            }
            Err(e) => {
                last_problem = format!("verification read failed: {e}");
            }
        }

        if attempt < ctx.verify_attempts {
            debug!("verify attempt {} for {}: {}", attempt, record.uri(), last_problem);
            tokio::time::sleep(ctx.verify_delay).await;
        }
    }

    warn!("Verification failed for {}: {}", record.uri(), last_problem);
    record.mark_failed(FailureStage::Verify, last_problem);
}
