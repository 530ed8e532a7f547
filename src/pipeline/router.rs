use tokio::sync::mpsc;
use crate::record::ObjectRecord;
use super::context::SweepContext;

/// Splits enriched records: those needing a rewrite go to the remediation
/// queue, everything else is already terminal and goes straight to the
/// outcome log.
pub async fn route(
    ctx: SweepContext,
    mut enriched: mpsc::Receiver<ObjectRecord>,
    to_remediate: Option<mpsc::Sender<ObjectRecord>>,
    outcomes: mpsc::Sender<ObjectRecord>,
) {
    loop {
        let record = tokio::select! {
            biased;
            _ = ctx.tracker.aborted() => break,
            record = enriched.recv() => match record {
                Some(r) => r,
                None => break,
            },
        };

        let sent = match &to_remediate {
            Some(queue) if record.failure.is_none() && record.encryption.needs_remediation() => {
                queue.send(record).await.is_ok()
            }
            _ => outcomes.send(record).await.is_ok(),
        };

        if !sent {
            break;
        }
    }
}
