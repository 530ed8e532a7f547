use tokio::sync::mpsc;
use tracing::{error, info};
use crate::error::Result;
use crate::record::ObjectRecord;
use crate::report::{LogEntry, OutcomeLog, SweepCounters};
use super::context::SweepContext;

/// Fan-in stage: writes one durable line per terminal record, keeps the
/// counters, and releases the record's slot in the completion tracker.
pub struct Aggregator {
    ctx: SweepContext,
    log: OutcomeLog,
    counters: SweepCounters,
    progress_interval: u64,
}

impl Aggregator {
    pub fn new(ctx: SweepContext, log: OutcomeLog, progress_interval: u64) -> Self {
        Self {
            ctx,
            log,
            counters: SweepCounters::default(),
            progress_interval,
        }
    }

    /// Drains `outcomes` until every producer has hung up. A failed log
    /// write aborts the whole run.
    pub async fn run(mut self, mut outcomes: mpsc::Receiver<ObjectRecord>) -> Result<SweepCounters> {
        while let Some(record) = outcomes.recv().await {
            if let Err(e) = self.log_outcome(&record).await {
                error!("Cannot write outcome for {}: {}", record.uri(), e);
                self.ctx.tracker.abort();
                return Err(e);
            }
        }

        self.log.flush().await?;
        info!("{}", self.counters.progress_line());
        Ok(self.counters)
    }

    async fn log_outcome(&mut self, record: &ObjectRecord) -> Result<()> {
        let entry = LogEntry::new(record, self.ctx.dry_run);
        self.log.write(&entry).await?;
        self.counters.record(record);
        self.ctx.tracker.complete();

        if self.progress_interval > 0 && self.counters.logged % self.progress_interval == 0 {
            self.log.flush().await?;
            info!("{}", self.counters.progress_line());
        }

        Ok(())
    }
}
