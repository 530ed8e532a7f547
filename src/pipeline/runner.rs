use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use crate::config::{RunMode, SweepConfig};
use crate::error::{SweepError, Result};
use crate::report::{OutcomeLog, SweepReport};
use crate::store::ObjectStore;
use super::aggregator::Aggregator;
use super::context::SweepContext;
use super::enrich::EnrichmentPool;
use super::lister::Lister;
use super::remediate::RemediationPool;
use super::router::route;
use super::tracker::Completion;

/// Orchestrates one sweep of a bucket:
///
/// ```text
/// Lister -> discovered -> EnrichmentPool -> enriched -> router -+-> outcomes -> Aggregator
///                                                               |       ^
///                                                               +-> to_remediate -> RemediationPool
/// ```
///
/// Every queue is bounded, so a slow stage throttles the Lister.
pub struct SweepRunner {
    store: Arc<dyn ObjectStore>,
    config: SweepConfig,
}

impl SweepRunner {
    pub fn new(store: Arc<dyn ObjectStore>, config: SweepConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub async fn report(&self) -> Result<SweepReport> {
        self.run(RunMode::Report).await
    }

    pub async fn remediate(&self) -> Result<SweepReport> {
        self.run(RunMode::Remediate).await
    }

    pub async fn run(&self, mode: RunMode) -> Result<SweepReport> {
        self.config.validate()?;
        let path = self.config.log_path(mode);
        let log = OutcomeLog::create(&path, self.config.log_format).await?;
        info!("Writing outcomes to {}", path.display());
        self.run_with_log(mode, log).await
    }

    pub async fn run_with_log(&self, mode: RunMode, log: OutcomeLog) -> Result<SweepReport> {
        self.config.validate()?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let ctx = SweepContext::new(Arc::clone(&self.store), &self.config, mode);
        let capacity = self.config.queue_capacity();
        let workers = self.config.workers;
        let log_file = log.path().map(Path::to_path_buf);

        let (discovered_tx, discovered_rx) = mpsc::channel(capacity);
        let (enriched_tx, enriched_rx) = mpsc::channel(capacity);
        let (outcome_tx, outcome_rx) = mpsc::channel(capacity);

        let aggregator = tokio::spawn(
            Aggregator::new(ctx.clone(), log, self.config.progress_interval).run(outcome_rx),
        );

        let mut remediators = Vec::new();
        let to_remediate = if ctx.remediates() {
            let (tx, rx) = mpsc::channel(capacity);
            remediators = RemediationPool::spawn(&ctx, workers, rx, outcome_tx.clone());
            Some(tx)
        } else {
            None
        };

        let router = tokio::spawn(route(ctx.clone(), enriched_rx, to_remediate, outcome_tx));
        let enrichers = EnrichmentPool::spawn(&ctx, workers, discovered_rx, enriched_tx);

        info!(
            "Sweeping s3://{} in {} mode with {} workers (queue capacity {})",
            ctx.bucket,
            mode.as_str(),
            workers,
            capacity
        );

        let scan = Lister::new(ctx.clone()).scan(discovered_tx).await;

        let completion = match &scan {
            Ok(_) => ctx.tracker.wait_idle().await,
            Err(e) => {
                error!("{}", e);
                ctx.tracker.abort();
                Completion::Aborted
            }
        };

        join_all(enrichers, "enrichment").await?;
        join_all(vec![router], "router").await?;
        join_all(remediators, "remediation").await?;
        let counters = aggregator
            .await
            .map_err(|e| SweepError::Pipeline(format!("aggregator task failed: {e}")))??;

        let stats = scan?;

        if completion == Completion::Aborted {
            return Err(SweepError::Pipeline("run aborted before all outcomes were logged".into()));
        }

        if counters.logged != stats.discovered {
            return Err(SweepError::Pipeline(format!(
                "{} objects discovered but {} outcomes logged",
                stats.discovered, counters.logged
            )));
        }

        Ok(SweepReport {
            bucket: ctx.bucket.clone(),
            mode,
            dry_run: ctx.dry_run,
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            pages: stats.pages,
            discovered: stats.discovered,
            counters,
            log_file,
        })
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>, stage: &str) -> Result<()> {
    for handle in handles {
        handle
            .await
            .map_err(|e| SweepError::Pipeline(format!("{stage} task failed: {e}")))?;
    }
    Ok(())
}
