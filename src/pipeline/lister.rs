use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use crate::error::{StoreError, SweepError, Result};
use crate::record::ObjectRecord;
use crate::store::ScanCursor;
use super::context::SweepContext;

const DISCOVERY_LOG_INTERVAL: u64 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub pages: u64,
    pub discovered: u64,
}

/// Walks the bucket listing page by page and feeds the discovery queue.
pub struct Lister {
    ctx: SweepContext,
}

impl Lister {
    pub fn new(ctx: SweepContext) -> Self {
        Self { ctx }
    }

    /// Emits one record per listed key, in the order the store returns them.
    /// Any listing failure ends the scan: a lost cursor cannot be resumed
    /// safely, so there is no partial credit.
    ///
    /// Listing order is store-defined. The only entry dropped is one that
    /// opens a page and repeats the key the previous page ended on.
    pub async fn scan(&self, discovered: mpsc::Sender<ObjectRecord>) -> Result<ScanStats> {
        let ctx = &self.ctx;
        let _guard = ctx.tracker.scan_guard();
        let mut cursor = ScanCursor::start();
        let mut stats = ScanStats::default();
        let mut last_key: Option<String> = None;

        info!("Listing objects in s3://{}/{}", ctx.bucket, ctx.prefix.as_deref().unwrap_or(""));

        loop {
            if ctx.tracker.is_aborted() {
                return Err(SweepError::Pipeline("scan stopped: run aborted".into()));
            }

            let page_number = stats.pages + 1;
            let page = ctx
                .store
                .list_page(&ctx.bucket, ctx.prefix.as_deref(), &cursor)
                .await
                .map_err(|source| self.scan_error(page_number, source))?;
            stats.pages = page_number;

            for (index, entry) in page.entries.into_iter().enumerate() {
                if index == 0 && cursor.start_after.as_deref() == Some(entry.key.as_str()) {
                    warn!("Skipping replayed key '{}' on page {}", entry.key, page_number);
                    continue;
                }

                let record = ObjectRecord::new(&ctx.bucket, &entry.key, entry.size, entry.last_modified);
                last_key = Some(entry.key);

                ctx.tracker.register();
                if discovered.send(record).await.is_err() {
                    ctx.tracker.complete();
                    return Err(SweepError::Pipeline("discovery queue closed during scan".into()));
                }

                stats.discovered += 1;
                if stats.discovered % DISCOVERY_LOG_INTERVAL == 0 {
                    info!("Found {} objects..", stats.discovered);
                }
            }

            if !page.truncated {
                break;
            }

            let token = page.next_token.ok_or_else(|| {
                self.scan_error(page_number, StoreError::Unknown {
                    code: Some("MissingContinuationToken".to_string()),
                    message: "truncated listing returned no continuation token".to_string(),
                    raw_error: format!("page {page_number}"),
                })
            })?;

            cursor.advance(token, last_key.clone());
            debug!(
                "continuationToken:{}, startAfter:{}",
                cursor.continuation_token.as_deref().unwrap_or(""),
                cursor.start_after.as_deref().unwrap_or("")
            );
        }

        if stats.discovered == 0 {
            info!("No objects found in s3://{}", ctx.bucket);
        } else {
            info!("Listing complete: {} objects across {} pages", stats.discovered, stats.pages);
        }

        Ok(stats)
    }

    fn scan_error(&self, page: u64, source: StoreError) -> SweepError {
        SweepError::Scan {
            bucket: self.ctx.bucket.clone(),
            page,
            source,
        }
    }
}
