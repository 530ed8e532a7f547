use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use crate::config::RunMode;
use crate::record::{ObjectRecord, OutcomeKind};

/// Running totals kept by the aggregator. Every logged record lands in
/// exactly one of the outcome buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepCounters {
    pub logged: u64,
    pub compliant: u64,
    pub non_compliant: u64,
    pub remediated: u64,
    pub failed: u64,
}

impl SweepCounters {
    pub fn record(&mut self, record: &ObjectRecord) {
        self.logged += 1;
        match record.outcome() {
            OutcomeKind::Compliant => self.compliant += 1,
            OutcomeKind::NonCompliant => self.non_compliant += 1,
            OutcomeKind::Remediated => self.remediated += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
    }

    pub fn progress_line(&self) -> String {
        format!(
            "{} objects logged: {} compliant, {} non-compliant, {} remediated, {} failed",
            self.logged, self.compliant, self.non_compliant, self.remediated, self.failed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub bucket: String,
    pub mode: RunMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub pages: u64,
    pub discovered: u64,
    pub counters: SweepCounters,
    pub log_file: Option<PathBuf>,
}

impl SweepReport {
    pub fn rows(&self) -> Vec<SummaryRow> {
        let c = &self.counters;
        let mut rows = vec![SummaryRow {
            outcome: "discovered".to_string(),
            objects: self.discovered.to_string(),
            share: percent(self.discovered, self.discovered),
        }];

        rows.extend(
            [
                (OutcomeKind::Compliant, c.compliant),
                (OutcomeKind::NonCompliant, c.non_compliant),
                (OutcomeKind::Remediated, c.remediated),
                (OutcomeKind::Failed, c.failed),
            ]
            .into_iter()
            .map(|(kind, count)| SummaryRow {
                outcome: format!("{} {}", kind.symbol(), kind.as_str()),
                objects: count.to_string(),
                share: percent(count, self.discovered),
            }),
        );

        rows
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Outcome")]
    pub outcome: String,
    #[tabled(rename = "Objects")]
    pub objects: String,
    #[tabled(rename = "Share")]
    pub share: String,
}

fn percent(part: u64, total: u64) -> String {
    if total == 0 {
        "-".to_string()
    } else {
        format!("{:.1}%", part as f64 * 100.0 / total as f64)
    }
}
