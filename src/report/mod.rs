mod outcome_log;
mod summary;

pub use outcome_log::{OutcomeLog, LogEntry, RemediationStatus};
pub use summary::{SweepCounters, SweepReport, SummaryRow};
