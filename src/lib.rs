pub mod error;
pub mod config;
pub mod record;
pub mod store;
pub mod pipeline;
pub mod report;

pub use error::{SweepError, StoreError, Result};
pub use config::{SweepConfig, RunMode, LogFormat};
pub use record::{ObjectRecord, Encryption, RecordFailure, FailureStage, OutcomeKind};
pub use store::{ObjectStore, S3Store, MockStore, ConnectionSettings, EncryptionTarget, SseAttribute, ScanCursor, ListPage, ListEntry};
pub use pipeline::{SweepRunner, SweepContext, Lister, ScanStats, CompletionTracker, Completion, enrich_record, remediate_record};
pub use report::{OutcomeLog, LogEntry, SweepCounters, SweepReport, SummaryRow};
