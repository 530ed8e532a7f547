mod encryption;
mod object;

pub use encryption::Encryption;
pub use object::{ObjectRecord, RecordFailure, FailureStage, OutcomeKind};
