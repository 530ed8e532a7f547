use chrono::{DateTime, Utc};
use serde::Serialize;
use super::encryption::Encryption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Metadata,
    Copy,
    Verify,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Metadata => "metadata",
            FailureStage::Copy => "copy",
            FailureStage::Verify => "verify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Compliant,
    NonCompliant,
    Remediated,
    Failed,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Compliant => "compliant",
            OutcomeKind::NonCompliant => "non_compliant",
            OutcomeKind::Remediated => "remediated",
            OutcomeKind::Failed => "failed",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            OutcomeKind::Compliant => "✓",
            OutcomeKind::NonCompliant => "⚠",
            OutcomeKind::Remediated => "↻",
            OutcomeKind::Failed => "✗",
        }
    }
}

/// One object under audit. Ownership moves from stage to stage through the
/// pipeline queues, so at most one worker can mutate a record at a time.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectRecord {
    pub container: String,
    pub key: String,
    pub encryption: Encryption,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub remediated: bool,
    pub remediation_attempted: bool,
    pub failure: Option<RecordFailure>,
}

impl ObjectRecord {
    pub fn new(
        container: impl Into<String>,
        key: impl Into<String>,
        size: u64,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
            encryption: Encryption::Unknown,
            size,
            last_modified,
            remediated: false,
            remediation_attempted: false,
            failure: None,
        }
    }

    /// Applies a newly observed encryption state. Backwards moves are refused
    /// and leave the record untouched.
    pub fn apply_encryption(&mut self, next: Encryption) -> bool {
        if self.encryption.can_transition_to(&next) {
            self.encryption = next;
            true
        } else {
            false
        }
    }

    pub fn mark_failed(&mut self, stage: FailureStage, message: impl Into<String>) {
        self.failure = Some(RecordFailure {
            stage,
            message: message.into(),
        });
    }

    pub fn mark_remediated(&mut self, target: &str) {
        if self.apply_encryption(Encryption::Target(target.to_string())) {
            self.remediated = true;
            self.failure = None;
        }
    }

    pub fn outcome(&self) -> OutcomeKind {
        if self.failure.is_some() {
            OutcomeKind::Failed
        } else if self.remediated {
            OutcomeKind::Remediated
        } else if self.encryption.is_compliant() {
            OutcomeKind::Compliant
        } else {
            OutcomeKind::NonCompliant
        }
    }

    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.container, self.key)
    }
}
