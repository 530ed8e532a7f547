//! Remote object-store seam.
//!
//! The pipeline only ever talks to an [`ObjectStore`]: a paginated listing,
//! a metadata-only encryption read, and an in-place copy that rewrites the
//! object under a new encryption attribute. [`S3Store`] drives a real bucket
//! through `aws-sdk-s3`; [`MockStore`] is an in-memory bucket with scripted
//! failures.

mod mock;
mod s3;

use std::fmt;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::error::StoreError;

pub use mock::MockStore;
pub use s3::{S3Store, ConnectionSettings};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Pagination state for resuming a listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCursor {
    pub continuation_token: Option<String>,
    pub start_after: Option<String>,
}

impl ScanCursor {
    pub fn start() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, continuation_token: String, last_key: Option<String>) {
        self.continuation_token = Some(continuation_token);
        if last_key.is_some() {
            self.start_after = last_key;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<ListEntry>,
    pub truncated: bool,
    pub next_token: Option<String>,
}

/// Server-side encryption attribute as reported by a metadata read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseAttribute {
    pub algorithm: String,
    pub kms_key_id: Option<String>,
}

impl SseAttribute {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            kms_key_id: None,
        }
    }

    pub fn with_kms_key(mut self, key_id: impl Into<String>) -> Self {
        self.kms_key_id = Some(key_id.into());
        self
    }
}

impl fmt::Display for SseAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kms_key_id {
            Some(key) => write!(f, "{} key={}", self.algorithm, key),
            None => write!(f, "{}", self.algorithm),
        }
    }
}

/// The encryption attribute remediation writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionTarget {
    pub algorithm: String,
    pub kms_key_id: Option<String>,
}

impl EncryptionTarget {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            kms_key_id: None,
        }
    }

    pub fn with_kms_key(mut self, key_id: impl Into<String>) -> Self {
        self.kms_key_id = Some(key_id.into());
        self
    }

    /// Whether an observed attribute already meets this target.
    ///
    /// Metadata reads report KMS keys as full ARNs, so a bare key id matches
    /// the ARN that ends in it. An alias cannot be resolved without a KMS
    /// call and is checked on the algorithm alone.
    pub fn is_satisfied_by(&self, observed: &SseAttribute) -> bool {
        if observed.algorithm != self.algorithm {
            return false;
        }

        match self.kms_key_id.as_deref() {
            None => true,
            Some(wanted) if is_kms_alias(wanted) => true,
            Some(wanted) => observed.kms_key_id.as_deref().is_some_and(|key| {
                key == wanted || key.ends_with(&format!(":key/{wanted}"))
            }),
        }
    }
}

fn is_kms_alias(key_id: &str) -> bool {
    key_id.starts_with("alias/") || key_id.contains(":alias/")
}

/// Client handle shared read-only by every pipeline worker.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: &ScanCursor,
    ) -> StoreResult<ListPage>;

    /// Returns the object's server-side encryption attribute, `None` when absent.
    async fn get_encryption(&self, bucket: &str, key: &str) -> StoreResult<Option<SseAttribute>>;

    async fn copy_with_encryption(
        &self,
        bucket: &str,
        key: &str,
        target: &EncryptionTarget,
    ) -> StoreResult<()>;
}
