use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::error::StoreError;
use super::{EncryptionTarget, ListEntry, ListPage, ObjectStore, ScanCursor, SseAttribute, StoreResult};

const TOKEN_PREFIX: &str = "mock-token:";

#[derive(Debug, Clone)]
struct MockObject {
    size: u64,
    last_modified: Option<DateTime<Utc>>,
    encryption: Option<String>,
    kms_key_id: Option<String>,
}

/// In-memory bucket store with per-key failure scripting.
///
/// Listing walks keys in lexicographic order, `page_size` at a time, and
/// hands out continuation tokens that encode the last key of the page.
pub struct MockStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, MockObject>>>,
    page_size: usize,
    latency: Option<Duration>,
    fail_list_call: Option<usize>,
    fail_metadata: HashSet<String>,
    fail_copy: HashSet<String>,
    stale_after_copy: HashSet<String>,
    list_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    copy_calls: AtomicUsize,
    copied: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            page_size: 1000,
            latency: None,
            fail_list_call: None,
            fail_metadata: HashSet::new(),
            fail_copy: HashSet::new(),
            stale_after_copy: HashSet::new(),
            list_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
            copy_calls: AtomicUsize::new(0),
            copied: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sleeps this long inside every remote call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(bucket.to_string())
            .or_default();
        self
    }

    pub fn with_object(self, bucket: &str, key: &str, size: u64, encryption: Option<&str>) -> Self {
        self.insert(bucket, key, size, encryption);
        self
    }

    /// Adds an object encrypted under `aws:kms` with the given key.
    pub fn with_kms_object(self, bucket: &str, key: &str, size: u64, kms_key_id: &str) -> Self {
        self.insert(bucket, key, size, Some("aws:kms"));
        if let Some(object) = self
            .buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(bucket)
            .and_then(|objects| objects.get_mut(key))
        {
            object.kms_key_id = Some(kms_key_id.to_string());
        }
        self
    }

    /// Makes the n-th listing call (1-based) fail.
    pub fn failing_list_call(mut self, call: usize) -> Self {
        self.fail_list_call = Some(call);
        self
    }

    pub fn failing_metadata(mut self, key: &str) -> Self {
        self.fail_metadata.insert(key.to_string());
        self
    }

    pub fn failing_copy(mut self, key: &str) -> Self {
        self.fail_copy.insert(key.to_string());
        self
    }

    /// The copy succeeds but later reads still return the pre-copy attribute.
    pub fn stale_after_copy(mut self, key: &str) -> Self {
        self.stale_after_copy.insert(key.to_string());
        self
    }

    pub fn insert(&self, bucket: &str, key: &str, size: u64, encryption: Option<&str>) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            MockObject {
                size,
                last_modified: Some(Utc::now()),
                encryption: encryption.map(|e| e.to_string()),
                kms_key_id: None,
            },
        );
    }

    pub fn encryption_of(&self, bucket: &str, key: &str) -> Option<String> {
        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .and_then(|object| object.encryption.clone())
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn copy_calls(&self) -> usize {
        self.copy_calls.load(Ordering::SeqCst)
    }

    pub fn copied_keys(&self) -> Vec<String> {
        self.copied.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected(operation: &str, message: String) -> StoreError {
        StoreError::Unknown {
            code: Some("InjectedFailure".to_string()),
            message,
            raw_error: format!("mock {operation} failure"),
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: &ScanCursor,
    ) -> StoreResult<ListPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.simulate_latency().await;

        if self.fail_list_call == Some(call) {
            return Err(Self::injected("list_page", format!("listing call {call} failed")));
        }

        let after = match &cursor.continuation_token {
            Some(token) => match token.strip_prefix(TOKEN_PREFIX) {
                Some(last_key) => Some(last_key.to_string()),
                None => {
                    return Err(StoreError::Unknown {
                        code: Some("InvalidArgument".to_string()),
                        message: "The continuation token provided is incorrect".to_string(),
                        raw_error: token.clone(),
                    })
                }
            },
            None => cursor.start_after.clone(),
        };

        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket { bucket: bucket.to_string() })?;

        let mut remaining = objects
            .iter()
            .filter(|(key, _)| after.as_deref().map_or(true, |a| key.as_str() > a))
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)));

        let entries: Vec<ListEntry> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(key, object)| ListEntry {
                key: key.clone(),
                size: object.size,
                last_modified: object.last_modified,
            })
            .collect();

        let truncated = remaining.next().is_some();
        let next_token = if truncated {
            entries.last().map(|e| format!("{TOKEN_PREFIX}{}", e.key))
        } else {
            None
        };

        Ok(ListPage {
            entries,
            truncated,
            next_token,
        })
    }

    async fn get_encryption(&self, bucket: &str, key: &str) -> StoreResult<Option<SseAttribute>> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_metadata.contains(key) {
            return Err(Self::injected("get_encryption", format!("HeadObject failed for {key}")));
        }

        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let object = buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| StoreError::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        Ok(object.encryption.as_ref().map(|algorithm| SseAttribute {
            algorithm: algorithm.clone(),
            kms_key_id: object.kms_key_id.clone(),
        }))
    }

    async fn copy_with_encryption(
        &self,
        bucket: &str,
        key: &str,
        target: &EncryptionTarget,
    ) -> StoreResult<()> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_copy.contains(key) {
            return Err(Self::injected("copy_with_encryption", format!("CopyObject failed for {key}")));
        }

        {
            let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
            let object = buckets
                .get_mut(bucket)
                .and_then(|objects| objects.get_mut(key))
                .ok_or_else(|| StoreError::NoSuchKey {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })?;

            if !self.stale_after_copy.contains(key) {
                object.encryption = Some(target.algorithm.clone());
                object.kms_key_id = target.kms_key_id.clone();
                object.last_modified = Some(Utc::now());
            }
        }

        self.copied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.to_string());

        Ok(())
    }
}
