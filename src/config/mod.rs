use std::fs;
use std::path::{Path, PathBuf};
use chrono::Local;
use serde::{Deserialize, Serialize};
use crate::error::{SweepError, Result};
use crate::store::{ConnectionSettings, EncryptionTarget};

pub const DEFAULT_TARGET_ALGORITHM: &str = "AES256";
pub const KMS_ALGORITHM: &str = "aws:kms";
pub const MAX_WORKERS: usize = 4096;
pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Report,
    Remediate,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Report => "report",
            RunMode::Remediate => "remediate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Jsonl,
}

/// Settings for one sweep, layered from defaults, an optional YAML file and
/// the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub bucket: String,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub profile: Option<String>,
    pub target_algorithm: String,
    pub kms_key_id: Option<String>,
    pub workers: usize,
    pub queue_capacity: Option<usize>,
    pub progress_interval: u64,
    pub verify_attempts: u32,
    pub verify_delay_ms: u64,
    pub log_file: Option<PathBuf>,
    pub log_format: LogFormat,
    pub dry_run: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: None,
            region: None,
            endpoint: None,
            profile: None,
            target_algorithm: DEFAULT_TARGET_ALGORITHM.to_string(),
            kms_key_id: None,
            workers: default_workers(),
            queue_capacity: None,
            progress_interval: 1000,
            verify_attempts: 1,
            verify_delay_ms: 500,
            log_file: None,
            log_format: LogFormat::Text,
            dry_run: false,
        }
    }
}

/// Remote calls dominate worker time, so the pool is sized well past the core count.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_mul(16)
        .min(MAX_WORKERS)
}

impl SweepConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SweepError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_verify(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.verify_attempts = attempts;
        self.verify_delay_ms = delay_ms;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(SweepError::Config("S3 bucket name is empty".into()));
        }
        if self.workers == 0 {
            return Err(SweepError::Config("worker count must be at least 1".into()));
        }
        if self.workers > MAX_WORKERS {
            return Err(SweepError::Config(format!(
                "worker count {} exceeds the maximum of {}",
                self.workers, MAX_WORKERS
            )));
        }
        match self.queue_capacity {
            Some(0) => return Err(SweepError::Config("queue capacity must be at least 1".into())),
            Some(n) if n > MAX_QUEUE_CAPACITY => {
                return Err(SweepError::Config(format!(
                    "queue capacity {} exceeds the maximum of {}",
                    n, MAX_QUEUE_CAPACITY
                )))
            }
            _ => {}
        }
        if self.verify_attempts == 0 {
            return Err(SweepError::Config("verify attempts must be at least 1".into()));
        }
        if self.target_algorithm.trim().is_empty() {
            return Err(SweepError::Config("target encryption algorithm is empty".into()));
        }
        if self.kms_key_id.is_some() && self.target_algorithm != KMS_ALGORITHM {
            return Err(SweepError::Config(format!(
                "a KMS key id requires --target-algorithm {}, got '{}'",
                KMS_ALGORITHM, self.target_algorithm
            )));
        }
        Ok(())
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.workers.saturating_mul(2))
            .clamp(1, MAX_QUEUE_CAPACITY)
    }

    pub fn encryption_target(&self) -> EncryptionTarget {
        let target = EncryptionTarget::new(&self.target_algorithm);
        match &self.kms_key_id {
            Some(key) => target.with_kms_key(key),
            None => target,
        }
    }

    pub fn connection(&self) -> ConnectionSettings {
        ConnectionSettings {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            profile: self.profile.clone(),
        }
    }

    /// Log path for this run: the configured one, or
    /// `<YYYYmmdd_HHMMSS>_<mode>_<bucket>.log` in the working directory.
    pub fn log_path(&self, mode: RunMode) -> PathBuf {
        match &self.log_file {
            Some(path) => path.clone(),
            None => PathBuf::from(format!(
                "{}_{}_{}.log",
                Local::now().format("%Y%m%d_%H%M%S"),
                mode.as_str(),
                self.bucket.replace('/', "_"),
            )),
        }
    }
}
