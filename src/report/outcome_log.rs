use std::path::{Path, PathBuf};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use crate::config::LogFormat;
use crate::error::{SweepError, Result};
use crate::record::{Encryption, ObjectRecord, OutcomeKind, RecordFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStatus {
    NotAttempted,
    WouldRemediate,
    Succeeded,
    Failed,
}

impl RemediationStatus {
    pub fn of(record: &ObjectRecord, dry_run: bool) -> Self {
        match (record.remediation_attempted, record.remediated) {
            (true, true) => RemediationStatus::Succeeded,
            (true, false) => RemediationStatus::Failed,
            (false, _) if dry_run && record.failure.is_none() && record.encryption.needs_remediation() => {
                RemediationStatus::WouldRemediate
            }
            (false, _) => RemediationStatus::NotAttempted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationStatus::NotAttempted => "not_attempted",
            RemediationStatus::WouldRemediate => "would_remediate",
            RemediationStatus::Succeeded => "succeeded",
            RemediationStatus::Failed => "failed",
        }
    }
}

/// One line of the durable per-object log.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    pub timestamp: DateTime<Utc>,
    pub bucket: &'a str,
    pub key: &'a str,
    pub outcome: OutcomeKind,
    pub encryption: &'a Encryption,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub remediation: RemediationStatus,
    pub remediated: bool,
    pub failure: Option<&'a RecordFailure>,
}

impl<'a> LogEntry<'a> {
    pub fn new(record: &'a ObjectRecord, dry_run: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            bucket: &record.container,
            key: &record.key,
            outcome: record.outcome(),
            encryption: &record.encryption,
            size: record.size,
            last_modified: record.last_modified,
            remediation: RemediationStatus::of(record, dry_run),
            remediated: record.remediated,
            failure: record.failure.as_ref(),
        }
    }

    pub fn render(&self, format: LogFormat) -> Result<String> {
        match format {
            LogFormat::Jsonl => Ok(serde_json::to_string(self)?),
            LogFormat::Text => Ok(self.render_text()),
        }
    }

    fn render_text(&self) -> String {
        let last_modified = self
            .last_modified
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());

        let mut line = format!(
            "{} s3://{}/{} outcome={} encryption:{} size={} last_modified={} remediation={}",
            self.timestamp.with_timezone(&Local).format("%Y/%m/%d %H:%M:%S%.6f"),
            self.bucket,
            self.key,
            self.outcome.as_str(),
            self.encryption,
            self.size,
            last_modified,
            self.remediation.as_str(),
        );

        if let Some(failure) = self.failure {
            line.push_str(&format!(" error={}: {}", failure.stage.as_str(), failure.message));
        }

        line
    }
}

/// Append-only sink for terminal outcomes. Only the aggregator writes to it.
pub struct OutcomeLog {
    writer: BufWriter<Box<dyn AsyncWrite + Send + Unpin>>,
    format: LogFormat,
    path: Option<PathBuf>,
}

impl OutcomeLog {
    pub async fn create(path: impl AsRef<Path>, format: LogFormat) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| SweepError::Log(format!("cannot open {}: {}", path.display(), e)))?;

        let mut log = Self::from_writer(file, format);
        log.path = Some(path.to_path_buf());
        Ok(log)
    }

    pub fn from_writer(writer: impl AsyncWrite + Send + Unpin + 'static, format: LogFormat) -> Self {
        let boxed: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);
        Self {
            writer: BufWriter::new(boxed),
            format,
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn write(&mut self, entry: &LogEntry<'_>) -> Result<()> {
        let mut line = entry.render(self.format)?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SweepError::Log(e.to_string()))
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| SweepError::Log(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FailureStage;

    fn record(key: &str) -> ObjectRecord {
        ObjectRecord::new("audit", key, 42, None)
    }

    #[test]
    fn test_text_line_for_compliant_object() {
        let mut r = record("a.txt");
        r.apply_encryption(Encryption::Target("AES256".into()));
        let line = LogEntry::new(&r, false).render(LogFormat::Text).unwrap();
        assert!(line.contains("s3://audit/a.txt outcome=compliant encryption:AES256 size=42"));
        assert!(line.contains("last_modified=-"));
        assert!(line.ends_with("remediation=not_attempted"));
    }

    #[test]
    fn test_text_line_carries_failure_annotation() {
        let mut r = record("e.txt");
        r.mark_failed(FailureStage::Metadata, "HeadObject failed");
        let line = LogEntry::new(&r, false).render(LogFormat::Text).unwrap();
        assert!(line.contains("outcome=failed encryption:????"));
        assert!(line.ends_with("error=metadata: HeadObject failed"));
    }

    #[test]
    fn test_jsonl_line_fields() {
        let mut r = record("c.txt");
        r.apply_encryption(Encryption::None);
        r.remediation_attempted = true;
        r.mark_remediated("AES256");

        let line = LogEntry::new(&r, false).render(LogFormat::Jsonl).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["key"], "c.txt");
        assert_eq!(value["outcome"], "remediated");
        assert_eq!(value["remediation"], "succeeded");
        assert_eq!(value["remediated"], true);
        assert_eq!(value["encryption"]["state"], "target");
        assert_eq!(value["encryption"]["algorithm"], "AES256");
        assert!(value["failure"].is_null());
    }

    #[test]
    fn test_dry_run_marks_would_remediate() {
        let mut r = record("d.txt");
        r.apply_encryption(Encryption::Other("aws:kms".into()));
        assert_eq!(RemediationStatus::of(&r, true), RemediationStatus::WouldRemediate);
        assert_eq!(RemediationStatus::of(&r, false), RemediationStatus::NotAttempted);
    }
}
