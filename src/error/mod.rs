mod store_error;
mod parser;

use thiserror::Error;

pub use store_error::StoreError;
pub use parser::{parse_store_error, classify_code, ErrorContext};

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("S3 error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Listing of bucket '{bucket}' failed on page {page}: {source}")]
    Scan {
        bucket: String,
        page: u64,
        #[source]
        source: StoreError,
    },

    #[error("Outcome log error: {0}")]
    Log(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    /// The classified store failure behind this error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            SweepError::Store(e) => Some(e),
            SweepError::Scan { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
