use std::fmt;

#[derive(Debug, Clone)]
pub enum StoreError {
    AccessDenied {
        operation: String,
        bucket: String,
        key: Option<String>,
    },

    NoSuchBucket {
        bucket: String,
    },

    NoSuchKey {
        bucket: String,
        key: String,
    },

    Throttled {
        operation: String,
        message: String,
    },

    InvalidCredentials {
        profile: Option<String>,
        reason: String,
    },

    ConnectionFailed {
        reason: String,
    },

    Timeout {
        operation: String,
    },

    Unknown {
        code: Option<String>,
        message: String,
        raw_error: String,
    },
}

impl StoreError {
    pub fn suggestion(&self) -> String {
        match self {
            StoreError::AccessDenied { operation, bucket, .. } => {
                let action = required_action(operation);
                format!(
                    "Request access to s3://{bucket}:\n  \
                     • Required action: {action}\n  \
                     • Check the bucket policy and your IAM role\n  \
                     • Run: aws sts get-caller-identity to confirm the active identity"
                )
            }

            StoreError::NoSuchBucket { bucket } => {
                format!(
                    "Verify the bucket exists:\n  \
                     • Run: aws s3api head-bucket --bucket {bucket}\n  \
                     • Check for typos in the bucket name\n  \
                     • Make sure --aws-region matches the bucket's region"
                )
            }

            StoreError::NoSuchKey { bucket, key } => {
                format!(
                    "The object disappeared during the sweep:\n  \
                     • Run: aws s3api head-object --bucket {bucket} --key {key}\n  \
                     • Objects deleted mid-run are reported, not retried"
                )
            }

            StoreError::Throttled { operation, .. } => {
                format!(
                    "Request rate exceeded during {operation}:\n  \
                     • Lower --workers to reduce concurrent requests\n  \
                     • Spread sweeps of hot prefixes over time\n  \
                     • Re-run the sweep, remediation is idempotent"
                )
            }

            StoreError::InvalidCredentials { profile, .. } => {
                let profile_info = profile.as_ref()
                    .map(|p| format!(" for profile '{p}'"))
                    .unwrap_or_default();
                format!(
                    "Invalid credentials{profile_info}:\n  \
                     • Check AWS_PROFILE and ~/.aws/credentials\n  \
                     • Refresh expired session tokens\n  \
                     • Run: aws sts get-caller-identity"
                )
            }

            StoreError::ConnectionFailed { .. } => {
                "Connection failed:\n  \
                 • Check your network connection\n  \
                 • Verify --endpoint if using an S3-compatible store\n  \
                 • Try again in a few moments".to_string()
            }

            StoreError::Timeout { operation } => {
                format!(
                    "Operation '{operation}' timed out:\n  \
                     • Lower --workers if the store is overloaded\n  \
                     • Re-run the sweep, remediation is idempotent"
                )
            }

            StoreError::Unknown { .. } => {
                "An unexpected error occurred:\n  \
                 • Check the error message for details\n  \
                 • Verify your S3 configuration\n  \
                 • Check AWS status: https://health.aws.amazon.com/health/status".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::AccessDenied { .. } => "ACCESS_DENIED",
            StoreError::NoSuchBucket { .. } => "NO_SUCH_BUCKET",
            StoreError::NoSuchKey { .. } => "NO_SUCH_KEY",
            StoreError::Throttled { .. } => "THROTTLED",
            StoreError::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            StoreError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            StoreError::Timeout { .. } => "TIMEOUT",
            StoreError::Unknown { .. } => "UNKNOWN",
        }
    }
}

fn required_action(operation: &str) -> &'static str {
    match operation {
        "list_page" => "s3:ListBucket",
        "get_encryption" => "s3:GetObject",
        "copy_with_encryption" => "s3:GetObject + s3:PutObject",
        _ => "s3:*",
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AccessDenied { operation, bucket, key } => {
                write!(f, "Access denied during {operation} on s3://{bucket}")?;
                if let Some(k) = key {
                    write!(f, "/{k}")?;
                }
                Ok(())
            }

            StoreError::NoSuchBucket { bucket } => {
                write!(f, "Bucket not found: {bucket}")
            }

            StoreError::NoSuchKey { bucket, key } => {
                write!(f, "Object not found: s3://{bucket}/{key}")
            }

            StoreError::Throttled { operation, message } => {
                write!(f, "Throttled during {operation}: {message}")
            }

            StoreError::InvalidCredentials { reason, profile } => {
                write!(f, "Invalid credentials: {reason}")?;
                if let Some(p) = profile {
                    write!(f, " (profile: {p})")?;
                }
                Ok(())
            }

            StoreError::ConnectionFailed { reason } => {
                write!(f, "Connection failed: {reason}")
            }

            StoreError::Timeout { operation } => {
                write!(f, "Timeout during {operation}")
            }

            StoreError::Unknown { code, message, .. } => {
                if let Some(c) = code {
                    write!(f, "S3 error [{c}]: {message}")
                } else {
                    write!(f, "S3 error: {message}")
                }
            }
        }
    }
}

impl std::error::Error for StoreError {}
