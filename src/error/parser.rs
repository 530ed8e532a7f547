use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use super::store_error::StoreError;

pub fn parse_store_error<E, R>(error: SdkError<E, R>, context: ErrorContext) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let operation = context.operation.clone().unwrap_or_else(|| "request".to_string());

    match &error {
        SdkError::TimeoutError(_) => StoreError::Timeout { operation },

        SdkError::DispatchFailure(failure) => {
            if failure.is_timeout() {
                StoreError::Timeout { operation }
            } else {
                StoreError::ConnectionFailed {
                    reason: DisplayErrorContext(&error).to_string(),
                }
            }
        }

        SdkError::ConstructionFailure(_) => StoreError::InvalidCredentials {
            profile: context.profile.clone(),
            reason: DisplayErrorContext(&error).to_string(),
        },

        _ => {
            let message = error.message().unwrap_or("no message").to_string();
            classify_code(
                error.code(),
                &message,
                DisplayErrorContext(&error).to_string(),
                context,
            )
        }
    }
}

/// Maps an S3 error code onto a [`StoreError`]. HeadObject 404s carry the
/// bare `NotFound` code with no body, so it is treated like `NoSuchKey`.
pub fn classify_code(
    code: Option<&str>,
    message: &str,
    raw_error: String,
    context: ErrorContext,
) -> StoreError {
    let operation = context.operation.unwrap_or_else(|| "request".to_string());
    let bucket = context.bucket.unwrap_or_default();

    match code {
        Some("AccessDenied") | Some("AllAccessDisabled") | Some("AccountProblem") => {
            StoreError::AccessDenied {
                operation,
                bucket,
                key: context.key,
            }
        }

        Some("NoSuchBucket") => StoreError::NoSuchBucket { bucket },

        Some("NoSuchKey") | Some("NotFound") => match context.key {
            Some(key) => StoreError::NoSuchKey { bucket, key },
            None => StoreError::NoSuchBucket { bucket },
        },

        Some("SlowDown") | Some("Throttling") | Some("ThrottlingException")
        | Some("RequestLimitExceeded") | Some("TooManyRequests") => StoreError::Throttled {
            operation,
            message: message.to_string(),
        },

        Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") | Some("ExpiredToken")
        | Some("InvalidToken") | Some("TokenRefreshRequired") => StoreError::InvalidCredentials {
            profile: context.profile,
            reason: message.to_string(),
        },

        Some("RequestTimeout") => StoreError::Timeout { operation },

        _ => StoreError::Unknown {
            code: code.map(|c| c.to_string()),
            message: message.to_string(),
            raw_error,
        },
    }
}

#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub profile: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_object(mut self, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self.key = Some(key.into());
        self
    }

    pub fn with_profile(mut self, profile: Option<&str>) -> Self {
        self.profile = profile.map(|p| p.to_string());
        self
    }
}
