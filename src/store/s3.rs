use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::types::{MetadataDirective, ServerSideEncryption};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;
use crate::error::{parse_store_error, ErrorContext, SweepError, Result};
use super::{EncryptionTarget, ListEntry, ListPage, ObjectStore, ScanCursor, SseAttribute, StoreResult};

/// Characters left unescaped in the `x-amz-copy-source` header.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub profile: Option<String>,
}

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    profile: Option<String>,
}

impl S3Store {
    /// Loads the AWS config chain and resolves credentials once up front, so a
    /// missing or broken credentials source is a configuration error rather
    /// than a failure on the first listing call.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }

        let sdk_config = loader.load().await;
        ensure_credentials(sdk_config.credentials_provider(), settings.profile.as_deref()).await?;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &settings.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            profile: settings.profile.clone(),
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client, profile: None }
    }

    fn context(&self, operation: &str) -> ErrorContext {
        ErrorContext::new()
            .with_operation(operation)
            .with_profile(self.profile.as_deref())
    }
}

async fn ensure_credentials(
    provider: Option<SharedCredentialsProvider>,
    profile: Option<&str>,
) -> Result<()> {
    let provider = provider
        .ok_or_else(|| SweepError::Config("no AWS credentials provider configured".into()))?;

    provider.provide_credentials().await.map_err(|e| {
        let source = match profile {
            Some(p) => format!(" for profile '{p}'"),
            None => String::new(),
        };
        SweepError::Config(format!("cannot load AWS credentials{}: {}", source, DisplayErrorContext(&e)))
    })?;

    Ok(())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cursor: &ScanCursor,
    ) -> StoreResult<ListPage> {
        let mut request = self.client.list_objects_v2().bucket(bucket);

        if let Some(prefix) = prefix {
            request = request.prefix(prefix);
        }
        // StartAfter is ignored next to a token and rejected by directory buckets.
        if let Some(token) = &cursor.continuation_token {
            request = request.continuation_token(token);
        } else if let Some(start_after) = &cursor.start_after {
            request = request.start_after(start_after);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| parse_store_error(e, self.context("list_page").with_bucket(bucket)))?;

        let entries = resp
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(ListEntry {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                })
            })
            .collect();

        Ok(ListPage {
            entries,
            truncated: resp.is_truncated().unwrap_or(false),
            next_token: resp.next_continuation_token().map(|t| t.to_string()),
        })
    }

    async fn get_encryption(&self, bucket: &str, key: &str) -> StoreResult<Option<SseAttribute>> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| parse_store_error(e, self.context("get_encryption").with_object(bucket, key)))?;

        Ok(head.server_side_encryption().map(|sse| SseAttribute {
            algorithm: sse.as_str().to_string(),
            kms_key_id: head.ssekms_key_id().map(|k| k.to_string()),
        }))
    }

    async fn copy_with_encryption(
        &self,
        bucket: &str,
        key: &str,
        target: &EncryptionTarget,
    ) -> StoreResult<()> {
        let copy_source = format!("{}/{}", bucket, utf8_percent_encode(key, COPY_SOURCE));

        let mut request = self
            .client
            .copy_object()
            .bucket(bucket)
            .key(key)
            .copy_source(copy_source)
            .metadata_directive(MetadataDirective::Copy)
            .server_side_encryption(ServerSideEncryption::from(target.algorithm.as_str()));

        if let Some(kms_key_id) = &target.kms_key_id {
            request = request.ssekms_key_id(kms_key_id);
        }

        request
            .send()
            .await
            .map_err(|e| parse_store_error(e, self.context("copy_with_encryption").with_object(bucket, key)))?;

        Ok(())
    }
}
