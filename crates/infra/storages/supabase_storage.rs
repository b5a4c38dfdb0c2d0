use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{
        BehaviorVersion, Credentials, Region, StalledStreamProtectionConfig,
        timeout::TimeoutConfig,
    },
    error::{ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
};
use http::Uri;
use tracing::{debug, info};

use crate::domain::repositories::storage::{EmojiStorageClient, StoredObject};

/// Emoji PNGs are around a megabyte; anything slower than this is a stuck connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
const EMOJI_CACHE_CONTROL: &str = "max-age=3600";

#[derive(Debug, Clone)]
pub struct SupabaseStorageConfig {
    pub project_url: String,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

pub struct SupabaseStorageClient {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl SupabaseStorageClient {
    pub async fn new(config: SupabaseStorageConfig) -> Result<Self> {
        let endpoint = s3_endpoint(&config.endpoint)?;

        // Supabase only serves path-style requests and signs with static project keys.
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint.as_str())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "supabase-storage",
            ))
            .force_path_style(true)
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .operation_timeout(OPERATION_TIMEOUT)
                    .build(),
            )
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        info!(%endpoint, bucket = %config.bucket, "supabase storage: client configured");

        Ok(Self {
            client: Client::from_conf(s3_config),
            public_base_url: public_base_url(&config.project_url, &config.bucket),
            bucket: config.bucket,
        })
    }

    pub fn public_url(&self, object_key: &str) -> String {
        format!("{}/{}", self.public_base_url, object_key.trim_start_matches('/'))
    }
}

/// The S3 gateway lives under `{project}/storage/v1/s3`; only absolute http(s) URLs are usable.
fn s3_endpoint(raw: &str) -> Result<String> {
    let endpoint = raw.trim().trim_end_matches('/').to_string();
    let uri = Uri::from_str(&endpoint)
        .with_context(|| format!("invalid Supabase s3 endpoint: {endpoint}"))?;

    match (uri.scheme_str(), uri.host()) {
        (Some("http" | "https"), Some(_)) => Ok(endpoint),
        _ => anyhow::bail!("Supabase s3 endpoint must be an absolute http(s) URL: {endpoint}"),
    }
}

/// Public objects are served from `{project}/storage/v1/object/public/{bucket}`.
/// https://supabase.com/docs/guides/storage/serving/downloads
fn public_base_url(project_url: &str, bucket: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}",
        project_url.trim_end_matches('/'),
        bucket.trim_matches('/')
    )
}

#[async_trait]
impl EmojiStorageClient for SupabaseStorageClient {
    async fn upload_emoji(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject> {
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .cache_control(EMOJI_CACHE_CONTROL)
            .send()
            .await
            .map_err(|err| map_storage_error(err, "upload emoji", &self.bucket, object_key))?;

        debug!(object_key, size, "supabase storage: emoji uploaded");

        Ok(StoredObject {
            object_key: object_key.to_string(),
            public_url: self.public_url(object_key),
        })
    }

    async fn delete_object(&self, object_key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|err| map_storage_error(err, "delete emoji", &self.bucket, object_key))?;

        debug!(object_key, "supabase storage: emoji deleted");
        Ok(())
    }
}

fn map_storage_error<E>(
    err: SdkError<E>,
    action: &str,
    bucket: &str,
    object_key: &str,
) -> anyhow::Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if let SdkError::ServiceError(service_err) = &err {
        let raw = service_err.raw();
        let status = raw.status().as_u16();
        let code = service_err.err().code().unwrap_or("unknown");
        let message = service_err.err().message().unwrap_or_default();
        let body = raw
            .body()
            .bytes()
            .map(|b| String::from_utf8_lossy(b).trim().to_owned())
            .filter(|b| !b.is_empty())
            .unwrap_or_default();

        let mut detail = format!(
            "failed to {} in Supabase Storage (status {}, code {})",
            action, status, code
        );

        if !message.is_empty() {
            detail.push_str(&format!(": {}", message));
        }

        detail.push_str(&format!(" [bucket={}, key={}]", bucket, object_key));

        if !body.is_empty() {
            let preview = body.chars().take(512).collect::<String>();
            detail.push_str(&format!("; body={}", preview));
        }

        return anyhow::anyhow!(detail);
    }

    anyhow::Error::new(err).context(format!("failed to {} in Supabase Storage", action))
}
