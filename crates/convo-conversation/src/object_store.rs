use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use convo_config::S3Settings;
use convo_core::{ConvoError, Result};
use tracing::{debug, info};

use crate::storage::{document_name, StorageBackend};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// The two object operations the backend needs from a remote store.
///
/// `get_bytes` returns [`ConvoError::NotFound`] when the store reports a
/// missing key and [`ConvoError::StorageError`] for any other fault.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

#[async_trait]
impl ObjectClient for aws_sdk_s3::Client {
    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = self
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                    || err.raw_response().map(|r| r.status().as_u16()) == Some(404);
                if missing {
                    ConvoError::NotFound(format!("s3://{}/{}", bucket, key))
                } else {
                    ConvoError::storage("s3", DisplayErrorContext(&err).to_string())
                }
            })?;

        let data = output.body.collect().await.map_err(|e| {
            ConvoError::storage("s3", format!("failed to read s3://{}/{}: {}", bucket, key, e))
        })?;
        Ok(data.into_bytes().to_vec())
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| ConvoError::storage("s3", DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }
}

/// One JSON object per conversation in a bucket.
pub struct ObjectStorageBackend<C = aws_sdk_s3::Client> {
    bucket: String,
    client: C,
}

impl<C: ObjectClient> ObjectStorageBackend<C> {
    pub fn new(bucket: impl Into<String>, client: C) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(ConvoError::ConfigError(
                "S3 bucket name cannot be empty".into(),
            ));
        }
        Ok(Self { bucket, client })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl ObjectStorageBackend {
    /// Build an S3-backed store from the default AWS credential chain.
    pub async fn from_settings(settings: &S3Settings) -> Result<Self> {
        if settings.bucket.trim().is_empty() {
            return Err(ConvoError::ConfigError(
                "S3 bucket name cannot be empty".into(),
            ));
        }

        let mut config_loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &settings.region {
            config_loader = config_loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &settings.profile {
            info!("Using AWS profile: {}", profile);
            config_loader = config_loader.profile_name(profile);
        }

        let aws_config = config_loader.load().await;
        let region = aws_config.region().cloned().ok_or_else(|| {
            ConvoError::ConfigError(
                "No AWS region configured for S3 storage (set storage.s3.region or AWS_REGION)"
                    .into(),
            )
        })?;

        debug!("AWS config loaded for region: {}", region);
        let client = aws_sdk_s3::Client::new(&aws_config);
        info!("Using S3 conversation storage: bucket={}", settings.bucket);
        Self::new(settings.bucket.clone(), client)
    }
}

#[async_trait]
impl<C: ObjectClient> StorageBackend for ObjectStorageBackend<C> {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let object_key = document_name(key);
        let bytes = self.client.get_bytes(&self.bucket, &object_key).await?;
        debug!("Read {} bytes from s3://{}/{}", bytes.len(), self.bucket, object_key);
        Ok(bytes)
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let object_key = document_name(key);
        self.client
            .put_bytes(&self.bucket, &object_key, bytes.to_vec(), JSON_CONTENT_TYPE)
            .await?;
        debug!("Wrote {} bytes to s3://{}/{}", bytes.len(), self.bucket, object_key);
        Ok(())
    }
}
