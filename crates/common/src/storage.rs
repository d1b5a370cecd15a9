//! Object storage presigning for attachments.
//!
//! Clients upload and download attachment bytes directly against
//! S3-compatible storage (Wasabi) using short-lived presigned URLs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AppError, AppResult};

/// A presigned URL and the moment it stops working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues presigned URLs for object storage.
#[async_trait::async_trait]
pub trait StorageService: Send + Sync {
    /// Presign a `PUT` of `key` with the given content type.
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> AppResult<PresignedUrl>;

    /// Presign a `GET` of `key`.
    async fn presign_download(&self, key: &str, expires_in: Duration) -> AppResult<PresignedUrl>;
}

/// Storage used when no bucket is configured. Every request fails.
#[derive(Debug, Clone, Default)]
pub struct DisabledStorage;

#[async_trait::async_trait]
impl StorageService for DisabledStorage {
    async fn presign_upload(
        &self,
        _key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> AppResult<PresignedUrl> {
        Err(AppError::ExternalService(
            "Object storage is not configured".to_string(),
        ))
    }

    async fn presign_download(&self, _key: &str, _expires_in: Duration) -> AppResult<PresignedUrl> {
        Err(AppError::ExternalService(
            "Object storage is not configured".to_string(),
        ))
    }
}

fn expiry(expires_in: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero())
}

/// S3-compatible object storage backend.
#[cfg(feature = "s3")]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

#[cfg(feature = "s3")]
impl S3Storage {
    /// Create a new S3 storage backend.
    #[must_use]
    pub fn new(config: &crate::config::ObjectStorageConfig) -> Self {
        use aws_config::Region;
        use aws_sdk_s3::config::Credentials;

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "huddle",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[cfg(feature = "s3")]
#[async_trait::async_trait]
impl StorageService for S3Storage {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> AppResult<PresignedUrl> {
        use aws_sdk_s3::presigning::PresigningConfig;

        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::Internal(format!("Invalid presign expiry: {e}")))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::ExternalService(format!("S3 presign failed: {e}")))?;

        Ok(PresignedUrl {
            url: request.uri().to_string(),
            expires_at: expiry(expires_in),
        })
    }

    async fn presign_download(&self, key: &str, expires_in: Duration) -> AppResult<PresignedUrl> {
        use aws_sdk_s3::presigning::PresigningConfig;

        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::Internal(format!("Invalid presign expiry: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::ExternalService(format!("S3 presign failed: {e}")))?;

        Ok(PresignedUrl {
            url: request.uri().to_string(),
            expires_at: expiry(expires_in),
        })
    }
}

/// Generate the storage key for an attachment.
#[must_use]
pub fn generate_storage_key(channel_id: &str, attachment_id: &str, original_name: &str) -> String {
    let date_path = Utc::now().format("%Y/%m/%d").to_string();

    // Extract extension from original name
    let extension = original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");

    format!(
        "attachments/{date_path}/{channel_id}/{attachment_id}.{}",
        extension.to_ascii_lowercase()
    )
}
