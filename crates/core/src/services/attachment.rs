//! Attachment uploads.
//!
//! Uploading is two-step: the client asks for a presigned `PUT` URL, which
//! records a `pending` attachment, then names the attachment when posting a
//! message. Pending uploads that are never posted expire and are swept.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use huddle_common::{AppError, AppResult, IdGenerator, PresignedUrl, StorageService, generate_storage_key};
use huddle_db::entities::attachment::{self, AttachmentStatus};
use huddle_db::repositories::AttachmentRepository;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::access::AccessService;

/// Largest accepted upload, 1 GiB.
pub const MAX_ATTACHMENT_BYTES: i64 = 1024 * 1024 * 1024;

/// How long a pending upload and its URLs stay valid.
pub const UPLOAD_TTL: Duration = Duration::from_secs(15 * 60);

/// Lifetime of a download URL.
const DOWNLOAD_TTL: Duration = Duration::from_secs(15 * 60);

/// Input for starting an upload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUploadInput {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1, max = 255))]
    pub mime_type: String,
    #[validate(range(min = 1, max = 1_073_741_824))]
    pub size_bytes: i64,
}

/// A pending attachment and where to upload its bytes.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTicket {
    pub attachment: attachment::Model,
    pub upload: PresignedUrl,
}

/// Attachment service.
#[derive(Clone)]
pub struct AttachmentService {
    attachment_repo: AttachmentRepository,
    access: AccessService,
    storage: Arc<dyn StorageService>,
    id_gen: IdGenerator,
}

impl AttachmentService {
    /// Create a new attachment service.
    #[must_use]
    pub fn new(
        attachment_repo: AttachmentRepository,
        access: AccessService,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        Self {
            attachment_repo,
            access,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record a pending upload and presign its `PUT`.
    pub async fn create_upload(
        &self,
        channel_id: &str,
        user_id: &str,
        input: CreateUploadInput,
    ) -> AppResult<UploadTicket> {
        input.validate()?;
        if input.size_bytes > MAX_ATTACHMENT_BYTES {
            return Err(AppError::Validation("Attachment is too large".to_string()));
        }

        self.access.ensure_channel_access(channel_id, user_id).await?;

        let id = self.id_gen.generate();
        let storage_key = generate_storage_key(channel_id, &id, &input.file_name);
        let upload = self
            .storage
            .presign_upload(&storage_key, &input.mime_type, UPLOAD_TTL)
            .await?;

        let now = Utc::now();
        let attachment = self
            .attachment_repo
            .create(attachment::ActiveModel {
                id: Set(id),
                message_id: Set(None),
                uploader_id: Set(user_id.to_string()),
                channel_id: Set(channel_id.to_string()),
                file_name: Set(input.file_name),
                mime_type: Set(input.mime_type),
                size_bytes: Set(input.size_bytes),
                storage_key: Set(storage_key),
                status: Set(AttachmentStatus::Pending),
                uploaded_at: Set(None),
                expires_at: Set(Some(upload.expires_at.into())),
                created_at: Set(now.into()),
            })
            .await?;

        Ok(UploadTicket { attachment, upload })
    }

    /// Presign a download of an attached file.
    pub async fn download_url(&self, attachment_id: &str, user_id: &str) -> AppResult<PresignedUrl> {
        let attachment = self
            .attachment_repo
            .find_by_id(attachment_id)
            .await?
            .filter(|a| a.status == AttachmentStatus::Attached)
            .ok_or_else(|| AppError::NotFound(format!("Attachment not found: {attachment_id}")))?;

        self.access
            .ensure_channel_access(&attachment.channel_id, user_id)
            .await?;

        self.storage
            .presign_download(&attachment.storage_key, DOWNLOAD_TTL)
            .await
    }

    /// Mark pending uploads past their deadline as deleted.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let swept = self.attachment_repo.sweep_expired(now).await?;
        if swept > 0 {
            info!(count = swept, "Swept expired pending attachments");
        }
        Ok(swept)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::fixture::Fixture;
    use crate::services::message::CreateMessageInput;

    fn upload(name: &str, size_bytes: i64) -> CreateUploadInput {
        CreateUploadInput {
            file_name: name.to_string(),
            mime_type: "image/png".to_string(),
            size_bytes,
        }
    }

    #[tokio::test]
    async fn test_create_upload_records_pending() {
        let fx = Fixture::new().await;

        let ticket = fx
            .attachments
            .create_upload("general", "alice", upload("cat.png", 1024))
            .await
            .unwrap();
        assert_eq!(ticket.attachment.status, AttachmentStatus::Pending);
        assert!(ticket.attachment.message_id.is_none());
        assert!(ticket.upload.url.starts_with("https://storage.test/upload/attachments/"));
        assert!(ticket.attachment.storage_key.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_create_upload_validation() {
        let fx = Fixture::new().await;

        let result = fx
            .attachments
            .create_upload("general", "alice", upload("huge.bin", MAX_ATTACHMENT_BYTES + 1))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = fx
            .attachments
            .create_upload("secret", "alice", upload("cat.png", 10))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_download_requires_attached() {
        let fx = Fixture::new().await;
        let ticket = fx
            .attachments
            .create_upload("general", "alice", upload("cat.png", 1024))
            .await
            .unwrap();

        let result = fx.attachments.download_url(&ticket.attachment.id, "alice").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        fx.messages
            .create(
                "general",
                "alice",
                CreateMessageInput {
                    body: "look".to_string(),
                    attachment_ids: vec![ticket.attachment.id.clone()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let url = fx
            .attachments
            .download_url(&ticket.attachment.id, "bob")
            .await
            .unwrap();
        assert!(url.url.starts_with("https://storage.test/download/"));

        let result = fx.attachments.download_url(&ticket.attachment.id, "mallory").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let fx = Fixture::new().await;
        let ticket = fx
            .attachments
            .create_upload("general", "alice", upload("cat.png", 1024))
            .await
            .unwrap();

        assert_eq!(fx.attachments.sweep_expired(Utc::now()).await.unwrap(), 0);

        let later = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(fx.attachments.sweep_expired(later).await.unwrap(), 1);

        let result = fx
            .messages
            .create(
                "general",
                "alice",
                CreateMessageInput {
                    body: "too late".to_string(),
                    attachment_ids: vec![ticket.attachment.id],
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
