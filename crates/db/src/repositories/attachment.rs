//! Attachment repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, prelude::DateTimeWithTimeZone, sea_query::Expr,
};

use crate::entities::attachment::AttachmentStatus;
use crate::entities::{Attachment, attachment};

/// Repository for attachment operations.
#[derive(Clone)]
pub struct AttachmentRepository {
    db: Arc<DatabaseConnection>,
}

impl AttachmentRepository {
    /// Create a new attachment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Store a new attachment row.
    pub async fn create(&self, model: attachment::ActiveModel) -> AppResult<attachment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find attachment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<attachment::Model>> {
        Attachment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find attachments by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<attachment::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Attachment::find()
            .filter(attachment::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Attachments bound to the given messages.
    pub async fn find_by_message_ids(
        &self,
        message_ids: &[String],
    ) -> AppResult<Vec<attachment::Model>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        Attachment::find()
            .filter(attachment::Column::MessageId.is_in(message_ids.iter().cloned()))
            .filter(attachment::Column::Status.eq(AttachmentStatus::Attached))
            .order_by_asc(attachment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Bind pending uploads to a message.
    ///
    /// Only rows that are still pending, unexpired, uploaded by `uploader_id`
    /// into `channel_id` transition. Returns the number of rows bound; the
    /// caller compares it against `ids.len()` to detect a lost race.
    pub async fn bind_to_message_in<C: ConnectionTrait>(
        conn: &C,
        ids: &[String],
        message_id: &str,
        uploader_id: &str,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now: DateTimeWithTimeZone = now.into();
        let result = Attachment::update_many()
            .col_expr(
                attachment::Column::Status,
                Expr::value(AttachmentStatus::Attached),
            )
            .col_expr(attachment::Column::MessageId, Expr::value(message_id))
            .col_expr(
                attachment::Column::ExpiresAt,
                Expr::value(Option::<DateTimeWithTimeZone>::None),
            )
            .col_expr(attachment::Column::UploadedAt, Expr::value(now))
            .filter(attachment::Column::Id.is_in(ids.iter().cloned()))
            .filter(attachment::Column::UploaderId.eq(uploader_id))
            .filter(attachment::Column::ChannelId.eq(channel_id))
            .filter(attachment::Column::Status.eq(AttachmentStatus::Pending))
            .filter(attachment::Column::ExpiresAt.gt(now))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Mark pending uploads whose deadline passed as deleted.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let now: DateTimeWithTimeZone = now.into();
        let result = Attachment::update_many()
            .col_expr(
                attachment::Column::Status,
                Expr::value(AttachmentStatus::Deleted),
            )
            .filter(attachment::Column::Status.eq(AttachmentStatus::Pending))
            .filter(attachment::Column::ExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;
    use chrono::Duration;
    use sea_orm::Set;

    fn pending(id: &str, uploader: &str, expires_at: DateTime<Utc>) -> attachment::ActiveModel {
        attachment::ActiveModel {
            id: Set(id.to_string()),
            message_id: Set(None),
            uploader_id: Set(uploader.to_string()),
            channel_id: Set("c1".to_string()),
            file_name: Set("a.png".to_string()),
            mime_type: Set("image/png".to_string()),
            size_bytes: Set(10),
            storage_key: Set(format!("attachments/{id}.png")),
            status: Set(AttachmentStatus::Pending),
            uploaded_at: Set(None),
            expires_at: Set(Some(expires_at.into())),
            created_at: Set(Utc::now().into()),
        }
    }

    async fn seeded() -> TestDatabase {
        let db = TestDatabase::new().await.unwrap();
        db.create_user("u1", "Alice").await.unwrap();
        db.create_user("u2", "Bob").await.unwrap();
        db.create_workspace("ws1", "u1").await.unwrap();
        db.create_channel("c1", "ws1", "u1", false).await.unwrap();
        db.create_message_at("m1", "c1", "u1", None, "", Utc::now())
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_bind_only_matching_pending() {
        let db = seeded().await;
        let repo = AttachmentRepository::new(db.conn.clone());
        let future = Utc::now() + Duration::minutes(15);
        repo.create(pending("a1", "u1", future)).await.unwrap();
        repo.create(pending("a2", "u2", future)).await.unwrap();
        repo.create(pending("a3", "u1", Utc::now() - Duration::minutes(1)))
            .await
            .unwrap();

        let ids = vec!["a1".to_string(), "a2".to_string(), "a3".to_string()];
        let bound = AttachmentRepository::bind_to_message_in(
            db.connection(),
            &ids,
            "m1",
            "u1",
            "c1",
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(bound, 1);

        let a1 = repo.find_by_id("a1").await.unwrap().unwrap();
        assert_eq!(a1.status, AttachmentStatus::Attached);
        assert_eq!(a1.message_id.as_deref(), Some("m1"));
        assert!(a1.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let db = seeded().await;
        let repo = AttachmentRepository::new(db.conn.clone());
        repo.create(pending("old", "u1", Utc::now() - Duration::minutes(1)))
            .await
            .unwrap();
        repo.create(pending("new", "u1", Utc::now() + Duration::minutes(10)))
            .await
            .unwrap();

        assert_eq!(repo.sweep_expired(Utc::now()).await.unwrap(), 1);
        let old = repo.find_by_id("old").await.unwrap().unwrap();
        assert_eq!(old.status, AttachmentStatus::Deleted);
        let new = repo.find_by_id("new").await.unwrap().unwrap();
        assert_eq!(new.status, AttachmentStatus::Pending);
    }
}
