//! Message pin repository.

use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, sea_query::OnConflict,
};

use crate::entities::{MessagePin, message_pin};

/// Repository for pinned messages.
#[derive(Clone)]
pub struct PinRepository {
    db: Arc<DatabaseConnection>,
}

impl PinRepository {
    /// Create a new pin repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Pin a message. Fails with `Conflict` when it is already pinned.
    pub async fn create(&self, model: message_pin::ActiveModel) -> AppResult<()> {
        let inserted = MessagePin::insert(model)
            .on_conflict(
                OnConflict::columns([
                    message_pin::Column::ChannelId,
                    message_pin::Column::MessageId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if inserted == 0 {
            return Err(AppError::Conflict("Message is already pinned".to_string()));
        }
        Ok(())
    }

    /// Find a pin.
    pub async fn find(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> AppResult<Option<message_pin::Model>> {
        MessagePin::find_by_id((channel_id.to_string(), message_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Unpin a message. Returns `false` when it was not pinned.
    pub async fn delete(&self, channel_id: &str, message_id: &str) -> AppResult<bool> {
        let result = MessagePin::delete_by_id((channel_id.to_string(), message_id.to_string()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Pins of a channel, most recent first.
    pub async fn find_by_channel(&self, channel_id: &str) -> AppResult<Vec<message_pin::Model>> {
        MessagePin::find()
            .filter(message_pin::Column::ChannelId.eq(channel_id))
            .order_by_desc(message_pin::Column::PinnedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn pin() -> message_pin::ActiveModel {
        message_pin::ActiveModel {
            channel_id: Set("c1".to_string()),
            message_id: Set("m1".to_string()),
            pinned_by: Set("u1".to_string()),
            pinned_at: Set(Utc::now().into()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_pin_conflicts() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );

        let repo = PinRepository::new(db);
        repo.create(pin()).await.unwrap();
        let result = repo.create(pin()).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
