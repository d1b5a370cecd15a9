//! Message link repository.

use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};

use crate::entities::{MessageLink, message_link};

/// Repository for link previews of messages.
#[derive(Clone)]
pub struct LinkRepository {
    db: Arc<DatabaseConnection>,
}

impl LinkRepository {
    /// Create a new link repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Store a link row on the given connection.
    pub async fn insert_in<C: ConnectionTrait>(
        conn: &C,
        model: message_link::ActiveModel,
    ) -> AppResult<message_link::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove every link of a message on the given connection.
    pub async fn delete_by_message_in<C: ConnectionTrait>(
        conn: &C,
        message_id: &str,
    ) -> AppResult<u64> {
        let result = MessageLink::delete_many()
            .filter(message_link::Column::MessageId.eq(message_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Links of the given messages.
    pub async fn find_by_message_ids(
        &self,
        message_ids: &[String],
    ) -> AppResult<Vec<message_link::Model>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        MessageLink::find()
            .filter(message_link::Column::MessageId.is_in(message_ids.iter().cloned()))
            .order_by_asc(message_link::Column::CreatedAt)
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
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_find_by_message_ids() {
        let link = message_link::Model {
            id: "l1".to_string(),
            message_id: "m1".to_string(),
            url: "https://example.com".to_string(),
            title: Some("Example".to_string()),
            description: None,
            image_url: None,
            site_name: None,
            card_type: None,
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[link]])
                .into_connection(),
        );

        let repo = LinkRepository::new(db);
        let links = repo.find_by_message_ids(&["m1".to_string()]).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title.as_deref(), Some("Example"));
    }

    #[tokio::test]
    async fn test_delete_by_message() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );

        let removed = LinkRepository::delete_by_message_in(db.as_ref(), "m1")
            .await
            .unwrap();
        assert_eq!(removed, 2);
    }
}
