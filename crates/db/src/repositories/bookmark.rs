//! Message bookmark repository.

use std::sync::Arc;

use chrono::Utc;
use huddle_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::OnConflict,
};

use crate::entities::{MessageBookmark, message_bookmark};

/// Repository for per-user bookmarks.
#[derive(Clone)]
pub struct BookmarkRepository {
    db: Arc<DatabaseConnection>,
}

impl BookmarkRepository {
    /// Create a new bookmark repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Bookmark a message. Bookmarking twice is a no-op.
    pub async fn add(&self, user_id: &str, message_id: &str) -> AppResult<bool> {
        let inserted = MessageBookmark::insert(message_bookmark::ActiveModel {
            user_id: Set(user_id.to_string()),
            message_id: Set(message_id.to_string()),
            created_at: Set(Utc::now().into()),
        })
        .on_conflict(
            OnConflict::columns([
                message_bookmark::Column::UserId,
                message_bookmark::Column::MessageId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(inserted > 0)
    }

    /// Remove a bookmark.
    pub async fn remove(&self, user_id: &str, message_id: &str) -> AppResult<bool> {
        let result =
            MessageBookmark::delete_by_id((user_id.to_string(), message_id.to_string()))
                .exec(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// A user's bookmarks, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<message_bookmark::Model>> {
        MessageBookmark::find()
            .filter(message_bookmark::Column::UserId.eq(user_id))
            .order_by_desc(message_bookmark::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;

    #[tokio::test]
    async fn test_add_remove() {
        let db = TestDatabase::new().await.unwrap();
        db.create_user("u1", "Alice").await.unwrap();
        db.create_workspace("ws1", "u1").await.unwrap();
        db.create_channel("c1", "ws1", "u1", false).await.unwrap();
        db.create_message_at("m1", "c1", "u1", None, "hi", Utc::now())
            .await
            .unwrap();

        let repo = BookmarkRepository::new(db.conn.clone());
        assert!(repo.add("u1", "m1").await.unwrap());
        assert!(!repo.add("u1", "m1").await.unwrap());
        assert_eq!(repo.find_by_user("u1", 10).await.unwrap().len(), 1);
        assert!(repo.remove("u1", "m1").await.unwrap());
        assert!(repo.find_by_user("u1", 10).await.unwrap().is_empty());
    }
}
