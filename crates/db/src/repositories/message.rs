//! Message repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, sea_query::Expr,
};

use crate::entities::{Message, message};

/// Cursor bounds for paging through a channel's history.
///
/// Positions are `(created_at, id)` pairs. Without an id a bound covers
/// the whole instant, so every message stamped exactly `since` is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    /// Only messages positioned strictly after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Tie-breaker for `since`: the last message the client has seen.
    pub since_id: Option<String>,
    /// Only messages positioned strictly before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Tie-breaker for `until`: the oldest message the client has seen.
    pub until_id: Option<String>,
}

/// Repository for message operations.
#[derive(Clone)]
pub struct MessageRepository {
    db: Arc<DatabaseConnection>,
}

impl MessageRepository {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find message by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<message::Model>> {
        Self::find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find message by ID on the given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> AppResult<Option<message::Model>> {
        Message::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find message by ID and lock its row until the transaction ends.
    /// `SQLite` has no row locks; its writers are serialized anyway.
    pub async fn find_for_update_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> AppResult<Option<message::Model>> {
        Message::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get message by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<message::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message not found: {id}")))
    }

    /// Find messages by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<message::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Message::find()
            .filter(message::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a message.
    pub async fn insert_in<C: ConnectionTrait>(
        conn: &C,
        model: message::ActiveModel,
    ) -> AppResult<message::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Root messages of a channel, oldest first.
    ///
    /// With `since` the page starts right after the cursor; otherwise the
    /// newest `limit` messages (before `until`, when given) are returned.
    pub async fn list_roots(
        &self,
        channel_id: &str,
        cursor: HistoryCursor,
        limit: u64,
        include_deleted: bool,
    ) -> AppResult<Vec<message::Model>> {
        let mut query = Message::find()
            .filter(message::Column::ChannelId.eq(channel_id))
            .filter(message::Column::ParentId.is_null());
        query = Self::visible(query, include_deleted);

        if let Some(since) = cursor.since {
            let mut after = Condition::any().add(message::Column::CreatedAt.gt(since));
            if let Some(id) = &cursor.since_id {
                after = after.add(
                    Condition::all()
                        .add(message::Column::CreatedAt.eq(since))
                        .add(message::Column::Id.gt(id.as_str())),
                );
            }
            query = query.filter(after);
        }
        if let Some(until) = cursor.until {
            let mut before = Condition::any().add(message::Column::CreatedAt.lt(until));
            if let Some(id) = &cursor.until_id {
                before = before.add(
                    Condition::all()
                        .add(message::Column::CreatedAt.eq(until))
                        .add(message::Column::Id.lt(id.as_str())),
                );
            }
            query = query.filter(before);
        }

        if cursor.since.is_some() {
            return query
                .order_by_asc(message::Column::CreatedAt)
                .order_by_asc(message::Column::Id)
                .limit(limit)
                .all(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()));
        }

        let mut messages = query
            .order_by_desc(message::Column::CreatedAt)
            .order_by_desc(message::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        messages.reverse();
        Ok(messages)
    }

    /// Replies to a thread root, oldest first.
    pub async fn list_replies(
        &self,
        parent_id: &str,
        include_deleted: bool,
    ) -> AppResult<Vec<message::Model>> {
        let query = Message::find().filter(message::Column::ParentId.eq(parent_id));

        Self::visible(query, include_deleted)
            .order_by_asc(message::Column::CreatedAt)
            .order_by_asc(message::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of the live replies to a thread root.
    pub async fn find_reply_ids_in<C: ConnectionTrait>(
        conn: &C,
        parent_id: &str,
    ) -> AppResult<Vec<String>> {
        Message::find()
            .select_only()
            .column(message::Column::Id)
            .filter(message::Column::ParentId.eq(parent_id))
            .filter(message::Column::DeletedAt.is_null())
            .into_tuple::<String>()
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace a live message's body and stamp `edited_at`.
    ///
    /// Returns `None` when the message is missing or already deleted, so a
    /// delete that commits first always wins over the edit.
    pub async fn update_body_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        body: &str,
        edited_at: DateTime<Utc>,
    ) -> AppResult<Option<message::Model>> {
        let result = Message::update_many()
            .col_expr(message::Column::Body, Expr::value(body))
            .col_expr(
                message::Column::EditedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(edited_at)),
            )
            .filter(message::Column::Id.eq(id))
            .filter(message::Column::DeletedAt.is_null())
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        Self::find_by_id_in(conn, id).await
    }

    /// Soft-delete the given messages. Already-deleted rows keep their
    /// original deletion stamp.
    pub async fn soft_delete_in<C: ConnectionTrait>(
        conn: &C,
        ids: &[String],
        deleted_by: &str,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Message::update_many()
            .col_expr(
                message::Column::DeletedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(deleted_at)),
            )
            .col_expr(message::Column::DeletedBy, Expr::value(deleted_by))
            .filter(message::Column::Id.is_in(ids.iter().cloned()))
            .filter(message::Column::DeletedAt.is_null())
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    fn visible(query: Select<Message>, include_deleted: bool) -> Select<Message> {
        if include_deleted {
            query
        } else {
            query.filter(message::Column::DeletedAt.is_null())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};

    async fn seeded() -> TestDatabase {
        let db = TestDatabase::new().await.unwrap();
        db.create_user("u1", "Alice").await.unwrap();
        db.create_workspace("ws1", "u1").await.unwrap();
        db.create_channel("c1", "ws1", "u1", false).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_find_by_id_mock() {
        let model = message::Model {
            id: "m1".to_string(),
            channel_id: "c1".to_string(),
            user_id: "u1".to_string(),
            parent_id: None,
            body: "hello".to_string(),
            created_at: Utc::now().into(),
            edited_at: None,
            deleted_at: None,
            deleted_by: None,
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[model]])
                .into_connection(),
        );

        let repo = MessageRepository::new(db);
        let found = repo.get_by_id("m1").await.unwrap();
        assert_eq!(found.body, "hello");
    }

    #[tokio::test]
    async fn test_list_roots_newest_page_ascending() {
        let db = seeded().await;
        let base = Utc::now() - Duration::minutes(10);
        for i in 0..5 {
            db.create_message_at(
                &format!("m{i}"),
                "c1",
                "u1",
                None,
                "x",
                base + Duration::seconds(i),
            )
            .await
            .unwrap();
        }
        db.create_message_at("r1", "c1", "u1", Some("m0"), "reply", base + Duration::seconds(9))
            .await
            .unwrap();

        let repo = MessageRepository::new(db.conn.clone());
        let page = repo
            .list_roots("c1", HistoryCursor::default(), 3, false)
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);

        let since = repo
            .list_roots(
                "c1",
                HistoryCursor {
                    since: Some(base + Duration::seconds(1)),
                    ..Default::default()
                },
                2,
                false,
            )
            .await
            .unwrap();
        let ids: Vec<_> = since.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);

        let until = repo
            .list_roots(
                "c1",
                HistoryCursor {
                    until: Some(base + Duration::seconds(2)),
                    ..Default::default()
                },
                10,
                false,
            )
            .await
            .unwrap();
        let ids: Vec<_> = until.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m0", "m1"]);
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_first_stamp() {
        let db = seeded().await;
        db.create_message_at("m1", "c1", "u1", None, "x", Utc::now())
            .await
            .unwrap();

        let ids = vec!["m1".to_string()];
        let first = MessageRepository::soft_delete_in(db.connection(), &ids, "u1", Utc::now())
            .await
            .unwrap();
        let second = MessageRepository::soft_delete_in(db.connection(), &ids, "u2", Utc::now())
            .await
            .unwrap();
        assert_eq!((first, second), (1, 0));

        let repo = MessageRepository::new(db.conn.clone());
        let model = repo.get_by_id("m1").await.unwrap();
        assert_eq!(model.deleted_by.as_deref(), Some("u1"));
        assert!(
            repo.list_roots("c1", HistoryCursor::default(), 10, false)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_update_body_skips_deleted_message() {
        let db = seeded().await;
        db.create_message_at("m1", "c1", "u1", None, "before", Utc::now())
            .await
            .unwrap();
        db.create_message_at("m2", "c1", "u1", None, "before", Utc::now())
            .await
            .unwrap();

        let edited = MessageRepository::update_body_in(db.connection(), "m1", "after", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.body, "after");
        assert!(edited.edited_at.is_some());

        MessageRepository::soft_delete_in(db.connection(), &["m2".to_string()], "u1", Utc::now())
            .await
            .unwrap();
        let result = MessageRepository::update_body_in(db.connection(), "m2", "after", Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());

        let repo = MessageRepository::new(db.conn.clone());
        let untouched = repo.get_by_id("m2").await.unwrap();
        assert_eq!(untouched.body, "before");
        assert!(untouched.edited_at.is_none());
    }

    #[tokio::test]
    async fn test_cursor_breaks_timestamp_ties_by_id() {
        let db = seeded().await;
        let at = Utc::now() - Duration::minutes(5);
        for id in ["a", "b", "c"] {
            db.create_message_at(id, "c1", "u1", None, "x", at).await.unwrap();
        }
        let repo = MessageRepository::new(db.conn.clone());

        let after_a = repo
            .list_roots(
                "c1",
                HistoryCursor {
                    since: Some(at),
                    since_id: Some("a".to_string()),
                    ..Default::default()
                },
                10,
                false,
            )
            .await
            .unwrap();
        let ids: Vec<_> = after_a.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let whole_instant = repo
            .list_roots(
                "c1",
                HistoryCursor {
                    since: Some(at),
                    ..Default::default()
                },
                10,
                false,
            )
            .await
            .unwrap();
        assert!(whole_instant.is_empty());

        let before_c = repo
            .list_roots(
                "c1",
                HistoryCursor {
                    until: Some(at),
                    until_id: Some("c".to_string()),
                    ..Default::default()
                },
                10,
                false,
            )
            .await
            .unwrap();
        let ids: Vec<_> = before_c.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
