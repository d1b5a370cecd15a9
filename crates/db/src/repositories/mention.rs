//! Message mention repository.

use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::OnConflict,
};

use crate::entities::{
    MessageGroupMention, MessageUserMention, message_group_mention, message_user_mention,
};

/// Repository for user and group mentions of messages.
#[derive(Clone)]
pub struct MentionRepository {
    db: Arc<DatabaseConnection>,
}

impl MentionRepository {
    /// Create a new mention repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert user mentions, ignoring ones that already exist.
    pub async fn insert_user_mentions_in<C: ConnectionTrait>(
        conn: &C,
        message_id: &str,
        user_ids: &[String],
    ) -> AppResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let rows = user_ids.iter().map(|user_id| message_user_mention::ActiveModel {
            message_id: Set(message_id.to_string()),
            user_id: Set(user_id.clone()),
        });

        MessageUserMention::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    message_user_mention::Column::MessageId,
                    message_user_mention::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Insert group mentions, ignoring ones that already exist.
    pub async fn insert_group_mentions_in<C: ConnectionTrait>(
        conn: &C,
        message_id: &str,
        group_ids: &[String],
    ) -> AppResult<()> {
        if group_ids.is_empty() {
            return Ok(());
        }

        let rows = group_ids.iter().map(|group_id| message_group_mention::ActiveModel {
            message_id: Set(message_id.to_string()),
            group_id: Set(group_id.clone()),
        });

        MessageGroupMention::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    message_group_mention::Column::MessageId,
                    message_group_mention::Column::GroupId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Remove every mention of a message.
    pub async fn delete_by_message_in<C: ConnectionTrait>(
        conn: &C,
        message_id: &str,
    ) -> AppResult<()> {
        MessageUserMention::delete_many()
            .filter(message_user_mention::Column::MessageId.eq(message_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        MessageGroupMention::delete_many()
            .filter(message_group_mention::Column::MessageId.eq(message_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// User mentions of the given messages.
    pub async fn find_user_mentions(
        &self,
        message_ids: &[String],
    ) -> AppResult<Vec<message_user_mention::Model>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        MessageUserMention::find()
            .filter(message_user_mention::Column::MessageId.is_in(message_ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Group mentions of the given messages.
    pub async fn find_group_mentions(
        &self,
        message_ids: &[String],
    ) -> AppResult<Vec<message_group_mention::Model>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        MessageGroupMention::find()
            .filter(message_group_mention::Column::MessageId.is_in(message_ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
