//! Message reaction repository.

use std::sync::Arc;

use chrono::Utc;
use huddle_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

use crate::entities::{MessageReaction, message_reaction};

/// Repository for reactions on messages.
#[derive(Clone)]
pub struct ReactionRepository {
    db: Arc<DatabaseConnection>,
}

impl ReactionRepository {
    /// Create a new reaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Add a reaction. Returns `false` when the user already reacted with
    /// this emoji.
    pub async fn add(&self, message_id: &str, user_id: &str, emoji: &str) -> AppResult<bool> {
        let model = message_reaction::ActiveModel {
            message_id: Set(message_id.to_string()),
            user_id: Set(user_id.to_string()),
            emoji: Set(emoji.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let inserted = MessageReaction::insert(model)
            .on_conflict(
                OnConflict::columns([
                    message_reaction::Column::MessageId,
                    message_reaction::Column::UserId,
                    message_reaction::Column::Emoji,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(inserted > 0)
    }

    /// Remove a reaction. Returns `false` when there was none.
    pub async fn remove(&self, message_id: &str, user_id: &str, emoji: &str) -> AppResult<bool> {
        let result = MessageReaction::delete_by_id((
            message_id.to_string(),
            user_id.to_string(),
            emoji.to_string(),
        ))
        .exec(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Reactions on the given messages, oldest first.
    pub async fn find_by_message_ids(
        &self,
        message_ids: &[String],
    ) -> AppResult<Vec<message_reaction::Model>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        MessageReaction::find()
            .filter(message_reaction::Column::MessageId.is_in(message_ids.iter().cloned()))
            .order_by_asc(message_reaction::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
