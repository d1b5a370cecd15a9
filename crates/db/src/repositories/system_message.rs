//! System message repository.

use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entities::{SystemMessage, system_message};

/// Repository for system messages.
#[derive(Clone)]
pub struct SystemMessageRepository {
    db: Arc<DatabaseConnection>,
}

impl SystemMessageRepository {
    /// Create a new system message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append a system message.
    pub async fn create(
        &self,
        model: system_message::ActiveModel,
    ) -> AppResult<system_message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Latest system messages of a channel, oldest first.
    pub async fn find_by_channel(
        &self,
        channel_id: &str,
        limit: u64,
    ) -> AppResult<Vec<system_message::Model>> {
        let mut rows = SystemMessage::find()
            .filter(system_message::Column::ChannelId.eq(channel_id))
            .order_by_desc(system_message::Column::CreatedAt)
            .order_by_desc(system_message::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.reverse();
        Ok(rows)
    }
}
