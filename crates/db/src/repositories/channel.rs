//! Channel repository.

use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect,
    sea_query::Query,
};

use crate::entities::channel::ChannelType;
use crate::entities::{
    Channel, ChannelMember, WorkspaceMember, channel, channel_member, workspace_member,
};

/// Repository for channels and explicit channel membership.
#[derive(Clone)]
pub struct ChannelRepository {
    db: Arc<DatabaseConnection>,
}

impl ChannelRepository {
    /// Create a new channel repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find channel by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<channel::Model>> {
        Channel::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user's explicit membership in a channel.
    pub async fn find_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> AppResult<Option<channel_member::Model>> {
        ChannelMember::find_by_id((channel_id.to_string(), user_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of the channels the user can read: public standard channels of
    /// every workspace they belong to, plus every channel they are a
    /// member of.
    pub async fn find_accessible_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        Channel::find()
            .select_only()
            .column(channel::Column::Id)
            .filter(accessible_condition(user_id))
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Visibility filter over `channel` for one user.
pub(crate) fn accessible_condition(user_id: &str) -> Condition {
    let workspaces = Query::select()
        .column(workspace_member::Column::WorkspaceId)
        .from(WorkspaceMember)
        .and_where(workspace_member::Column::UserId.eq(user_id))
        .to_owned();

    let memberships = Query::select()
        .column(channel_member::Column::ChannelId)
        .from(ChannelMember)
        .and_where(channel_member::Column::UserId.eq(user_id))
        .to_owned();

    Condition::any()
        .add(
            Condition::all()
                .add(channel::Column::WorkspaceId.in_subquery(workspaces))
                .add(channel::Column::IsPrivate.eq(false))
                .add(channel::Column::ChannelType.eq(ChannelType::Standard)),
        )
        .add(channel::Column::Id.in_subquery(memberships))
}
