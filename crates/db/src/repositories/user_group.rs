//! User group repository.

use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::{UserGroup, user_group};

/// Repository for user groups.
#[derive(Clone)]
pub struct UserGroupRepository {
    db: Arc<DatabaseConnection>,
}

impl UserGroupRepository {
    /// Create a new user group repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find groups by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user_group::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        UserGroup::find()
            .filter(user_group::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the groups of a workspace whose names are in `names`, in one query.
    pub async fn find_by_names_in<C: ConnectionTrait>(
        conn: &C,
        workspace_id: &str,
        names: &[String],
    ) -> AppResult<Vec<user_group::Model>> {
        if names.is_empty() {
            return Ok(vec![]);
        }

        UserGroup::find()
            .filter(user_group::Column::WorkspaceId.eq(workspace_id))
            .filter(user_group::Column::Name.is_in(names.iter().cloned()))
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
