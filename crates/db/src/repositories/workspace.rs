//! Workspace repository.

use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

use crate::entities::{User, Workspace, WorkspaceMember, user, workspace, workspace_member};

/// Repository for workspaces and their membership.
#[derive(Clone)]
pub struct WorkspaceRepository {
    db: Arc<DatabaseConnection>,
}

impl WorkspaceRepository {
    /// Create a new workspace repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find workspace by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<workspace::Model>> {
        Workspace::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user's membership in a workspace.
    pub async fn find_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> AppResult<Option<workspace_member::Model>> {
        WorkspaceMember::find_by_id((workspace_id.to_string(), user_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user belongs to a workspace.
    pub async fn is_member(&self, workspace_id: &str, user_id: &str) -> AppResult<bool> {
        Ok(self.find_member(workspace_id, user_id).await?.is_some())
    }

    /// All members of a workspace together with their user rows, in one query.
    pub async fn find_members_with_users_in<C: ConnectionTrait>(
        conn: &C,
        workspace_id: &str,
    ) -> AppResult<Vec<(workspace_member::Model, user::Model)>> {
        let rows = WorkspaceMember::find()
            .filter(workspace_member::Column::WorkspaceId.eq(workspace_id))
            .find_also_related(User)
            .order_by_asc(workspace_member::Column::JoinedAt)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, user)| user.map(|u| (member, u)))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::workspace_member::WorkspaceRole;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_is_member() {
        let member = workspace_member::Model {
            workspace_id: "ws1".to_string(),
            user_id: "u1".to_string(),
            role: WorkspaceRole::Member,
            joined_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![member]])
                .append_query_results([Vec::<workspace_member::Model>::new()])
                .into_connection(),
        );

        let repo = WorkspaceRepository::new(db);
        assert!(repo.is_member("ws1", "u1").await.unwrap());
        assert!(!repo.is_member("ws1", "u2").await.unwrap());
    }
}
