//! Test utilities for database operations.
//!
//! Provides a migrated in-memory `SQLite` database and seed helpers for
//! service and API tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::entities::channel::ChannelType;
use crate::entities::channel_member::ChannelRole;
use crate::entities::workspace_member::WorkspaceRole;
use crate::entities::{
    channel, channel_member, message, user, user_group, user_group_member, workspace,
    workspace_member,
};
use crate::migrations::Migrator;

/// A migrated, throwaway database.
pub struct TestDatabase {
    /// Database connection.
    pub conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Create a fresh in-memory database with all migrations applied.
    ///
    /// The pool is pinned to a single connection: every connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    pub async fn new() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        debug!("Created in-memory test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Insert a user whose display name is `display_name`.
    pub async fn create_user(&self, id: &str, display_name: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(id.to_string()),
            email: Set(format!("{id}@example.com")),
            display_name: Set(display_name.to_string()),
            password_hash: Set("$argon2id$test".to_string()),
            avatar_url: Set(None),
            bio: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        }
        .insert(self.connection())
        .await
    }

    /// Insert a workspace owned by `owner_id`, who becomes its first member.
    pub async fn create_workspace(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<workspace::Model, DbErr> {
        let model = workspace::ActiveModel {
            id: Set(id.to_string()),
            name: Set(format!("Workspace {id}")),
            slug: Set(id.chars().take(12).collect::<String>().to_lowercase()),
            is_public: Set(false),
            created_by: Set(owner_id.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.connection())
        .await?;

        self.add_workspace_member(id, owner_id, WorkspaceRole::Owner)
            .await?;
        Ok(model)
    }

    /// Add a user to a workspace.
    pub async fn add_workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<workspace_member::Model, DbErr> {
        workspace_member::ActiveModel {
            workspace_id: Set(workspace_id.to_string()),
            user_id: Set(user_id.to_string()),
            role: Set(role),
            joined_at: Set(Utc::now().into()),
        }
        .insert(self.connection())
        .await
    }

    /// Insert a standard channel.
    pub async fn create_channel(
        &self,
        id: &str,
        workspace_id: &str,
        created_by: &str,
        is_private: bool,
    ) -> Result<channel::Model, DbErr> {
        self.create_channel_of_type(id, workspace_id, created_by, is_private, ChannelType::Standard)
            .await
    }

    /// Insert a channel of the given type.
    pub async fn create_channel_of_type(
        &self,
        id: &str,
        workspace_id: &str,
        created_by: &str,
        is_private: bool,
        channel_type: ChannelType,
    ) -> Result<channel::Model, DbErr> {
        channel::ActiveModel {
            id: Set(id.to_string()),
            workspace_id: Set(workspace_id.to_string()),
            name: Set(format!("channel-{id}")),
            description: Set(None),
            is_private: Set(is_private),
            channel_type: Set(channel_type),
            created_by: Set(created_by.to_string()),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        }
        .insert(self.connection())
        .await
    }

    /// Add an explicit channel member.
    pub async fn add_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
        role: ChannelRole,
    ) -> Result<channel_member::Model, DbErr> {
        channel_member::ActiveModel {
            channel_id: Set(channel_id.to_string()),
            user_id: Set(user_id.to_string()),
            role: Set(role),
            joined_at: Set(Utc::now().into()),
        }
        .insert(self.connection())
        .await
    }

    /// Insert a user group with the given members.
    pub async fn create_group(
        &self,
        id: &str,
        workspace_id: &str,
        name: &str,
        members: &[&str],
    ) -> Result<user_group::Model, DbErr> {
        let group = user_group::ActiveModel {
            id: Set(id.to_string()),
            workspace_id: Set(workspace_id.to_string()),
            name: Set(name.to_string()),
            created_by: Set(members.first().copied().unwrap_or_default().to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.connection())
        .await?;

        for user_id in members {
            user_group_member::ActiveModel {
                group_id: Set(id.to_string()),
                user_id: Set((*user_id).to_string()),
                added_at: Set(Utc::now().into()),
            }
            .insert(self.connection())
            .await?;
        }

        Ok(group)
    }

    /// Insert a message directly with a fixed timestamp.
    pub async fn create_message_at(
        &self,
        id: &str,
        channel_id: &str,
        user_id: &str,
        parent_id: Option<&str>,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<message::Model, DbErr> {
        message::ActiveModel {
            id: Set(id.to_string()),
            channel_id: Set(channel_id.to_string()),
            user_id: Set(user_id.to_string()),
            parent_id: Set(parent_id.map(ToString::to_string)),
            body: Set(body.to_string()),
            created_at: Set(created_at.into()),
            edited_at: Set(None),
            deleted_at: Set(None),
            deleted_by: Set(None),
        }
        .insert(self.connection())
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::{Channel, WorkspaceMember};
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[tokio::test]
    async fn test_seed_helpers() {
        let db = TestDatabase::new().await.unwrap();
        db.create_user("u1", "Alice").await.unwrap();
        db.create_workspace("ws1", "u1").await.unwrap();
        db.create_channel("c1", "ws1", "u1", false).await.unwrap();

        assert_eq!(WorkspaceMember::find().count(db.connection()).await.unwrap(), 1);
        assert_eq!(Channel::find().count(db.connection()).await.unwrap(), 1);
    }
}
