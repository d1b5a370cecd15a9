//! Channel authorization.

use huddle_common::{AppError, AppResult};
use huddle_db::entities::{channel, channel_member::ChannelRole, message, workspace_member};
use huddle_db::repositories::{ChannelRepository, MessageRepository, WorkspaceRepository};

/// Resolves whether a user may see a channel.
///
/// Membership-gated channels (private, DM, group DM) require a channel
/// member row; everything else requires workspace membership.
#[derive(Clone)]
pub struct AccessService {
    channel_repo: ChannelRepository,
    workspace_repo: WorkspaceRepository,
    message_repo: MessageRepository,
}

impl AccessService {
    /// Create a new access service.
    #[must_use]
    pub const fn new(
        channel_repo: ChannelRepository,
        workspace_repo: WorkspaceRepository,
        message_repo: MessageRepository,
    ) -> Self {
        Self {
            channel_repo,
            workspace_repo,
            message_repo,
        }
    }

    /// Load the channel if `user_id` may access it.
    pub async fn ensure_channel_access(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> AppResult<channel::Model> {
        let channel = self
            .channel_repo
            .find_by_id(channel_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Channel not found: {channel_id}")))?;

        let allowed = if channel.requires_membership() {
            self.channel_repo
                .find_member(channel_id, user_id)
                .await?
                .is_some()
        } else {
            self.workspace_repo
                .is_member(&channel.workspace_id, user_id)
                .await?
        };

        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this channel".to_string(),
            ));
        }

        Ok(channel)
    }

    /// Load a message together with its channel if `user_id` may access it.
    pub async fn ensure_message_access(
        &self,
        message_id: &str,
        user_id: &str,
    ) -> AppResult<(message::Model, channel::Model)> {
        let message = self.message_repo.get_by_id(message_id).await?;
        let channel = self
            .ensure_channel_access(&message.channel_id, user_id)
            .await?;
        Ok((message, channel))
    }

    /// Load the caller's workspace membership.
    pub async fn ensure_workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> AppResult<workspace_member::Model> {
        self.workspace_repo
            .find_member(workspace_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::Forbidden("You are not a member of this workspace".to_string())
            })
    }

    /// Whether `user_id` administers the channel, either as a channel admin
    /// or as a workspace owner/admin.
    pub async fn is_channel_admin(
        &self,
        channel: &channel::Model,
        user_id: &str,
    ) -> AppResult<bool> {
        if let Some(member) = self.channel_repo.find_member(&channel.id, user_id).await?
            && member.role == ChannelRole::Admin
        {
            return Ok(true);
        }

        Ok(self
            .workspace_repo
            .find_member(&channel.workspace_id, user_id)
            .await?
            .is_some_and(|m| m.role.is_admin()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use huddle_db::entities::{channel::ChannelType, workspace_member::WorkspaceRole};
    use huddle_db::test_utils::TestDatabase;

    async fn service(db: &TestDatabase) -> AccessService {
        AccessService::new(
            ChannelRepository::new(db.conn.clone()),
            WorkspaceRepository::new(db.conn.clone()),
            MessageRepository::new(db.conn.clone()),
        )
    }

    async fn seeded() -> TestDatabase {
        let db = TestDatabase::new().await.unwrap();
        db.create_user("owner", "Owner").await.unwrap();
        db.create_user("member", "Member").await.unwrap();
        db.create_user("outsider", "Outsider").await.unwrap();
        db.create_workspace("ws1", "owner").await.unwrap();
        db.add_workspace_member("ws1", "member", WorkspaceRole::Member)
            .await
            .unwrap();
        db.create_channel("public", "ws1", "owner", false)
            .await
            .unwrap();
        db.create_channel("private", "ws1", "owner", true)
            .await
            .unwrap();
        db.add_channel_member("private", "owner", ChannelRole::Admin)
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_public_channel_requires_workspace_membership() {
        let db = seeded().await;
        let access = service(&db).await;

        let channel = access.ensure_channel_access("public", "member").await.unwrap();
        assert_eq!(channel.id, "public");

        let result = access.ensure_channel_access("public", "outsider").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_private_channel_requires_channel_membership() {
        let db = seeded().await;
        let access = service(&db).await;

        assert!(access.ensure_channel_access("private", "owner").await.is_ok());
        let result = access.ensure_channel_access("private", "member").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_dm_requires_channel_membership() {
        let db = seeded().await;
        db.create_channel_of_type("dm", "ws1", "owner", false, ChannelType::Dm)
            .await
            .unwrap();
        db.add_channel_member("dm", "owner", ChannelRole::Member)
            .await
            .unwrap();
        let access = service(&db).await;

        assert!(access.ensure_channel_access("dm", "owner").await.is_ok());
        let result = access.ensure_channel_access("dm", "member").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_missing_channel_not_found() {
        let db = seeded().await;
        let access = service(&db).await;

        let result = access.ensure_channel_access("nope", "owner").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_channel_admin() {
        let db = seeded().await;
        let access = service(&db).await;
        let public = access.ensure_channel_access("public", "owner").await.unwrap();

        assert!(access.is_channel_admin(&public, "owner").await.unwrap());
        assert!(!access.is_channel_admin(&public, "member").await.unwrap());
    }
}
