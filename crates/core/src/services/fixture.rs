//! Service wiring over an in-memory database for tests.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use huddle_common::{AppError, AppResult, OgpFetcher, PresignedUrl, StorageService, UrlPreview};
use huddle_db::TransactionManager;
use huddle_db::entities::workspace_member::WorkspaceRole;
use huddle_db::repositories::{
    AttachmentRepository, BookmarkRepository, ChannelRepository, MessageRepository,
    PinRepository, ReactionRepository, ReadStateRepository, SystemMessageRepository,
    WorkspaceRepository,
};
use huddle_db::test_utils::TestDatabase;

use super::dispatcher::testing::{RecordingFanout, recording_dispatcher};
use super::*;

/// Fetcher that never reaches the network.
pub(crate) struct OfflineFetcher;

#[async_trait]
impl OgpFetcher for OfflineFetcher {
    async fn fetch(&self, url: &str) -> AppResult<UrlPreview> {
        Err(AppError::ExternalService(format!("offline: {url}")))
    }
}

/// Storage that presigns fake URLs.
pub(crate) struct FakeStorage;

#[async_trait]
impl StorageService for FakeStorage {
    async fn presign_upload(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> AppResult<PresignedUrl> {
        Ok(PresignedUrl {
            url: format!("https://storage.test/upload/{key}"),
            expires_at: Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero()),
        })
    }

    async fn presign_download(&self, key: &str, expires_in: Duration) -> AppResult<PresignedUrl> {
        Ok(PresignedUrl {
            url: format!("https://storage.test/download/{key}"),
            expires_at: Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero()),
        })
    }
}

pub(crate) struct Fixture {
    pub db: TestDatabase,
    pub fanout: Arc<RecordingFanout>,
    pub access: AccessService,
    pub messages: MessageService,
    pub reactions: ReactionService,
    pub pins: PinService,
    pub bookmarks: BookmarkService,
    pub read_states: ReadStateService,
    pub system_messages: SystemMessageService,
    pub attachments: AttachmentService,
}

impl Fixture {
    /// Workspace `ws1` owned by `owner`, with member `alice` ("Alice
    /// Johnson"), member `bob`, outsider `mallory`, public channel `general`
    /// and private channel `secret` whose only member is `owner`.
    pub(crate) async fn new() -> Self {
        Self::with_fetcher(Arc::new(OfflineFetcher)).await
    }

    /// Same seed data, with link previews served by `fetcher`.
    pub(crate) async fn with_fetcher(fetcher: Arc<dyn OgpFetcher>) -> Self {
        let db = TestDatabase::new().await.expect("test database");
        db.create_user("owner", "Owner").await.expect("seed");
        db.create_user("alice", "Alice Johnson").await.expect("seed");
        db.create_user("bob", "Bob").await.expect("seed");
        db.create_user("mallory", "Mallory").await.expect("seed");
        db.create_workspace("ws1", "owner").await.expect("seed");
        for user in ["alice", "bob"] {
            db.add_workspace_member("ws1", user, WorkspaceRole::Member)
                .await
                .expect("seed");
        }
        db.create_channel("general", "ws1", "owner", false)
            .await
            .expect("seed");
        db.create_channel("secret", "ws1", "owner", true)
            .await
            .expect("seed");
        db.add_channel_member(
            "secret",
            "owner",
            huddle_db::entities::channel_member::ChannelRole::Admin,
        )
        .await
        .expect("seed");

        let conn = db.conn.clone();
        let (dispatcher, fanout) = recording_dispatcher();

        let message_repo = MessageRepository::new(conn.clone());
        let access = AccessService::new(
            ChannelRepository::new(conn.clone()),
            WorkspaceRepository::new(conn.clone()),
            message_repo.clone(),
        );
        let views = MessageViewBuilder::new(conn.clone());
        let tx = TransactionManager::new(conn.clone());
        let links = LinkEnricher::new(tx.clone(), fetcher);

        let system_messages = SystemMessageService::new(
            SystemMessageRepository::new(conn.clone()),
            access.clone(),
            dispatcher.clone(),
        );

        Self {
            messages: MessageService::new(
                message_repo.clone(),
                AttachmentRepository::new(conn.clone()),
                tx.clone(),
                access.clone(),
                views.clone(),
                links,
                dispatcher.clone(),
            ),
            reactions: ReactionService::new(
                ReactionRepository::new(conn.clone()),
                access.clone(),
                dispatcher.clone(),
            ),
            pins: PinService::new(
                PinRepository::new(conn.clone()),
                message_repo.clone(),
                access.clone(),
                views.clone(),
                system_messages.clone(),
                dispatcher.clone(),
            ),
            bookmarks: BookmarkService::new(
                BookmarkRepository::new(conn.clone()),
                message_repo.clone(),
                ChannelRepository::new(conn.clone()),
                access.clone(),
                views,
            ),
            read_states: ReadStateService::new(
                ReadStateRepository::new(conn.clone()),
                message_repo,
                tx,
                access.clone(),
                dispatcher,
            ),
            attachments: AttachmentService::new(
                AttachmentRepository::new(conn),
                access.clone(),
                Arc::new(FakeStorage),
            ),
            system_messages,
            access,
            fanout,
            db,
        }
    }

    /// Post a plain message.
    pub(crate) async fn post(&self, channel_id: &str, user_id: &str, body: &str) -> MessageView {
        self.messages
            .create(
                channel_id,
                user_id,
                CreateMessageInput {
                    body: body.to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("post message")
    }

    /// Post a reply.
    pub(crate) async fn reply(
        &self,
        channel_id: &str,
        user_id: &str,
        parent_id: &str,
        body: &str,
    ) -> MessageView {
        self.messages
            .create(
                channel_id,
                user_id,
                CreateMessageInput {
                    body: body.to_string(),
                    parent_id: Some(parent_id.to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("post reply")
    }
}
