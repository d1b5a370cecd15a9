//! System messages.

use chrono::Utc;
use huddle_common::{AppResult, IdGenerator};
use huddle_db::entities::{channel, system_message};
use huddle_db::repositories::SystemMessageRepository;
use sea_orm::Set;

use super::access::AccessService;
use super::dispatcher::EventDispatcher;
use super::message::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use super::views::SystemMessageView;

/// Kind of a system message.
pub mod kinds {
    pub const MESSAGE_PINNED: &str = "message_pinned";
    pub const MESSAGE_UNPINNED: &str = "message_unpinned";
}

/// Appends and lists system messages.
#[derive(Clone)]
pub struct SystemMessageService {
    repo: SystemMessageRepository,
    access: AccessService,
    dispatcher: EventDispatcher,
    id_gen: IdGenerator,
}

impl SystemMessageService {
    #[must_use]
    pub const fn new(
        repo: SystemMessageRepository,
        access: AccessService,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            repo,
            access,
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record a state change in `channel` and announce it.
    pub async fn append(
        &self,
        channel: &channel::Model,
        kind: &str,
        payload: serde_json::Value,
        actor_id: Option<&str>,
    ) -> AppResult<SystemMessageView> {
        let model = system_message::ActiveModel {
            id: Set(self.id_gen.generate()),
            channel_id: Set(channel.id.clone()),
            kind: Set(kind.to_string()),
            payload: Set(payload),
            actor_id: Set(actor_id.map(ToString::to_string)),
            created_at: Set(Utc::now().into()),
        };

        let view = SystemMessageView::from(self.repo.create(model).await?);
        self.dispatcher
            .system_message_created(&channel.workspace_id, &view);
        Ok(view)
    }

    /// Latest system messages of a channel, oldest first.
    pub async fn list(
        &self,
        channel_id: &str,
        user_id: &str,
        limit: Option<u64>,
    ) -> AppResult<Vec<SystemMessageView>> {
        self.access.ensure_channel_access(channel_id, user_id).await?;

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(self
            .repo
            .find_by_channel(channel_id, limit)
            .await?
            .into_iter()
            .map(SystemMessageView::from)
            .collect())
    }
}
