//! Pinned messages.

use chrono::Utc;
use huddle_common::{AppError, AppResult};
use huddle_db::entities::message_pin;
use huddle_db::repositories::{MessageRepository, PinRepository};
use sea_orm::Set;
use serde_json::json;
use tracing::warn;

use super::access::AccessService;
use super::dispatcher::EventDispatcher;
use super::system_message::{SystemMessageService, kinds};
use super::views::{MessageViewBuilder, PinView};

/// Pin service.
#[derive(Clone)]
pub struct PinService {
    pin_repo: PinRepository,
    message_repo: MessageRepository,
    access: AccessService,
    views: MessageViewBuilder,
    system_messages: SystemMessageService,
    dispatcher: EventDispatcher,
}

impl PinService {
    /// Create a new pin service.
    #[must_use]
    pub const fn new(
        pin_repo: PinRepository,
        message_repo: MessageRepository,
        access: AccessService,
        views: MessageViewBuilder,
        system_messages: SystemMessageService,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            pin_repo,
            message_repo,
            access,
            views,
            system_messages,
            dispatcher,
        }
    }

    /// Pin a message of the channel.
    pub async fn pin(
        &self,
        channel_id: &str,
        message_id: &str,
        user_id: &str,
    ) -> AppResult<PinView> {
        let channel = self.access.ensure_channel_access(channel_id, user_id).await?;

        let message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .filter(|m| m.channel_id == channel_id && !m.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("Message not found: {message_id}")))?;

        self.pin_repo
            .create(message_pin::ActiveModel {
                channel_id: Set(channel_id.to_string()),
                message_id: Set(message_id.to_string()),
                pinned_by: Set(user_id.to_string()),
                pinned_at: Set(Utc::now().into()),
            })
            .await?;

        let pin = self
            .pin_repo
            .find(channel_id, message_id)
            .await?
            .ok_or_else(|| AppError::Internal("Pin vanished after insert".to_string()))?;
        let view = PinView::new(pin, self.views.build(message).await?);

        self.dispatcher.pin_created(&channel.workspace_id, &view);

        if let Err(e) = self
            .system_messages
            .append(
                &channel,
                kinds::MESSAGE_PINNED,
                json!({ "message_id": message_id, "user_id": user_id }),
                Some(user_id),
            )
            .await
        {
            warn!(error = %e, channel_id = %channel_id, "Failed to record pin system message");
        }

        Ok(view)
    }

    /// Unpin a message.
    pub async fn unpin(&self, channel_id: &str, message_id: &str, user_id: &str) -> AppResult<()> {
        let channel = self.access.ensure_channel_access(channel_id, user_id).await?;

        if !self.pin_repo.delete(channel_id, message_id).await? {
            return Err(AppError::NotFound("Pin not found".to_string()));
        }

        self.dispatcher
            .pin_deleted(&channel.workspace_id, channel_id, message_id);

        if let Err(e) = self
            .system_messages
            .append(
                &channel,
                kinds::MESSAGE_UNPINNED,
                json!({ "message_id": message_id, "user_id": user_id }),
                Some(user_id),
            )
            .await
        {
            warn!(error = %e, channel_id = %channel_id, "Failed to record unpin system message");
        }

        Ok(())
    }

    /// Pins of a channel, most recent first.
    pub async fn list(&self, channel_id: &str, user_id: &str) -> AppResult<Vec<PinView>> {
        self.access.ensure_channel_access(channel_id, user_id).await?;

        let pins = self.pin_repo.find_by_channel(channel_id).await?;
        let message_ids: Vec<String> = pins.iter().map(|p| p.message_id.clone()).collect();
        let mut views = self
            .views
            .build_many(self.message_repo.find_by_ids(&message_ids).await?)
            .await?;

        Ok(pins
            .into_iter()
            .filter_map(|pin| {
                let index = views.iter().position(|v| v.id == pin.message_id)?;
                Some(PinView::new(pin, views.swap_remove(index)))
            })
            .collect())
    }
}
