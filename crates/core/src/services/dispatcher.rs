//! Event dispatcher.
//!
//! Turns service outcomes into [`ServerEvent`] frames and routes them to
//! live sessions through a [`Fanout`]. The session hub is the production
//! fanout; services never talk to sockets directly.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::warn;

use super::events::ServerEvent;
use super::views::{MessageView, PinView, SystemMessageView};

/// Routes encoded frames to live sessions.
///
/// Calls must not block; implementations enqueue and return.
pub trait Fanout: Send + Sync {
    /// Every session in the workspace.
    fn to_workspace(&self, workspace_id: &str, payload: Bytes);

    /// Every session of one user in the workspace.
    fn to_user(&self, workspace_id: &str, user_id: &str, payload: Bytes);

    /// Every session subscribed to the channel, minus the sessions of
    /// `exclude_user` when given.
    fn to_channel(
        &self,
        workspace_id: &str,
        channel_id: &str,
        payload: Bytes,
        exclude_user: Option<&str>,
    );
}

/// Fanout that drops everything.
#[derive(Clone, Default)]
pub struct NoOpFanout;

impl Fanout for NoOpFanout {
    fn to_workspace(&self, _workspace_id: &str, _payload: Bytes) {}

    fn to_user(&self, _workspace_id: &str, _user_id: &str, _payload: Bytes) {}

    fn to_channel(
        &self,
        _workspace_id: &str,
        _channel_id: &str,
        _payload: Bytes,
        _exclude_user: Option<&str>,
    ) {
    }
}

/// Type alias for a shared fanout.
pub type FanoutService = Arc<dyn Fanout>;

/// Encodes events and hands them to the fanout.
#[derive(Clone)]
pub struct EventDispatcher {
    fanout: FanoutService,
}

impl EventDispatcher {
    /// Create a dispatcher over `fanout`.
    #[must_use]
    pub fn new(fanout: FanoutService) -> Self {
        Self { fanout }
    }

    /// Dispatcher that delivers nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoOpFanout))
    }

    /// Encode an event. Failures are logged and the event is dropped.
    #[must_use]
    pub fn encode(event: &ServerEvent) -> Option<Bytes> {
        match serde_json::to_vec(event) {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) => {
                warn!(error = %e, "Failed to encode server event");
                None
            }
        }
    }

    fn channel(
        &self,
        workspace_id: &str,
        channel_id: &str,
        event: &ServerEvent,
        exclude_user: Option<&str>,
    ) {
        if let Some(payload) = Self::encode(event) {
            self.fanout
                .to_channel(workspace_id, channel_id, payload, exclude_user);
        }
    }

    pub fn new_message(&self, workspace_id: &str, message: &MessageView) {
        self.channel(
            workspace_id,
            &message.channel_id,
            &ServerEvent::NewMessage {
                channel_id: message.channel_id.clone(),
                message: message.clone(),
            },
            None,
        );
    }

    pub fn message_updated(&self, workspace_id: &str, message: &MessageView) {
        self.channel(
            workspace_id,
            &message.channel_id,
            &ServerEvent::MessageUpdated {
                channel_id: message.channel_id.clone(),
                message: message.clone(),
            },
            None,
        );
    }

    pub fn message_deleted(
        &self,
        workspace_id: &str,
        channel_id: &str,
        message_id: &str,
        deleted_by: &str,
        deleted_at: DateTime<Utc>,
    ) {
        self.channel(
            workspace_id,
            channel_id,
            &ServerEvent::MessageDeleted {
                channel_id: channel_id.to_string(),
                message_id: message_id.to_string(),
                deleted_by: deleted_by.to_string(),
                deleted_at,
            },
            None,
        );
    }

    pub fn reaction_added(
        &self,
        workspace_id: &str,
        channel_id: &str,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) {
        self.channel(
            workspace_id,
            channel_id,
            &ServerEvent::ReactionAdded {
                channel_id: channel_id.to_string(),
                message_id: message_id.to_string(),
                user_id: user_id.to_string(),
                emoji: emoji.to_string(),
            },
            None,
        );
    }

    pub fn reaction_removed(
        &self,
        workspace_id: &str,
        channel_id: &str,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) {
        self.channel(
            workspace_id,
            channel_id,
            &ServerEvent::ReactionRemoved {
                channel_id: channel_id.to_string(),
                message_id: message_id.to_string(),
                user_id: user_id.to_string(),
                emoji: emoji.to_string(),
            },
            None,
        );
    }

    pub fn pin_created(&self, workspace_id: &str, pin: &PinView) {
        self.channel(
            workspace_id,
            &pin.channel_id,
            &ServerEvent::PinCreated {
                channel_id: pin.channel_id.clone(),
                pin: pin.clone(),
            },
            None,
        );
    }

    pub fn pin_deleted(&self, workspace_id: &str, channel_id: &str, message_id: &str) {
        self.channel(
            workspace_id,
            channel_id,
            &ServerEvent::PinDeleted {
                channel_id: channel_id.to_string(),
                message_id: message_id.to_string(),
            },
            None,
        );
    }

    pub fn system_message_created(&self, workspace_id: &str, system_message: &SystemMessageView) {
        self.channel(
            workspace_id,
            &system_message.channel_id,
            &ServerEvent::SystemMessageCreated {
                channel_id: system_message.channel_id.clone(),
                system_message: system_message.clone(),
            },
            None,
        );
    }

    /// Relay a typing indicator to everyone in the channel but the typist.
    pub fn typing(&self, workspace_id: &str, channel_id: &str, user_id: &str) {
        self.channel(
            workspace_id,
            channel_id,
            &ServerEvent::Typing {
                channel_id: channel_id.to_string(),
                user_id: user_id.to_string(),
            },
            Some(user_id),
        );
    }

    /// Send a channel's unread count to all of the user's sessions.
    pub fn unread_count(
        &self,
        workspace_id: &str,
        user_id: &str,
        channel_id: &str,
        unread_count: u64,
        has_mention: bool,
    ) {
        let event = ServerEvent::UnreadCount {
            channel_id: channel_id.to_string(),
            unread_count,
            has_mention,
        };
        if let Some(payload) = Self::encode(&event) {
            self.fanout.to_user(workspace_id, user_id, payload);
        }
    }
}
