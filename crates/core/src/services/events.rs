//! WebSocket wire events.
//!
//! Every frame is a JSON envelope `{"type": ..., "payload": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::views::{MessageView, PinView, SystemMessageView};

/// Events sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage {
        channel_id: String,
        message: MessageView,
    },
    MessageUpdated {
        channel_id: String,
        message: MessageView,
    },
    MessageDeleted {
        channel_id: String,
        message_id: String,
        deleted_by: String,
        deleted_at: DateTime<Utc>,
    },
    ReactionAdded {
        channel_id: String,
        message_id: String,
        user_id: String,
        emoji: String,
    },
    ReactionRemoved {
        channel_id: String,
        message_id: String,
        user_id: String,
        emoji: String,
    },
    UnreadCount {
        channel_id: String,
        unread_count: u64,
        has_mention: bool,
    },
    PinCreated {
        channel_id: String,
        pin: PinView,
    },
    PinDeleted {
        channel_id: String,
        message_id: String,
    },
    SystemMessageCreated {
        channel_id: String,
        system_message: SystemMessageView,
    },
    Typing {
        channel_id: String,
        user_id: String,
    },
    Ack {
        /// Type of the client event being acknowledged.
        #[serde(rename = "type")]
        event_type: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    /// Successful acknowledgement of a client event.
    #[must_use]
    pub fn ack(event_type: &str) -> Self {
        Self::Ack {
            event_type: event_type.to_string(),
            success: true,
            message: None,
        }
    }

    /// Failed acknowledgement of a client event.
    #[must_use]
    pub fn nack(event_type: &str, message: impl Into<String>) -> Self {
        Self::Ack {
            event_type: event_type.to_string(),
            success: false,
            message: Some(message.into()),
        }
    }

    /// Error frame for a client event that could not be served.
    #[must_use]
    pub fn error(err: &huddle_common::AppError) -> Self {
        Self::Error {
            code: err.error_code().to_string(),
            message: err.public_message(),
        }
    }
}

/// Events sent from clients to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChannel {
        channel_id: String,
    },
    LeaveChannel {
        channel_id: String,
    },
    PostMessage {
        channel_id: String,
        #[serde(default)]
        body: String,
        #[serde(default)]
        parent_id: Option<String>,
        #[serde(default)]
        attachment_ids: Vec<String>,
    },
    Typing {
        channel_id: String,
    },
    UpdateReadState {
        channel_id: String,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        last_read_at: Option<DateTime<Utc>>,
    },
}

impl ClientEvent {
    /// Wire name of the event, echoed back in acknowledgements.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JoinChannel { .. } => "join_channel",
            Self::LeaveChannel { .. } => "leave_channel",
            Self::PostMessage { .. } => "post_message",
            Self::Typing { .. } => "typing",
            Self::UpdateReadState { .. } => "update_read_state",
        }
    }
}
