//! Reaction service.

use huddle_common::{AppError, AppResult};
use huddle_db::repositories::ReactionRepository;
use tracing::debug;

use super::access::AccessService;
use super::dispatcher::EventDispatcher;

/// Maximum emoji length in characters.
const MAX_EMOJI_CHARS: usize = 64;

/// Reaction service for business logic.
#[derive(Clone)]
pub struct ReactionService {
    reaction_repo: ReactionRepository,
    access: AccessService,
    dispatcher: EventDispatcher,
}

impl ReactionService {
    /// Create a new reaction service.
    #[must_use]
    pub const fn new(
        reaction_repo: ReactionRepository,
        access: AccessService,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            reaction_repo,
            access,
            dispatcher,
        }
    }

    fn normalize_emoji(emoji: &str) -> AppResult<&str> {
        let emoji = emoji.trim();
        let chars = emoji.chars().count();
        if chars == 0 || chars > MAX_EMOJI_CHARS {
            return Err(AppError::Validation(format!(
                "Emoji must be 1 to {MAX_EMOJI_CHARS} characters"
            )));
        }
        Ok(emoji)
    }

    /// React to a message. Reacting twice with the same emoji is a no-op.
    pub async fn add(&self, message_id: &str, user_id: &str, emoji: &str) -> AppResult<()> {
        let emoji = Self::normalize_emoji(emoji)?;
        let (message, channel) = self.access.ensure_message_access(message_id, user_id).await?;
        if message.is_deleted() {
            return Err(AppError::NotFound(format!("Message not found: {message_id}")));
        }

        if self.reaction_repo.add(message_id, user_id, emoji).await? {
            self.dispatcher.reaction_added(
                &channel.workspace_id,
                &channel.id,
                message_id,
                user_id,
                emoji,
            );
        } else {
            debug!(message_id = %message_id, emoji = %emoji, "Reaction already present");
        }

        Ok(())
    }

    /// Remove a reaction. Removing an absent reaction is a no-op.
    pub async fn remove(&self, message_id: &str, user_id: &str, emoji: &str) -> AppResult<()> {
        let emoji = Self::normalize_emoji(emoji)?;
        let (_, channel) = self.access.ensure_message_access(message_id, user_id).await?;

        if self.reaction_repo.remove(message_id, user_id, emoji).await? {
            self.dispatcher.reaction_removed(
                &channel.workspace_id,
                &channel.id,
                message_id,
                user_id,
                emoji,
            );
        }

        Ok(())
    }
}
