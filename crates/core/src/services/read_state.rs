//! Read-state engine.
//!
//! A read state is the per-(channel, user) high-water mark `last_read_at`.
//! Marks only move forward: a stale mark from a lagging device never
//! rewinds one written by another device.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use huddle_common::{AppError, AppResult};
use huddle_db::TransactionManager;
use huddle_db::repositories::{MessageRepository, ReadStateRepository};
use serde::Serialize;
use tracing::debug;

use super::access::AccessService;
use super::dispatcher::EventDispatcher;
use super::views::utc;

/// Where the user has read up to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadMark {
    /// Read up to and including this message.
    Message(String),
    /// Read up to this instant.
    At(DateTime<Utc>),
}

/// Unread status of one channel for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadStatus {
    pub channel_id: String,
    pub unread_count: u64,
    pub has_mention: bool,
    pub last_read_at: Option<DateTime<Utc>>,
}

/// Unread totals of one channel in the cross-channel summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelUnread {
    pub unread_count: u64,
    pub has_mention: bool,
}

/// Read-state service.
#[derive(Clone)]
pub struct ReadStateService {
    read_state_repo: ReadStateRepository,
    message_repo: MessageRepository,
    tx: TransactionManager,
    access: AccessService,
    dispatcher: EventDispatcher,
}

impl ReadStateService {
    /// Create a new read-state service.
    #[must_use]
    pub const fn new(
        read_state_repo: ReadStateRepository,
        message_repo: MessageRepository,
        tx: TransactionManager,
        access: AccessService,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            read_state_repo,
            message_repo,
            tx,
            access,
            dispatcher,
        }
    }

    /// Advance the user's read mark in a channel.
    ///
    /// Marks in the future are clamped to now; marks at or behind the stored
    /// one change nothing. When the mark moves, every session of the user
    /// receives the channel's new unread count.
    pub async fn update(
        &self,
        channel_id: &str,
        user_id: &str,
        mark: ReadMark,
    ) -> AppResult<UnreadStatus> {
        let channel = self.access.ensure_channel_access(channel_id, user_id).await?;

        let target = match mark {
            ReadMark::At(at) => at,
            ReadMark::Message(message_id) => {
                let message = self
                    .message_repo
                    .find_by_id(&message_id)
                    .await?
                    .filter(|m| m.channel_id == channel_id)
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "Message {message_id} is not in this channel"
                        ))
                    })?;
                utc(message.created_at)
            }
        };
        let target = target.min(Utc::now());

        let (channel_key, user_key) = (channel_id.to_string(), user_id.to_string());
        let advanced = self
            .tx
            .run(move |txn| {
                Box::pin(async move {
                    ReadStateRepository::advance_in(txn, &channel_key, &user_key, target).await
                })
            })
            .await?;

        let status = self.status(channel_id, user_id).await?;

        if advanced {
            self.dispatcher.unread_count(
                &channel.workspace_id,
                user_id,
                channel_id,
                status.unread_count,
                status.has_mention,
            );
        } else {
            debug!(channel_id = %channel_id, user_id = %user_id, "Read mark not advanced");
        }

        Ok(status)
    }

    /// Unread status of one channel.
    pub async fn unread_count(&self, channel_id: &str, user_id: &str) -> AppResult<UnreadStatus> {
        self.access.ensure_channel_access(channel_id, user_id).await?;
        self.status(channel_id, user_id).await
    }

    /// Unread totals of every channel the user can access, keyed by
    /// channel ID.
    pub async fn unread_channels(
        &self,
        user_id: &str,
    ) -> AppResult<BTreeMap<String, ChannelUnread>> {
        Ok(self
            .read_state_repo
            .unread_summary(user_id)
            .await?
            .into_iter()
            .map(|row| {
                (
                    row.channel_id,
                    ChannelUnread {
                        unread_count: row.unread_count,
                        has_mention: row.mention_count > 0,
                    },
                )
            })
            .collect())
    }

    async fn status(&self, channel_id: &str, user_id: &str) -> AppResult<UnreadStatus> {
        let last_read_at = self
            .read_state_repo
            .find(channel_id, user_id)
            .await?
            .map(|state| utc(state.last_read_at));

        let unread_count = self
            .read_state_repo
            .count_unread(channel_id, last_read_at)
            .await?;
        let has_mention = unread_count > 0
            && self
                .read_state_repo
                .has_unread_mention(channel_id, user_id, last_read_at)
                .await?;

        Ok(UnreadStatus {
            channel_id: channel_id.to_string(),
            unread_count,
            has_mention,
            last_read_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::dispatcher::testing::Delivery;
    use crate::services::fixture::Fixture;
    use chrono::Duration;

    #[tokio::test]
    async fn test_marks_never_move_backwards() {
        let fx = Fixture::new().await;
        let base = Utc::now() - Duration::minutes(30);
        for (i, id) in ["m1", "m2", "m3"].into_iter().enumerate() {
            fx.db
                .create_message_at(id, "general", "alice", None, id, base + Duration::minutes(i as i64))
                .await
                .unwrap();
        }

        let status = fx
            .read_states
            .update("general", "bob", ReadMark::Message("m3".to_string()))
            .await
            .unwrap();
        assert_eq!(status.unread_count, 0);
        let high_water = status.last_read_at.unwrap();

        let events = fx.fanout.take();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Delivery::User { user_id, event, .. } => {
                assert_eq!(user_id, "bob");
                assert_eq!(event["type"], "unread_count");
                assert_eq!(event["payload"]["unread_count"], 0);
            }
            other => panic!("unexpected delivery: {other:?}"),
        }

        let status = fx
            .read_states
            .update("general", "bob", ReadMark::Message("m1".to_string()))
            .await
            .unwrap();
        assert_eq!(status.last_read_at, Some(high_water));
        assert_eq!(status.unread_count, 0);
        assert!(fx.fanout.take().is_empty());
    }

    #[tokio::test]
    async fn test_future_mark_clamped() {
        let fx = Fixture::new().await;
        fx.post("general", "alice", "hello").await;

        let status = fx
            .read_states
            .update("general", "bob", ReadMark::At(Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        assert!(status.last_read_at.unwrap() <= Utc::now());
        assert_eq!(status.unread_count, 0);

        // A message posted after the clamp is unread.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        fx.post("general", "alice", "later").await;
        let status = fx.read_states.unread_count("general", "bob").await.unwrap();
        assert_eq!(status.unread_count, 1);
    }

    #[tokio::test]
    async fn test_unread_mentions_and_summary() {
        let fx = Fixture::new().await;
        fx.post("general", "alice", "morning").await;
        fx.post("general", "alice", "@bob are you there").await;

        let status = fx.read_states.unread_count("general", "bob").await.unwrap();
        assert_eq!(status.unread_count, 2);
        assert!(status.has_mention);
        assert!(status.last_read_at.is_none());

        let summary = fx.read_states.unread_channels("bob").await.unwrap();
        assert_eq!(
            summary.get("general"),
            Some(&ChannelUnread {
                unread_count: 2,
                has_mention: true,
            })
        );
        assert!(!summary.contains_key("secret"));

        fx.read_states
            .update("general", "bob", ReadMark::At(Utc::now()))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        fx.post("general", "alice", "quiet").await;
        let summary = fx.read_states.unread_channels("bob").await.unwrap();
        assert_eq!(
            summary.get("general"),
            Some(&ChannelUnread {
                unread_count: 1,
                has_mention: false,
            })
        );
    }

    #[tokio::test]
    async fn test_foreign_message_rejected() {
        let fx = Fixture::new().await;
        let hidden = fx.post("secret", "owner", "hidden").await;

        let result = fx
            .read_states
            .update("general", "bob", ReadMark::Message(hidden.id))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = fx.read_states.unread_count("secret", "bob").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
