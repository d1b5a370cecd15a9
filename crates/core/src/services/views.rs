//! Read models assembled for clients.
//!
//! Views are built in bulk: one query per related table for a whole page
//! of messages, never one per message.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_common::AppResult;
use huddle_db::entities::{attachment, message, message_link, message_pin, system_message};
use huddle_db::repositories::{
    AttachmentRepository, LinkRepository, MentionRepository, ReactionRepository,
    UserGroupRepository, UserRepository,
};
use sea_orm::DatabaseConnection;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub(crate) fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

/// Public profile of a message author or mentioned user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A mentioned user group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
}

/// Link card attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkView {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub site_name: Option<String>,
    pub card_type: Option<String>,
}

impl From<message_link::Model> for LinkView {
    fn from(link: message_link::Model) -> Self {
        Self {
            url: link.url,
            title: link.title,
            description: link.description,
            image_url: link.image_url,
            site_name: link.site_name,
            card_type: link.card_type,
        }
    }
}

/// Reactions with one emoji, in the order users added them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<String>,
}

/// Attachment metadata. Bytes are fetched through a presigned URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentView {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

impl From<attachment::Model> for AttachmentView {
    fn from(attachment: attachment::Model) -> Self {
        Self {
            id: attachment.id,
            file_name: attachment.file_name,
            mime_type: attachment.mime_type,
            size_bytes: attachment.size_bytes,
        }
    }
}

/// A message as clients see it.
///
/// Deleted messages keep their reactions and attachments; the body,
/// mentions and links are redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    pub user: Option<UserSummary>,
    pub mentions: Vec<UserSummary>,
    pub groups: Vec<GroupSummary>,
    pub links: Vec<LinkView>,
    pub reactions: Vec<ReactionSummary>,
    pub attachments: Vec<AttachmentView>,
}

impl MessageView {
    /// The message alone, without author, mentions, links, reactions or
    /// attachments.
    fn bare(m: message::Model) -> Self {
        let deleted = m.is_deleted();
        Self {
            body: if deleted { String::new() } else { m.body },
            id: m.id,
            channel_id: m.channel_id,
            user_id: m.user_id,
            parent_id: m.parent_id,
            created_at: utc(m.created_at),
            edited_at: m.edited_at.map(utc),
            deleted_at: m.deleted_at.map(utc),
            deleted_by: m.deleted_by,
            user: None,
            mentions: vec![],
            groups: vec![],
            links: vec![],
            reactions: vec![],
            attachments: vec![],
        }
    }
}

/// A pinned message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinView {
    pub channel_id: String,
    pub message_id: String,
    pub pinned_by: String,
    pub pinned_at: DateTime<Utc>,
    pub message: MessageView,
}

impl PinView {
    pub(crate) fn new(pin: message_pin::Model, message: MessageView) -> Self {
        Self {
            channel_id: pin.channel_id,
            message_id: pin.message_id,
            pinned_by: pin.pinned_by,
            pinned_at: utc(pin.pinned_at),
            message,
        }
    }
}

/// A bookmarked message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkView {
    pub message_id: String,
    pub created_at: DateTime<Utc>,
    pub message: MessageView,
}

/// A system message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessageView {
    pub id: String,
    pub channel_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub actor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<system_message::Model> for SystemMessageView {
    fn from(model: system_message::Model) -> Self {
        Self {
            id: model.id,
            channel_id: model.channel_id,
            kind: model.kind,
            payload: model.payload,
            actor_id: model.actor_id,
            created_at: utc(model.created_at),
        }
    }
}

/// Assembles [`MessageView`]s.
#[derive(Clone)]
pub struct MessageViewBuilder {
    user_repo: UserRepository,
    mention_repo: MentionRepository,
    group_repo: UserGroupRepository,
    link_repo: LinkRepository,
    reaction_repo: ReactionRepository,
    attachment_repo: AttachmentRepository,
}

impl MessageViewBuilder {
    /// Create a view builder over the shared connection pool.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            user_repo: UserRepository::new(db.clone()),
            mention_repo: MentionRepository::new(db.clone()),
            group_repo: UserGroupRepository::new(db.clone()),
            link_repo: LinkRepository::new(db.clone()),
            reaction_repo: ReactionRepository::new(db.clone()),
            attachment_repo: AttachmentRepository::new(db),
        }
    }

    /// Build the view of a single message.
    pub async fn build(&self, message: message::Model) -> AppResult<MessageView> {
        let mut views = self.build_many(vec![message]).await?;
        views.pop().ok_or_else(|| {
            huddle_common::AppError::Internal("View builder returned no message".to_string())
        })
    }

    /// Build the view of a message that is already committed.
    ///
    /// The write cannot be undone at this point, so a failed lookup of
    /// related rows degrades to the bare message instead of an error.
    pub async fn build_committed(&self, message: message::Model) -> MessageView {
        match self.build_many(vec![message.clone()]).await {
            Ok(mut views) if !views.is_empty() => views.swap_remove(0),
            Ok(_) => MessageView::bare(message),
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Falling back to a bare message view");
                MessageView::bare(message)
            }
        }
    }

    /// Build views for `messages`, keeping their order.
    pub async fn build_many(&self, messages: Vec<message::Model>) -> AppResult<Vec<MessageView>> {
        if messages.is_empty() {
            return Ok(vec![]);
        }

        let message_ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();

        let user_mentions = self.mention_repo.find_user_mentions(&message_ids).await?;
        let group_mentions = self.mention_repo.find_group_mentions(&message_ids).await?;
        let links = self.link_repo.find_by_message_ids(&message_ids).await?;
        let reactions = self.reaction_repo.find_by_message_ids(&message_ids).await?;
        let attachments = self.attachment_repo.find_by_message_ids(&message_ids).await?;

        let user_ids: Vec<String> = messages
            .iter()
            .map(|m| m.user_id.clone())
            .chain(user_mentions.iter().map(|m| m.user_id.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let users: HashMap<String, UserSummary> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| {
                (
                    u.id.clone(),
                    UserSummary {
                        id: u.id,
                        display_name: u.display_name,
                        avatar_url: u.avatar_url,
                    },
                )
            })
            .collect();

        let group_ids: Vec<String> = group_mentions
            .iter()
            .map(|m| m.group_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let groups: HashMap<String, GroupSummary> = self
            .group_repo
            .find_by_ids(&group_ids)
            .await?
            .into_iter()
            .map(|g| {
                (
                    g.id.clone(),
                    GroupSummary {
                        id: g.id,
                        name: g.name,
                    },
                )
            })
            .collect();

        let mut mentions_by_message: HashMap<String, Vec<UserSummary>> = HashMap::new();
        for mention in user_mentions {
            if let Some(user) = users.get(&mention.user_id) {
                mentions_by_message
                    .entry(mention.message_id)
                    .or_default()
                    .push(user.clone());
            }
        }

        let mut groups_by_message: HashMap<String, Vec<GroupSummary>> = HashMap::new();
        for mention in group_mentions {
            if let Some(group) = groups.get(&mention.group_id) {
                groups_by_message
                    .entry(mention.message_id)
                    .or_default()
                    .push(group.clone());
            }
        }

        let mut links_by_message: HashMap<String, Vec<LinkView>> = HashMap::new();
        for link in links {
            links_by_message
                .entry(link.message_id.clone())
                .or_default()
                .push(link.into());
        }

        let mut reactions_by_message: HashMap<String, Vec<ReactionSummary>> = HashMap::new();
        for reaction in reactions {
            let summaries = reactions_by_message.entry(reaction.message_id).or_default();
            match summaries.iter_mut().find(|s| s.emoji == reaction.emoji) {
                Some(summary) => {
                    summary.count += 1;
                    summary.user_ids.push(reaction.user_id);
                }
                None => summaries.push(ReactionSummary {
                    emoji: reaction.emoji,
                    count: 1,
                    user_ids: vec![reaction.user_id],
                }),
            }
        }

        let mut attachments_by_message: HashMap<String, Vec<AttachmentView>> = HashMap::new();
        for attachment in attachments {
            if let Some(message_id) = attachment.message_id.clone() {
                attachments_by_message
                    .entry(message_id)
                    .or_default()
                    .push(attachment.into());
            }
        }

        Ok(messages
            .into_iter()
            .map(|m| {
                let deleted = m.is_deleted();
                let mentions = mentions_by_message.remove(&m.id).unwrap_or_default();
                let groups = groups_by_message.remove(&m.id).unwrap_or_default();
                let links = links_by_message.remove(&m.id).unwrap_or_default();
                let reactions = reactions_by_message.remove(&m.id).unwrap_or_default();
                let attachments = attachments_by_message.remove(&m.id).unwrap_or_default();

                MessageView {
                    user: users.get(&m.user_id).cloned(),
                    body: if deleted { String::new() } else { m.body },
                    mentions: if deleted { vec![] } else { mentions },
                    groups: if deleted { vec![] } else { groups },
                    links: if deleted { vec![] } else { links },
                    reactions,
                    attachments,
                    id: m.id,
                    channel_id: m.channel_id,
                    user_id: m.user_id,
                    parent_id: m.parent_id,
                    created_at: utc(m.created_at),
                    edited_at: m.edited_at.map(utc),
                    deleted_at: m.deleted_at.map(utc),
                    deleted_by: m.deleted_by,
                }
            })
            .collect())
    }
}
