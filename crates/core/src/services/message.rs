//! Message write pipeline and history reads.

use chrono::{DateTime, Utc};
use huddle_common::{AppError, AppResult, IdGenerator};
use huddle_db::TransactionManager;
use huddle_db::entities::{attachment::AttachmentStatus, message};
use huddle_db::repositories::{
    AttachmentRepository, HistoryCursor, MentionRepository, MessageRepository,
};
use sea_orm::{ConnectionTrait, Set};
use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use super::access::AccessService;
use super::dispatcher::EventDispatcher;
use super::link::{LinkEnricher, extract_urls};
use super::mention::MentionResolver;
use super::views::{MessageView, MessageViewBuilder, utc};

/// Maximum number of messages per history page.
pub const MAX_PAGE_SIZE: u64 = 100;

/// History page size when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Input for posting a message.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateMessageInput {
    #[serde(default)]
    #[validate(length(max = 40000))]
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub attachment_ids: Vec<String>,
}

/// Input for editing a message.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditMessageInput {
    #[validate(length(max = 40000))]
    pub body: String,
}

/// History query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMessagesQuery {
    pub since: Option<DateTime<Utc>>,
    /// Id of the last message seen at `since`, to page through ties.
    pub since_id: Option<String>,
    pub until: Option<DateTime<Utc>>,
    /// Id of the oldest message seen at `until`.
    pub until_id: Option<String>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// Message service.
#[derive(Clone)]
pub struct MessageService {
    message_repo: MessageRepository,
    attachment_repo: AttachmentRepository,
    tx: TransactionManager,
    access: AccessService,
    views: MessageViewBuilder,
    links: LinkEnricher,
    mentions: MentionResolver,
    dispatcher: EventDispatcher,
    id_gen: IdGenerator,
}

impl MessageService {
    /// Create a new message service.
    #[must_use]
    pub fn new(
        message_repo: MessageRepository,
        attachment_repo: AttachmentRepository,
        tx: TransactionManager,
        access: AccessService,
        views: MessageViewBuilder,
        links: LinkEnricher,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            message_repo,
            attachment_repo,
            tx,
            access,
            views,
            links,
            mentions: MentionResolver::new(),
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Post a message to a channel.
    ///
    /// The message row, its attachment bindings and its mentions commit
    /// together. Link previews are fetched afterwards and announced with a
    /// `message_updated` event once stored.
    pub async fn create(
        &self,
        channel_id: &str,
        user_id: &str,
        input: CreateMessageInput,
    ) -> AppResult<MessageView> {
        input.validate()?;

        let channel = self.access.ensure_channel_access(channel_id, user_id).await?;

        let body = input.body.trim().to_string();
        let mut attachment_ids = Vec::with_capacity(input.attachment_ids.len());
        for id in input.attachment_ids {
            if !attachment_ids.contains(&id) {
                attachment_ids.push(id);
            }
        }

        if body.is_empty() && attachment_ids.is_empty() {
            return Err(AppError::Validation(
                "Message must have a body or attachments".to_string(),
            ));
        }

        if let Some(parent_id) = &input.parent_id {
            self.check_parent(channel_id, parent_id).await?;
        }
        self.check_attachments(channel_id, user_id, &attachment_ids)
            .await?;

        let now = Utc::now();
        let model = message::ActiveModel {
            id: Set(self.id_gen.generate()),
            channel_id: Set(channel_id.to_string()),
            user_id: Set(user_id.to_string()),
            parent_id: Set(input.parent_id),
            body: Set(body),
            created_at: Set(now.into()),
            edited_at: Set(None),
            deleted_at: Set(None),
            deleted_by: Set(None),
        };

        let workspace_id = channel.workspace_id.clone();
        let resolver = self.mentions.clone();
        let message = self
            .tx
            .run(move |txn| {
                Box::pin(async move {
                    Self::insert_in(txn, &resolver, &workspace_id, model, &attachment_ids, now)
                        .await
                })
            })
            .await?;

        info!(message_id = %message.id, channel_id = %channel_id, "Message created");

        let view = self.views.build_committed(message).await;
        self.dispatcher.new_message(&channel.workspace_id, &view);
        self.spawn_link_enrichment(&channel.workspace_id, &view.id, &view.body, false);

        Ok(view)
    }

    /// Insert a message with its mentions, then bind its attachments.
    /// Fails when any attachment can no longer be bound, so the caller's
    /// transaction rolls everything back.
    async fn insert_in<C: ConnectionTrait>(
        txn: &C,
        resolver: &MentionResolver,
        workspace_id: &str,
        model: message::ActiveModel,
        attachment_ids: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<message::Model> {
        let message = MessageRepository::insert_in(txn, model).await?;

        let mentions = resolver.resolve_in(txn, workspace_id, &message.body).await?;
        MentionRepository::insert_user_mentions_in(txn, &message.id, &mentions.user_ids).await?;
        MentionRepository::insert_group_mentions_in(txn, &message.id, &mentions.group_ids).await?;

        let bound = AttachmentRepository::bind_to_message_in(
            txn,
            attachment_ids,
            &message.id,
            &message.user_id,
            &message.channel_id,
            now,
        )
        .await?;
        if bound != attachment_ids.len() as u64 {
            return Err(AppError::Validation(
                "One or more attachments are no longer available".to_string(),
            ));
        }

        Ok(message)
    }

    /// Edit a message body. Only the author may edit, and only while the
    /// message is not deleted.
    pub async fn edit(
        &self,
        message_id: &str,
        user_id: &str,
        input: EditMessageInput,
    ) -> AppResult<MessageView> {
        input.validate()?;

        let (message, channel) = self.access.ensure_message_access(message_id, user_id).await?;

        if message.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can edit a message".to_string(),
            ));
        }
        if message.is_deleted() {
            return Err(AppError::Validation(
                "Cannot edit a deleted message".to_string(),
            ));
        }

        let body = input.body.trim().to_string();
        if body.is_empty()
            && self
                .attachment_repo
                .find_by_message_ids(&[message.id.clone()])
                .await?
                .is_empty()
        {
            return Err(AppError::Validation(
                "Message must have a body or attachments".to_string(),
            ));
        }

        let workspace_id = channel.workspace_id.clone();
        let resolver = self.mentions.clone();
        let now = Utc::now();
        let updated = self
            .tx
            .run(move |txn| {
                Box::pin(async move {
                    let updated = MessageRepository::update_body_in(txn, &message.id, &body, now)
                        .await?
                        .ok_or_else(|| {
                            AppError::Validation("Cannot edit a deleted message".to_string())
                        })?;

                    MentionRepository::delete_by_message_in(txn, &updated.id).await?;
                    let mentions = resolver
                        .resolve_in(txn, &workspace_id, &updated.body)
                        .await?;
                    MentionRepository::insert_user_mentions_in(txn, &updated.id, &mentions.user_ids)
                        .await?;
                    MentionRepository::insert_group_mentions_in(
                        txn,
                        &updated.id,
                        &mentions.group_ids,
                    )
                    .await?;

                    Ok(updated)
                })
            })
            .await?;

        let view = self.views.build_committed(updated).await;
        self.dispatcher.message_updated(&channel.workspace_id, &view);
        self.spawn_link_enrichment(&channel.workspace_id, &view.id, &view.body, true);

        Ok(view)
    }

    /// Soft-delete a message. Deleting a thread root also deletes its replies.
    pub async fn delete(&self, message_id: &str, user_id: &str) -> AppResult<()> {
        let (message, channel) = self.access.ensure_message_access(message_id, user_id).await?;

        if message.is_deleted() {
            return Err(AppError::NotFound(format!("Message not found: {message_id}")));
        }
        if message.user_id != user_id && !self.access.is_channel_admin(&channel, user_id).await? {
            return Err(AppError::Forbidden(
                "Only the author or an admin can delete a message".to_string(),
            ));
        }

        let now = Utc::now();
        let deleted_by = user_id.to_string();
        let deleted_ids = self
            .tx
            .run(move |txn| {
                Box::pin(async move {
                    let mut ids = vec![message.id.clone()];
                    if message.parent_id.is_none() {
                        ids.extend(MessageRepository::find_reply_ids_in(txn, &message.id).await?);
                    }
                    MessageRepository::soft_delete_in(txn, &ids, &deleted_by, now).await?;
                    Ok(ids)
                })
            })
            .await?;

        info!(message_id = %message_id, count = deleted_ids.len(), "Messages deleted");

        for id in &deleted_ids {
            self.dispatcher
                .message_deleted(&channel.workspace_id, &channel.id, id, user_id, now);
        }

        Ok(())
    }

    /// Root messages of a channel, oldest first.
    pub async fn list(
        &self,
        channel_id: &str,
        user_id: &str,
        query: ListMessagesQuery,
    ) -> AppResult<Vec<MessageView>> {
        self.access.ensure_channel_access(channel_id, user_id).await?;

        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let cursor = HistoryCursor {
            since: query.since,
            since_id: query.since_id,
            until: query.until,
            until_id: query.until_id,
        };

        let messages = self
            .message_repo
            .list_roots(channel_id, cursor, limit, query.include_deleted)
            .await?;
        self.views.build_many(messages).await
    }

    /// Replies to a thread root, oldest first.
    pub async fn thread(
        &self,
        parent_id: &str,
        user_id: &str,
        include_deleted: bool,
    ) -> AppResult<Vec<MessageView>> {
        let (parent, _) = self.access.ensure_message_access(parent_id, user_id).await?;
        if parent.parent_id.is_some() {
            return Err(AppError::Validation(
                "Message is not a thread root".to_string(),
            ));
        }

        let replies = self
            .message_repo
            .list_replies(parent_id, include_deleted)
            .await?;
        self.views.build_many(replies).await
    }

    /// A single message.
    pub async fn get(&self, message_id: &str, user_id: &str) -> AppResult<MessageView> {
        let (message, _) = self.access.ensure_message_access(message_id, user_id).await?;
        self.views.build(message).await
    }

    async fn check_parent(&self, channel_id: &str, parent_id: &str) -> AppResult<()> {
        let parent = self
            .message_repo
            .find_by_id(parent_id)
            .await?
            .ok_or_else(|| AppError::Validation("Parent message not found".to_string()))?;

        if parent.channel_id != channel_id {
            return Err(AppError::Validation(
                "Parent message belongs to another channel".to_string(),
            ));
        }
        if parent.is_deleted() {
            return Err(AppError::Validation(
                "Parent message has been deleted".to_string(),
            ));
        }
        if parent.parent_id.is_some() {
            return Err(AppError::Validation(
                "Cannot reply to a reply".to_string(),
            ));
        }

        Ok(())
    }

    async fn check_attachments(
        &self,
        channel_id: &str,
        user_id: &str,
        attachment_ids: &[String],
    ) -> AppResult<()> {
        if attachment_ids.is_empty() {
            return Ok(());
        }

        let found = self.attachment_repo.find_by_ids(attachment_ids).await?;
        let now = Utc::now();

        for id in attachment_ids {
            let attachment = found
                .iter()
                .find(|a| a.id == *id)
                .ok_or_else(|| AppError::Validation(format!("Attachment not found: {id}")))?;

            if attachment.uploader_id != user_id || attachment.channel_id != channel_id {
                return Err(AppError::Validation(format!(
                    "Attachment {id} was not uploaded by you to this channel"
                )));
            }
            if attachment.status != AttachmentStatus::Pending {
                return Err(AppError::Validation(format!(
                    "Attachment {id} is already in use"
                )));
            }
            if attachment.expires_at.is_none_or(|at| utc(at) <= now) {
                return Err(AppError::Validation(format!("Attachment {id} has expired")));
            }
        }

        Ok(())
    }

    /// Fetch link cards in the background and announce them once stored.
    /// An edit always refreshes, so links the new body dropped are cleared.
    fn spawn_link_enrichment(&self, workspace_id: &str, message_id: &str, body: &str, edited: bool) {
        let urls = extract_urls(body);
        if urls.is_empty() && !edited {
            return;
        }

        let links = self.links.clone();
        let views = self.views.clone();
        let message_repo = self.message_repo.clone();
        let dispatcher = self.dispatcher.clone();
        let workspace_id = workspace_id.to_string();
        let message_id = message_id.to_string();

        tokio::spawn(async move {
            if !links.refresh(&message_id, &urls).await {
                return;
            }

            let message = match message_repo.find_by_id(&message_id).await {
                Ok(Some(message)) if !message.is_deleted() => message,
                Ok(_) => return,
                Err(e) => {
                    debug!(message_id = %message_id, error = %e, "Skipping link update");
                    return;
                }
            };

            match views.build(message).await {
                Ok(view) => dispatcher.message_updated(&workspace_id, &view),
                Err(e) => debug!(message_id = %message_id, error = %e, "Skipping link update"),
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::attachment::CreateUploadInput;
    use crate::services::dispatcher::testing::Delivery;
    use crate::services::fixture::Fixture;
    use async_trait::async_trait;
    use chrono::Duration;
    use huddle_common::{OgpFetcher, UrlPreview};
    use huddle_db::entities::{Message, MessageUserMention};
    use huddle_db::repositories::{LinkRepository, MentionRepository};
    use sea_orm::{EntityTrait, PaginatorTrait};
    use std::sync::Arc;

    /// Serves previews, slowly for hosts named `old`.
    struct SlowFetcher;

    #[async_trait]
    impl OgpFetcher for SlowFetcher {
        async fn fetch(&self, url: &str) -> AppResult<UrlPreview> {
            if url.contains("old") {
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            }
            Ok(UrlPreview {
                url: url.to_string(),
                title: Some("Preview".to_string()),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_create_dispatches_new_message() {
        let fx = Fixture::new().await;

        let view = fx.post("general", "bob", "  hello  ").await;
        assert_eq!(view.body, "hello");
        assert_eq!(view.user.as_ref().unwrap().display_name, "Bob");
        assert!(view.reactions.is_empty());

        let deliveries = fx.fanout.take();
        assert_eq!(deliveries.len(), 1);
        match &deliveries[0] {
            Delivery::Channel {
                workspace_id,
                channel_id,
                exclude_user,
                event,
            } => {
                assert_eq!(workspace_id, "ws1");
                assert_eq!(channel_id, "general");
                assert!(exclude_user.is_none());
                assert_eq!(event["type"], "new_message");
                assert_eq!(event["payload"]["channel_id"], "general");
                assert_eq!(event["payload"]["message"]["body"], "hello");
            }
            other => panic!("unexpected delivery: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_private_channel_forbidden() {
        let fx = Fixture::new().await;

        let result = fx
            .messages
            .create(
                "secret",
                "bob",
                CreateMessageInput {
                    body: "let me in".to_string(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let result = fx
            .messages
            .list("secret", "bob", ListMessagesQuery::default())
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        fx.post("secret", "owner", "for my eyes only").await;
        let result = fx
            .messages
            .list("secret", "mallory", ListMessagesQuery::default())
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_mentions_resolved() {
        let fx = Fixture::new().await;
        fx.db
            .create_group("g1", "ws1", "devs", &["bob"])
            .await
            .unwrap();

        let view = fx.post("general", "bob", "Hi @alice and @devs").await;
        let mentioned: Vec<_> = view.mentions.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(mentioned, vec!["alice"]);
        let groups: Vec<_> = view.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(groups, vec!["devs"]);

        let repo = MentionRepository::new(fx.db.conn.clone());
        let ids = vec![view.id.clone()];
        assert_eq!(repo.find_user_mentions(&ids).await.unwrap().len(), 1);
        assert_eq!(repo.find_group_mentions(&ids).await.unwrap().len(), 1);

        let typo = fx.post("general", "bob", "Hi @bogus").await;
        let ids = vec![typo.id.clone()];
        assert!(repo.find_user_mentions(&ids).await.unwrap().is_empty());
        assert!(repo.find_group_mentions(&ids).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outsider_not_mentioned() {
        let fx = Fixture::new().await;

        let view = fx.post("general", "bob", "ping @mallory").await;
        assert!(view.mentions.is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_thread() {
        let fx = Fixture::new().await;
        let root = fx.post("general", "alice", "root").await;
        fx.reply("general", "bob", &root.id, "first").await;
        fx.reply("general", "bob", &root.id, "second").await;
        fx.fanout.take();

        fx.messages.delete(&root.id, "alice").await.unwrap();

        let deleted: Vec<_> = fx
            .fanout
            .take()
            .into_iter()
            .filter(|d| d.event_type() == "message_deleted")
            .collect();
        assert_eq!(deleted.len(), 3);

        let visible = fx
            .messages
            .list("general", "bob", ListMessagesQuery::default())
            .await
            .unwrap();
        assert!(visible.is_empty());
        assert!(fx.messages.thread(&root.id, "bob", false).await.unwrap().is_empty());

        let all = fx
            .messages
            .list(
                "general",
                "bob",
                ListMessagesQuery {
                    include_deleted: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, root.id);
        assert!(all[0].deleted_at.is_some());
        assert_eq!(all[0].deleted_by.as_deref(), Some("alice"));
        assert_eq!(all[0].body, "");

        let replies = fx.messages.thread(&root.id, "bob", true).await.unwrap();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| r.deleted_at.is_some()));
    }

    #[tokio::test]
    async fn test_delete_permissions() {
        let fx = Fixture::new().await;
        let message = fx.post("general", "alice", "mine").await;

        let result = fx.messages.delete(&message.id, "bob").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        fx.messages.delete(&message.id, "owner").await.unwrap();

        let result = fx.messages.delete(&message.id, "owner").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_orders_oldest_first() {
        let fx = Fixture::new().await;
        let base = Utc::now() - Duration::hours(1);
        fx.db
            .create_message_at("m3", "general", "alice", None, "third", base + Duration::minutes(3))
            .await
            .unwrap();
        fx.db
            .create_message_at("m1", "general", "alice", None, "first", base + Duration::minutes(1))
            .await
            .unwrap();
        fx.db
            .create_message_at("m2", "general", "bob", None, "second", base + Duration::minutes(2))
            .await
            .unwrap();

        let page = fx
            .messages
            .list("general", "alice", ListMessagesQuery::default())
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);

        let newest = fx
            .messages
            .list(
                "general",
                "alice",
                ListMessagesQuery {
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ids: Vec<_> = newest.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);

        let after = fx
            .messages
            .list(
                "general",
                "alice",
                ListMessagesQuery {
                    since: Some(base + Duration::minutes(1)),
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(after[0].id, "m2");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = Fixture::new().await;

        let result = fx
            .messages
            .create(
                "general",
                "alice",
                CreateMessageInput {
                    body: "   ".to_string(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let other = fx.post("secret", "owner", "elsewhere").await;
        let result = fx
            .messages
            .create(
                "general",
                "owner",
                CreateMessageInput {
                    body: "reply".to_string(),
                    parent_id: Some(other.id),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let root = fx.post("general", "alice", "root").await;
        let reply = fx.reply("general", "bob", &root.id, "reply").await;
        let result = fx
            .messages
            .create(
                "general",
                "alice",
                CreateMessageInput {
                    body: "nested".to_string(),
                    parent_id: Some(reply.id),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_edit_rules_and_mentions() {
        let fx = Fixture::new().await;
        let message = fx.post("general", "bob", "hello @alice").await;
        assert_eq!(message.mentions.len(), 1);

        let result = fx
            .messages
            .edit(
                &message.id,
                "alice",
                EditMessageInput {
                    body: "hijack".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        fx.fanout.take();
        let edited = fx
            .messages
            .edit(
                &message.id,
                "bob",
                EditMessageInput {
                    body: "hello @owner".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.body, "hello @owner");
        assert!(edited.edited_at.is_some());
        let mentioned: Vec<_> = edited.mentions.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(mentioned, vec!["owner"]);
        assert_eq!(fx.fanout.take()[0].event_type(), "message_updated");

        fx.messages.delete(&message.id, "bob").await.unwrap();
        let result = fx
            .messages
            .edit(
                &message.id,
                "bob",
                EditMessageInput {
                    body: "too late".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_attachments_bound_once() {
        let fx = Fixture::new().await;
        let ticket = fx
            .attachments
            .create_upload(
                "general",
                "alice",
                CreateUploadInput {
                    file_name: "report.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                    size_bytes: 2048,
                },
            )
            .await
            .unwrap();

        let result = fx
            .messages
            .create(
                "general",
                "bob",
                CreateMessageInput {
                    attachment_ids: vec![ticket.attachment.id.clone()],
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let view = fx
            .messages
            .create(
                "general",
                "alice",
                CreateMessageInput {
                    attachment_ids: vec![ticket.attachment.id.clone()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.body, "");
        assert_eq!(view.attachments.len(), 1);
        assert_eq!(view.attachments[0].file_name, "report.pdf");

        let result = fx
            .messages
            .create(
                "general",
                "alice",
                CreateMessageInput {
                    body: "again".to_string(),
                    attachment_ids: vec![ticket.attachment.id.clone()],
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_message_checks_access() {
        let fx = Fixture::new().await;
        let secret = fx.post("secret", "owner", "classified").await;

        let view = fx.messages.get(&secret.id, "owner").await.unwrap();
        assert_eq!(view.body, "classified");

        let result = fx.messages.get(&secret.id, "alice").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_late_preview_does_not_overwrite_edit() {
        let fx = Fixture::with_fetcher(Arc::new(SlowFetcher)).await;
        let message = fx.post("general", "alice", "see https://old.test/").await;
        fx.messages
            .edit(
                &message.id,
                "alice",
                EditMessageInput {
                    body: "now https://new.test/".to_string(),
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(800)).await;

        let links = LinkRepository::new(fx.db.conn.clone())
            .find_by_message_ids(&[message.id.clone()])
            .await
            .unwrap();
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://new.test/"]);

        let view = fx.messages.get(&message.id, "alice").await.unwrap();
        assert_eq!(view.links.len(), 1);
        assert_eq!(view.links[0].title.as_deref(), Some("Preview"));
    }

    #[tokio::test]
    async fn test_failed_bind_rolls_back_message_and_mentions() {
        let fx = Fixture::new().await;
        let ticket = fx
            .attachments
            .create_upload(
                "general",
                "alice",
                CreateUploadInput {
                    file_name: "notes.txt".to_string(),
                    mime_type: "text/plain".to_string(),
                    size_bytes: 16,
                },
            )
            .await
            .unwrap();

        let tx = TransactionManager::new(fx.db.conn.clone());
        let resolver = MentionResolver::new();
        let attachment_ids = vec![ticket.attachment.id.clone(), "gone".to_string()];
        let now = Utc::now();
        let model = message::ActiveModel {
            id: Set("m1".to_string()),
            channel_id: Set("general".to_string()),
            user_id: Set("alice".to_string()),
            parent_id: Set(None),
            body: Set("hi @bob".to_string()),
            created_at: Set(now.into()),
            edited_at: Set(None),
            deleted_at: Set(None),
            deleted_by: Set(None),
        };

        let result = tx
            .run(move |txn| {
                Box::pin(async move {
                    MessageService::insert_in(txn, &resolver, "ws1", model, &attachment_ids, now)
                        .await
                })
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let conn = fx.db.conn.as_ref();
        assert_eq!(Message::find().count(conn).await.unwrap(), 0);
        assert_eq!(MessageUserMention::find().count(conn).await.unwrap(), 0);

        let attachment = AttachmentRepository::new(fx.db.conn.clone())
            .find_by_ids(&[ticket.attachment.id.clone()])
            .await
            .unwrap()
            .remove(0);
        assert_eq!(attachment.status, AttachmentStatus::Pending);
        assert!(attachment.message_id.is_none());
    }

    #[tokio::test]
    async fn test_committed_message_announced_when_view_lookup_fails() {
        let fx = Fixture::new().await;
        fx.db
            .conn
            .execute_unprepared("DROP TABLE message_link")
            .await
            .unwrap();

        let view = fx.post("general", "bob", "still here").await;
        assert_eq!(view.body, "still here");
        assert!(view.user.is_none());
        assert!(view.links.is_empty());

        let deliveries = fx.fanout.take();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].event_type(), "new_message");

        let stored = fx.messages.message_repo.find_by_id(&view.id).await.unwrap();
        assert!(stored.is_some());
    }
}
