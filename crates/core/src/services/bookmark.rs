//! Bookmarks.

use std::collections::HashSet;

use huddle_common::{AppError, AppResult};
use huddle_db::repositories::{BookmarkRepository, ChannelRepository, MessageRepository};

use super::access::AccessService;
use super::message::MAX_PAGE_SIZE;
use super::views::{BookmarkView, MessageViewBuilder, utc};

/// Bookmark service.
#[derive(Clone)]
pub struct BookmarkService {
    bookmark_repo: BookmarkRepository,
    message_repo: MessageRepository,
    channel_repo: ChannelRepository,
    access: AccessService,
    views: MessageViewBuilder,
}

impl BookmarkService {
    /// Create a new bookmark service.
    #[must_use]
    pub const fn new(
        bookmark_repo: BookmarkRepository,
        message_repo: MessageRepository,
        channel_repo: ChannelRepository,
        access: AccessService,
        views: MessageViewBuilder,
    ) -> Self {
        Self {
            bookmark_repo,
            message_repo,
            channel_repo,
            access,
            views,
        }
    }

    /// Bookmark a message. Bookmarking twice is a no-op.
    pub async fn add(&self, message_id: &str, user_id: &str) -> AppResult<()> {
        let (message, _) = self.access.ensure_message_access(message_id, user_id).await?;
        if message.is_deleted() {
            return Err(AppError::NotFound(format!("Message not found: {message_id}")));
        }

        self.bookmark_repo.add(user_id, message_id).await?;
        Ok(())
    }

    /// Remove a bookmark. Removing an absent bookmark is a no-op.
    pub async fn remove(&self, message_id: &str, user_id: &str) -> AppResult<()> {
        self.bookmark_repo.remove(user_id, message_id).await?;
        Ok(())
    }

    /// The user's bookmarks, newest first. Messages in channels the user can
    /// no longer see are left out.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<BookmarkView>> {
        let bookmarks = self.bookmark_repo.find_by_user(user_id, MAX_PAGE_SIZE).await?;
        if bookmarks.is_empty() {
            return Ok(vec![]);
        }

        let accessible: HashSet<String> = self
            .channel_repo
            .find_accessible_ids(user_id)
            .await?
            .into_iter()
            .collect();

        let message_ids: Vec<String> = bookmarks.iter().map(|b| b.message_id.clone()).collect();
        let messages = self
            .message_repo
            .find_by_ids(&message_ids)
            .await?
            .into_iter()
            .filter(|m| accessible.contains(&m.channel_id))
            .collect();
        let mut views = self.views.build_many(messages).await?;

        Ok(bookmarks
            .into_iter()
            .filter_map(|bookmark| {
                let index = views.iter().position(|v| v.id == bookmark.message_id)?;
                Some(BookmarkView {
                    message_id: bookmark.message_id,
                    created_at: utc(bookmark.created_at),
                    message: views.swap_remove(index),
                })
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::fixture::Fixture;
    use huddle_db::entities::channel_member::ChannelRole;

    #[tokio::test]
    async fn test_add_list_remove() {
        let fx = Fixture::new().await;
        let first = fx.post("general", "alice", "first").await;
        let second = fx.post("general", "bob", "second").await;

        fx.bookmarks.add(&first.id, "alice").await.unwrap();
        fx.bookmarks.add(&second.id, "alice").await.unwrap();
        fx.bookmarks.add(&second.id, "alice").await.unwrap();

        let listed = fx.bookmarks.list("alice").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].message_id, second.id);
        assert_eq!(listed[1].message.body, "first");

        fx.bookmarks.remove(&second.id, "alice").await.unwrap();
        fx.bookmarks.remove(&second.id, "alice").await.unwrap();
        assert_eq!(fx.bookmarks.list("alice").await.unwrap().len(), 1);
        assert!(fx.bookmarks.list("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inaccessible_bookmarks_hidden() {
        let fx = Fixture::new().await;
        fx.db
            .add_channel_member("secret", "alice", ChannelRole::Member)
            .await
            .unwrap();
        let message = fx.post("secret", "owner", "confidential").await;

        fx.bookmarks.add(&message.id, "alice").await.unwrap();
        assert_eq!(fx.bookmarks.list("alice").await.unwrap().len(), 1);

        let result = fx.bookmarks.add(&message.id, "bob").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
