//! Channel read-state repository.
//!
//! Read marks only move forward: [`ReadStateRepository::advance_in`] inserts
//! the first mark and afterwards updates only when the new value is later.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QuerySelect, Set,
    prelude::DateTimeWithTimeZone,
    sea_query::{Alias, Expr, Func, JoinType, OnConflict, Query},
};

use super::channel::accessible_condition;
use crate::entities::{
    Channel, ChannelReadState, Message, MessageGroupMention, MessageUserMention, UserGroupMember,
    channel, channel_read_state, message, message_group_mention, message_user_mention,
    user_group_member,
};

/// Unread totals for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadSummaryRow {
    pub channel_id: String,
    pub unread_count: u64,
    /// Unread messages that mention the user directly or through a group.
    pub mention_count: u64,
}

/// Repository for read marks and unread counts.
#[derive(Clone)]
pub struct ReadStateRepository {
    db: Arc<DatabaseConnection>,
}

impl ReadStateRepository {
    /// Create a new read-state repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the read mark of a user in a channel.
    pub async fn find(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> AppResult<Option<channel_read_state::Model>> {
        Self::find_in(self.db.as_ref(), channel_id, user_id).await
    }

    /// Find the read mark on the given connection.
    pub async fn find_in<C: ConnectionTrait>(
        conn: &C,
        channel_id: &str,
        user_id: &str,
    ) -> AppResult<Option<channel_read_state::Model>> {
        ChannelReadState::find_by_id((channel_id.to_string(), user_id.to_string()))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Move the read mark forward to `last_read_at`.
    ///
    /// Returns `true` if the stored value changed. An older or equal value
    /// leaves the row untouched.
    pub async fn advance_in<C: ConnectionTrait>(
        conn: &C,
        channel_id: &str,
        user_id: &str,
        last_read_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let last_read_at: DateTimeWithTimeZone = last_read_at.into();

        let inserted = ChannelReadState::insert(channel_read_state::ActiveModel {
            channel_id: Set(channel_id.to_string()),
            user_id: Set(user_id.to_string()),
            last_read_at: Set(last_read_at),
        })
        .on_conflict(
            OnConflict::columns([
                channel_read_state::Column::ChannelId,
                channel_read_state::Column::UserId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if inserted > 0 {
            return Ok(true);
        }

        let updated = ChannelReadState::update_many()
            .col_expr(
                channel_read_state::Column::LastReadAt,
                Expr::value(last_read_at),
            )
            .filter(channel_read_state::Column::ChannelId.eq(channel_id))
            .filter(channel_read_state::Column::UserId.eq(user_id))
            .filter(channel_read_state::Column::LastReadAt.lt(last_read_at))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated.rows_affected > 0)
    }

    /// Count live messages in a channel created after `after`, or all of
    /// them when there is no read mark.
    pub async fn count_unread(
        &self,
        channel_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let mut query = Message::find()
            .filter(message::Column::ChannelId.eq(channel_id))
            .filter(message::Column::DeletedAt.is_null());

        if let Some(after) = after {
            query = query.filter(message::Column::CreatedAt.gt(after));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether any unread live message mentions the user, directly or
    /// through one of their groups.
    pub async fn has_unread_mention(
        &self,
        channel_id: &str,
        user_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        let mut query = Message::find()
            .select_only()
            .column(message::Column::Id)
            .filter(message::Column::ChannelId.eq(channel_id))
            .filter(message::Column::DeletedAt.is_null())
            .filter(mention_condition(user_id));

        if let Some(after) = after {
            query = query.filter(message::Column::CreatedAt.gt(after));
        }

        let hit = query
            .limit(1)
            .into_tuple::<String>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(hit.is_some())
    }

    /// Unread and mention totals for every channel the user can access,
    /// computed in a single grouped query.
    pub async fn unread_summary(&self, user_id: &str) -> AppResult<Vec<UnreadSummaryRow>> {
        let read_join = Condition::all()
            .add(
                Expr::col((ChannelReadState, channel_read_state::Column::ChannelId))
                    .equals((Channel, channel::Column::Id)),
            )
            .add(Expr::col((ChannelReadState, channel_read_state::Column::UserId)).eq(user_id));

        let message_join = Condition::all()
            .add(
                Expr::col((Message, message::Column::ChannelId))
                    .equals((Channel, channel::Column::Id)),
            )
            .add(Expr::col((Message, message::Column::DeletedAt)).is_null())
            .add(
                Condition::any()
                    .add(Expr::col((ChannelReadState, channel_read_state::Column::LastReadAt)).is_null())
                    .add(
                        Expr::col((Message, message::Column::CreatedAt)).gt(Expr::col((
                            ChannelReadState,
                            channel_read_state::Column::LastReadAt,
                        ))),
                    ),
            );

        let query = Query::select()
            .expr_as(
                Expr::col((Channel, channel::Column::Id)),
                Alias::new("channel_id"),
            )
            .expr_as(
                Func::count(Expr::col((Message, message::Column::Id))),
                Alias::new("unread_count"),
            )
            .expr_as(
                Func::sum(Expr::case(mention_condition(user_id), 1).finally(0)),
                Alias::new("mention_count"),
            )
            .from(Channel)
            .join(JoinType::LeftJoin, ChannelReadState, read_join)
            .join(JoinType::LeftJoin, Message, message_join)
            .cond_where(accessible_condition(user_id))
            .group_by_col((Channel, channel::Column::Id))
            .to_owned();

        let backend = self.db.get_database_backend();
        let rows = self
            .db
            .query_all(backend.build(&query))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let unread: i64 = row.try_get("", "unread_count")?;
                let mentions: Option<i64> = row.try_get("", "mention_count")?;
                Ok(UnreadSummaryRow {
                    channel_id: row.try_get("", "channel_id")?,
                    unread_count: unread.max(0) as u64,
                    mention_count: mentions.unwrap_or(0).max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>, sea_orm::DbErr>>()
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Matches messages that mention `user_id` directly or via a group they
/// belong to.
fn mention_condition(user_id: &str) -> Condition {
    let direct = Query::select()
        .column(message_user_mention::Column::MessageId)
        .from(MessageUserMention)
        .and_where(message_user_mention::Column::UserId.eq(user_id))
        .to_owned();

    let groups = Query::select()
        .column(user_group_member::Column::GroupId)
        .from(UserGroupMember)
        .and_where(user_group_member::Column::UserId.eq(user_id))
        .to_owned();

    let via_group = Query::select()
        .column(message_group_mention::Column::MessageId)
        .from(MessageGroupMention)
        .and_where(message_group_mention::Column::GroupId.in_subquery(groups))
        .to_owned();

    Condition::any()
        .add(message::Column::Id.in_subquery(direct))
        .add(message::Column::Id.in_subquery(via_group))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::repositories::MentionRepository;
    use crate::test_utils::TestDatabase;
    use chrono::Duration;

    async fn seeded() -> TestDatabase {
        let db = TestDatabase::new().await.unwrap();
        db.create_user("u1", "Alice").await.unwrap();
        db.create_user("u2", "Bob").await.unwrap();
        db.create_workspace("ws1", "u1").await.unwrap();
        db.add_workspace_member(
            "ws1",
            "u2",
            crate::entities::workspace_member::WorkspaceRole::Member,
        )
        .await
        .unwrap();
        db.create_channel("c1", "ws1", "u1", false).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_advance_is_monotonic() {
        let db = seeded().await;
        let t1 = Utc::now() - Duration::minutes(5);
        let t2 = Utc::now() - Duration::minutes(1);

        assert!(
            ReadStateRepository::advance_in(db.connection(), "c1", "u1", t2)
                .await
                .unwrap()
        );
        assert!(
            !ReadStateRepository::advance_in(db.connection(), "c1", "u1", t1)
                .await
                .unwrap()
        );
        assert!(
            !ReadStateRepository::advance_in(db.connection(), "c1", "u1", t2)
                .await
                .unwrap()
        );

        let repo = ReadStateRepository::new(db.conn.clone());
        let state = repo.find("c1", "u1").await.unwrap().unwrap();
        assert_eq!(state.last_read_at.timestamp_micros(), t2.timestamp_micros());
    }

    #[tokio::test]
    async fn test_unread_summary_counts_and_mentions() {
        let db = seeded().await;
        let base = Utc::now() - Duration::minutes(10);
        db.create_message_at("m1", "c1", "u1", None, "old", base)
            .await
            .unwrap();
        db.create_message_at("m2", "c1", "u1", None, "hi @bob", base + Duration::minutes(2))
            .await
            .unwrap();
        db.create_message_at("m3", "c1", "u1", None, "new", base + Duration::minutes(3))
            .await
            .unwrap();
        MentionRepository::insert_user_mentions_in(db.connection(), "m2", &["u2".to_string()])
            .await
            .unwrap();
        ReadStateRepository::advance_in(db.connection(), "c1", "u2", base + Duration::minutes(1))
            .await
            .unwrap();

        let repo = ReadStateRepository::new(db.conn.clone());
        let summary = repo.unread_summary("u2").await.unwrap();
        assert_eq!(
            summary,
            vec![UnreadSummaryRow {
                channel_id: "c1".to_string(),
                unread_count: 2,
                mention_count: 1,
            }]
        );

        assert_eq!(
            repo.count_unread("c1", Some(base + Duration::minutes(1)))
                .await
                .unwrap(),
            2
        );
        assert_eq!(repo.count_unread("c1", None).await.unwrap(), 3);
        assert!(
            repo.has_unread_mention("c1", "u2", Some(base + Duration::minutes(1)))
                .await
                .unwrap()
        );
        assert!(
            !repo
                .has_unread_mention("c1", "u2", Some(base + Duration::minutes(2)))
                .await
                .unwrap()
        );
    }
}
