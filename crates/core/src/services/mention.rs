//! `@mention` resolution.
//!
//! Each `@token` in a message body resolves, in order, to a user group of
//! the workspace with exactly that name, or to a workspace member whose
//! display name matches it case-insensitively. An exact display-name match
//! wins; otherwise the token must be a prefix of exactly one member's
//! display name. Unknown and ambiguous tokens are dropped.

use std::collections::HashSet;
use std::sync::LazyLock;

use huddle_common::AppResult;
use huddle_db::entities::{user, user_group};
use huddle_db::repositories::{UserGroupRepository, WorkspaceRepository};
use regex::Regex;
use sea_orm::ConnectionTrait;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_-]+)").expect("valid mention regex"));

/// Mentions found in a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMentions {
    pub user_ids: Vec<String>,
    pub group_ids: Vec<String>,
}

impl ResolvedMentions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty() && self.group_ids.is_empty()
    }
}

/// Distinct mention tokens in order of first appearance.
#[must_use]
pub fn extract_mention_tokens(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MENTION_RE
        .captures_iter(body)
        .map(|cap| cap[1].to_string())
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Match tokens against the workspace's groups and members.
#[must_use]
pub fn match_mentions(
    tokens: &[String],
    groups: &[user_group::Model],
    members: &[user::Model],
) -> ResolvedMentions {
    let mut resolved = ResolvedMentions::default();
    let mut seen_users = HashSet::new();
    let mut seen_groups = HashSet::new();

    let names: Vec<(String, &str)> = members
        .iter()
        .map(|m| (m.display_name.to_lowercase(), m.id.as_str()))
        .collect();

    for token in tokens {
        if let Some(group) = groups.iter().find(|g| g.name == *token) {
            if seen_groups.insert(group.id.clone()) {
                resolved.group_ids.push(group.id.clone());
            }
            continue;
        }

        let needle = token.to_lowercase();
        let user_id = names
            .iter()
            .find(|(name, _)| *name == needle)
            .map(|(_, id)| *id)
            .or_else(|| {
                let mut prefixed = names.iter().filter(|(name, _)| name.starts_with(&needle));
                match (prefixed.next(), prefixed.next()) {
                    (Some((_, id)), None) => Some(*id),
                    _ => None,
                }
            });

        if let Some(user_id) = user_id
            && seen_users.insert(user_id.to_string())
        {
            resolved.user_ids.push(user_id.to_string());
        }
    }

    resolved
}

/// Resolves mentions against the database.
#[derive(Clone, Default)]
pub struct MentionResolver;

impl MentionResolver {
    /// Create a new resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolve the mentions in `body` for a message in `workspace_id`.
    ///
    /// Runs on `conn` so it can share the message's transaction. Groups
    /// and members are each loaded in a single query.
    pub async fn resolve_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        workspace_id: &str,
        body: &str,
    ) -> AppResult<ResolvedMentions> {
        let tokens = extract_mention_tokens(body);
        if tokens.is_empty() {
            return Ok(ResolvedMentions::default());
        }

        let groups = UserGroupRepository::find_by_names_in(conn, workspace_id, &tokens).await?;

        let members: Vec<user::Model> =
            if tokens.iter().all(|t| groups.iter().any(|g| g.name == *t)) {
                vec![]
            } else {
                WorkspaceRepository::find_members_with_users_in(conn, workspace_id)
                    .await?
                    .into_iter()
                    .map(|(_, user)| user)
                    .collect()
            };

        Ok(match_mentions(&tokens, &groups, &members))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use huddle_db::test_utils::TestDatabase;

    fn member(id: &str, display_name: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            display_name: display_name.to_string(),
            password_hash: String::new(),
            avatar_url: None,
            bio: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn group(id: &str, name: &str) -> user_group::Model {
        user_group::Model {
            id: id.to_string(),
            workspace_id: "ws1".to_string(),
            name: name.to_string(),
            created_by: "u1".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn tokens(body: &str) -> Vec<String> {
        extract_mention_tokens(body)
    }

    #[test]
    fn test_extract_tokens_dedups() {
        assert_eq!(
            tokens("@alice hi @bob, @alice again and mail@host"),
            vec!["alice", "bob", "host"]
        );
        assert!(tokens("no mentions here").is_empty());
    }

    #[test]
    fn test_group_wins_over_user() {
        let members = [member("u1", "devs person")];
        let groups = [group("g1", "devs")];

        let resolved = match_mentions(&tokens("@devs"), &groups, &members);
        assert_eq!(resolved.group_ids, vec!["g1"]);
        assert!(resolved.user_ids.is_empty());
    }

    #[test]
    fn test_prefix_match_case_insensitive() {
        let members = [member("u1", "Alice Johnson"), member("u2", "Bob")];

        let resolved = match_mentions(&tokens("Hi @alice and @BOB"), &[], &members);
        assert_eq!(resolved.user_ids, vec!["u1", "u2"]);
    }

    #[test]
    fn test_exact_match_beats_prefix() {
        let members = [member("u1", "Al"), member("u2", "Alice")];

        let resolved = match_mentions(&tokens("@al"), &[], &members);
        assert_eq!(resolved.user_ids, vec!["u1"]);
    }

    #[test]
    fn test_ambiguous_prefix_dropped() {
        let members = [member("u1", "Alice"), member("u2", "Alicia")];

        let resolved = match_mentions(&tokens("@ali"), &[], &members);
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_same_user_mentioned_twice() {
        let members = [member("u1", "Alice Johnson")];

        let resolved = match_mentions(&tokens("@alice @Alice"), &[], &members);
        assert_eq!(resolved.user_ids, vec!["u1"]);
    }

    #[tokio::test]
    async fn test_resolve_against_workspace() {
        let db = TestDatabase::new().await.unwrap();
        db.create_user("u1", "Owner").await.unwrap();
        db.create_user("alice", "Alice Johnson").await.unwrap();
        db.create_user("stranger", "Alina").await.unwrap();
        db.create_workspace("ws1", "u1").await.unwrap();
        db.add_workspace_member(
            "ws1",
            "alice",
            huddle_db::entities::workspace_member::WorkspaceRole::Member,
        )
        .await
        .unwrap();
        db.create_group("g1", "ws1", "devs", &["u1"]).await.unwrap();

        let resolved = MentionResolver::new()
            .resolve_in(db.connection(), "ws1", "Hi @alice and @devs, not @bogus")
            .await
            .unwrap();

        assert_eq!(resolved.user_ids, vec!["alice"]);
        assert_eq!(resolved.group_ids, vec!["g1"]);
    }
}
