//! URL extraction and link cards.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use huddle_common::{IdGenerator, OgpFetcher, UrlPreview};
use huddle_db::TransactionManager;
use huddle_db::entities::message_link;
use huddle_db::repositories::{LinkRepository, MessageRepository};
use regex::Regex;
use sea_orm::Set;
use tracing::{debug, warn};

/// Upper bound on a single preview fetch, on top of the fetcher's own limits.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Links beyond this many per message are ignored.
const MAX_LINKS_PER_MESSAGE: usize = 10;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("valid URL regex")
});

/// Distinct http(s) URLs in `body`, in order of first appearance.
#[must_use]
pub fn extract_urls(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    URL_RE
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .filter(|url| seen.insert(url.clone()))
        .take(MAX_LINKS_PER_MESSAGE)
        .collect()
}

/// Fetches link previews and stores them for a message.
///
/// Every step is best-effort: a failed fetch stores a bare link and a
/// failed write is logged and skipped.
#[derive(Clone)]
pub struct LinkEnricher {
    tx: TransactionManager,
    fetcher: Arc<dyn OgpFetcher>,
    id_gen: IdGenerator,
}

impl LinkEnricher {
    /// Create a new link enricher.
    #[must_use]
    pub fn new(tx: TransactionManager, fetcher: Arc<dyn OgpFetcher>) -> Self {
        Self {
            tx,
            fetcher,
            id_gen: IdGenerator::new(),
        }
    }

    async fn preview(&self, url: &str) -> UrlPreview {
        match tokio::time::timeout(FETCH_TIMEOUT, self.fetcher.fetch(url)).await {
            Ok(Ok(preview)) => preview,
            Ok(Err(e)) => {
                debug!(url = %url, error = %e, "Link preview failed, storing bare link");
                UrlPreview {
                    url: url.to_string(),
                    ..Default::default()
                }
            }
            Err(_) => {
                debug!(url = %url, "Link preview timed out, storing bare link");
                UrlPreview {
                    url: url.to_string(),
                    ..Default::default()
                }
            }
        }
    }

    /// Fetch previews for `urls` and make them the message's only links.
    ///
    /// Fetches run concurrently and outside any transaction. The write is
    /// skipped when the message is gone, deleted, or its body no longer
    /// links exactly `urls`: a later edit owns the links then.
    /// Returns whether the stored links changed.
    pub async fn refresh(&self, message_id: &str, urls: &[String]) -> bool {
        let previews = join_all(urls.iter().map(|url| self.preview(url))).await;

        let now = Utc::now();
        let models: Vec<message_link::ActiveModel> = urls
            .iter()
            .zip(previews)
            .map(|(url, preview)| message_link::ActiveModel {
                id: Set(self.id_gen.generate()),
                message_id: Set(message_id.to_string()),
                // The stored URL is the one the author wrote, not the
                // normalized form the fetcher reports.
                url: Set(url.clone()),
                title: Set(preview.title),
                description: Set(preview.description),
                image_url: Set(preview.image),
                site_name: Set(preview.site_name),
                card_type: Set(preview.card_type),
                created_at: Set(now.into()),
            })
            .collect();

        let id = message_id.to_string();
        let expected = urls.to_vec();
        let result = self
            .tx
            .run(move |txn| {
                Box::pin(async move {
                    let current = MessageRepository::find_for_update_in(txn, &id).await?;
                    let fresh = current
                        .is_some_and(|m| !m.is_deleted() && extract_urls(&m.body) == expected);
                    if !fresh {
                        return Ok(None);
                    }

                    let removed = LinkRepository::delete_by_message_in(txn, &id).await?;
                    for model in models {
                        LinkRepository::insert_in(txn, model).await?;
                    }
                    Ok(Some(removed > 0 || !expected.is_empty()))
                })
            })
            .await;

        match result {
            Ok(Some(changed)) => changed,
            Ok(None) => {
                debug!(message_id = %message_id, "Message changed before its links were stored");
                false
            }
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "Failed to store links");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use huddle_common::{AppError, AppResult};
    use huddle_db::test_utils::TestDatabase;

    #[test]
    fn test_extract_urls() {
        let body = "see https://example.com/a?b=1 and <http://foo.test/x> again https://example.com/a?b=1";
        assert_eq!(
            extract_urls(body),
            vec!["https://example.com/a?b=1", "http://foo.test/x"]
        );
        assert!(extract_urls("ftp://example.com nothing").is_empty());
    }

    struct FakeFetcher;

    #[async_trait]
    impl OgpFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> AppResult<UrlPreview> {
            if url.contains("broken") {
                return Err(AppError::ExternalService("boom".to_string()));
            }
            Ok(UrlPreview {
                url: url.to_string(),
                title: Some("Example".to_string()),
                ..Default::default()
            })
        }
    }

    async fn seeded(body: &str) -> TestDatabase {
        let db = TestDatabase::new().await.unwrap();
        db.create_user("u1", "Alice").await.unwrap();
        db.create_workspace("ws1", "u1").await.unwrap();
        db.create_channel("c1", "ws1", "u1", false).await.unwrap();
        db.create_message_at("m1", "c1", "u1", None, body, Utc::now())
            .await
            .unwrap();
        db
    }

    fn enricher(db: &TestDatabase) -> LinkEnricher {
        LinkEnricher::new(TransactionManager::new(db.conn.clone()), Arc::new(FakeFetcher))
    }

    async fn stored_links(db: &TestDatabase) -> Vec<message_link::Model> {
        let mut links = LinkRepository::new(db.conn.clone())
            .find_by_message_ids(&["m1".to_string()])
            .await
            .unwrap();
        links.sort_by(|a, b| a.url.cmp(&b.url));
        links
    }

    #[tokio::test]
    async fn test_failed_fetch_stores_bare_link() {
        let db = seeded("https://ok.test/ and https://broken.test/").await;
        let urls = vec![
            "https://ok.test/".to_string(),
            "https://broken.test/".to_string(),
        ];

        assert!(enricher(&db).refresh("m1", &urls).await);

        let links = stored_links(&db).await;
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://broken.test/");
        assert!(links[0].title.is_none());
        assert_eq!(links[1].title.as_deref(), Some("Example"));

        // Refreshing again replaces rather than duplicates.
        assert!(enricher(&db).refresh("m1", &urls).await);
        assert_eq!(stored_links(&db).await.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_skips_urls_no_longer_in_body() {
        let db = seeded("now https://new.test/").await;

        let stale = vec!["https://old.test/".to_string()];
        assert!(!enricher(&db).refresh("m1", &stale).await);
        assert!(stored_links(&db).await.is_empty());

        let current = vec!["https://new.test/".to_string()];
        assert!(enricher(&db).refresh("m1", &current).await);
        let links = stored_links(&db).await;
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://new.test/");

        assert!(!enricher(&db).refresh("missing", &current).await);
    }
}
