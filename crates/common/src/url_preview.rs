//! Open Graph link preview fetching.
//!
//! Fetches metadata from URLs to generate link cards. Open Graph (`og:*`)
//! wins over Twitter Card (`twitter:*`), which wins over the plain
//! `<title>` / `meta[name=description]` fallback.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{AppError, AppResult};

/// URL preview metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPreview {
    /// Original URL.
    pub url: String,
    /// Page title.
    pub title: Option<String>,
    /// Page description.
    pub description: Option<String>,
    /// Preview image URL, absolute.
    pub image: Option<String>,
    /// Site name.
    pub site_name: Option<String>,
    /// Card type (`twitter:card`, falling back to `og:type`).
    pub card_type: Option<String>,
}

/// URL preview fetcher configuration.
#[derive(Debug, Clone)]
pub struct UrlPreviewConfig {
    /// User agent string.
    pub user_agent: String,
    /// Total request timeout.
    pub timeout: Duration,
    /// Maximum response size in bytes.
    pub max_size: usize,
}

impl Default for UrlPreviewConfig {
    fn default() -> Self {
        Self {
            user_agent: "Huddle/1.0 (compatible; LinkPreview)".to_string(),
            timeout: Duration::from_secs(10),
            max_size: 1024 * 1024, // 1MB
        }
    }
}

/// Fetches Open Graph metadata for a URL.
///
/// Implementations must be safe to call concurrently. Any error means the
/// caller stores a bare link.
#[async_trait]
pub trait OgpFetcher: Send + Sync {
    /// Fetch preview metadata for `url`.
    async fn fetch(&self, url: &str) -> AppResult<UrlPreview>;
}

/// HTTP-backed [`OgpFetcher`].
#[derive(Clone)]
pub struct HttpOgpFetcher {
    client: Client,
    config: UrlPreviewConfig,
}

impl HttpOgpFetcher {
    /// Create a new fetcher with its own connection pool.
    pub fn new(config: UrlPreviewConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl OgpFetcher for HttpOgpFetcher {
    async fn fetch(&self, url: &str) -> AppResult<UrlPreview> {
        let parsed_url = Url::parse(url)
            .map_err(|e| AppError::Validation(format!("Invalid URL {url}: {e}")))?;

        // Only allow HTTP(S)
        if parsed_url.scheme() != "http" && parsed_url.scheme() != "https" {
            return Err(AppError::Validation(format!(
                "Unsupported URL scheme: {}",
                parsed_url.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed_url.clone())
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(AppError::ExternalService(format!(
                "{url} is not HTML: {content_type}"
            )));
        }

        // Read at most max_size bytes; anything past the limit is ignored.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to read {url}: {e}")))?
        {
            let remaining = self.config.max_size.saturating_sub(body.len());
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                debug!(url = %url, "Response body truncated at size limit");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&body);
        Ok(parse_preview(&html, &parsed_url))
    }
}

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid meta regex"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>([^<]*)</title>").expect("valid title regex"));

/// Collect `meta` tags keyed by lowercased `property` or `name`. First occurrence wins.
fn collect_meta(html: &str) -> HashMap<String, String> {
    let mut meta = HashMap::new();

    for tag in META_TAG_RE.find_iter(html) {
        let mut key = None;
        let mut content = None;

        for cap in ATTR_RE.captures_iter(tag.as_str()) {
            let name = cap[1].to_ascii_lowercase();
            let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
            match name.as_str() {
                "property" | "name" if key.is_none() => key = Some(value.to_ascii_lowercase()),
                "content" => content = Some(value),
                _ => {}
            }
        }

        if let (Some(key), Some(content)) = (key, content) {
            let content = decode_html_entities(content.trim());
            if !content.is_empty() {
                meta.entry(key).or_insert(content);
            }
        }
    }

    meta
}

fn first_of(meta: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| meta.get(*key).cloned())
}

/// Build a preview from a fetched HTML document.
#[must_use]
pub fn parse_preview(html: &str, page_url: &Url) -> UrlPreview {
    let meta = collect_meta(html);

    let title = first_of(&meta, &["og:title", "twitter:title"]).or_else(|| {
        TITLE_RE
            .captures(html)
            .map(|cap| decode_html_entities(cap[1].trim()))
            .filter(|t| !t.is_empty())
    });

    let image = first_of(&meta, &["og:image", "og:image:url", "twitter:image", "twitter:image:src"])
        .and_then(|image| resolve_url(&image, page_url));

    UrlPreview {
        url: page_url.to_string(),
        title,
        description: first_of(
            &meta,
            &["og:description", "twitter:description", "description"],
        ),
        image,
        site_name: first_of(&meta, &["og:site_name", "twitter:site"]),
        card_type: first_of(&meta, &["twitter:card", "og:type"]),
    }
}

/// Resolve a potentially relative URL against a base URL.
fn resolve_url(url: &str, base: &Url) -> Option<String> {
    base.join(url)
        .ok()
        .filter(|u| u.scheme() == "http" || u.scheme() == "https")
        .map(|u| u.to_string())
}

/// Decode common HTML entities.
fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&#x2F;", "/")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/articles/1").unwrap()
    }

    #[test]
    fn test_title_fallback() {
        let html = r"<html><head><title>Test Page</title></head></html>";
        let preview = parse_preview(html, &page());
        assert_eq!(preview.title.as_deref(), Some("Test Page"));
        assert_eq!(preview.url, "https://example.com/articles/1");
    }

    #[test]
    fn test_og_wins_over_twitter_and_fallback() {
        let html = r#"<html><head>
            <title>Plain</title>
            <meta name="twitter:title" content="Twitter Title">
            <meta property="og:title" content="OG Title">
            <meta name="description" content="Plain description">
            <meta name="twitter:description" content="Twitter description">
        </head></html>"#;
        let preview = parse_preview(html, &page());
        assert_eq!(preview.title.as_deref(), Some("OG Title"));
        assert_eq!(preview.description.as_deref(), Some("Twitter description"));
    }

    #[test]
    fn test_content_before_property() {
        let html = r#"<meta content="Reversed" property="og:site_name" />"#;
        let preview = parse_preview(html, &page());
        assert_eq!(preview.site_name.as_deref(), Some("Reversed"));
    }

    #[test]
    fn test_relative_image_resolved() {
        let html = r#"<meta property="og:image" content="/images/preview.png">"#;
        let preview = parse_preview(html, &page());
        assert_eq!(
            preview.image.as_deref(),
            Some("https://example.com/images/preview.png")
        );

        let html = r#"<meta name="twitter:image" content="//cdn.example.com/a.png">"#;
        let preview = parse_preview(html, &page());
        assert_eq!(preview.image.as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[test]
    fn test_card_type() {
        let html = r#"<meta property="og:type" content="article"><meta name="twitter:card" content="summary_large_image">"#;
        let preview = parse_preview(html, &page());
        assert_eq!(preview.card_type.as_deref(), Some("summary_large_image"));
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(decode_html_entities("Hello &amp; World"), "Hello & World");
        assert_eq!(decode_html_entities("&lt;script&gt;"), "<script>");
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let fetcher = HttpOgpFetcher::new(UrlPreviewConfig::default()).unwrap();
        let result = fetcher.fetch("ftp://example.com/file").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
