//! API rate limiting middleware.
//!
//! Per source IP sliding window: a request is admitted when fewer than
//! `max_requests` requests from the same address were admitted during the
//! last `window`.

#![allow(missing_docs)]

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::debug;

/// Rate limit configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a new rate limit config.
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(300, 60)
    }
}

/// Rate limit check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed {
        /// Remaining requests in the window.
        remaining: u32,
        /// Total limit.
        limit: u32,
    },
    /// Request is rate limited.
    Limited {
        /// Seconds until the oldest admitted request leaves the window.
        retry_after: u64,
        /// Total limit.
        limit: u32,
    },
}

/// Sliding-window rate limiter keyed by client address.
#[derive(Clone)]
pub struct ApiRateLimiter {
    config: RateLimitConfig,
    hits: Arc<Mutex<HashMap<IpAddr, VecDeque<Instant>>>>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check if a request at `now` is allowed and record it.
    pub async fn check(&self, ip: IpAddr, now: Instant) -> RateLimitResult {
        let limit = self.config.max_requests;
        let mut hits = self.hits.lock().await;
        let window = hits.entry(ip).or_default();

        while window
            .front()
            .is_some_and(|&at| now.saturating_duration_since(at) >= self.config.window)
        {
            window.pop_front();
        }

        if window.len() >= limit as usize {
            let retry_after = window.front().map_or(self.config.window, |&oldest| {
                self.config
                    .window
                    .saturating_sub(now.saturating_duration_since(oldest))
            });
            return RateLimitResult::Limited {
                retry_after: retry_after.as_secs().max(1),
                limit,
            };
        }

        window.push_back(now);
        RateLimitResult::Allowed {
            remaining: limit.saturating_sub(window.len() as u32),
            limit,
        }
    }

    /// Forget addresses with no request inside the window.
    pub async fn cleanup(&self, now: Instant) {
        let window = self.config.window;
        self.hits.lock().await.retain(|_, hits| {
            hits.back()
                .is_some_and(|&at| now.saturating_duration_since(at) < window)
        });
    }

    /// Number of tracked addresses.
    pub async fn key_count(&self) -> usize {
        self.hits.lock().await.len()
    }
}

/// Rate limit error response.
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "RATE_LIMITED",
                "message": "Too many requests",
                "retryAfter": self.retry_after
            }
        });

        (
            StatusCode::TOO_MANY_REQUESTS,
            [
                ("Retry-After", self.retry_after.to_string()),
                ("Content-Type", "application/json".to_string()),
            ],
            body.to_string(),
        )
            .into_response()
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// peer address.
fn extract_client_ip(req: &Request<Body>) -> IpAddr {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        req.headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    };

    let peer = || {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    forwarded
        .or_else(real_ip)
        .or_else(peer)
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(limiter): State<ApiRateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, RateLimitError> {
    let ip = extract_client_ip(&req);

    match limiter.check(ip, Instant::now()).await {
        RateLimitResult::Allowed { remaining, limit } => {
            let mut response = next.run(req).await;

            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limit.into());
            headers.insert("X-RateLimit-Remaining", remaining.into());

            Ok(response)
        }
        RateLimitResult::Limited { retry_after, .. } => {
            debug!(ip = %ip, retry_after, "Request rate limited");
            Err(RateLimitError { retry_after })
        }
    }
}
