//! HTTP API layer for huddle.
//!
//! This crate provides the REST API and real-time streaming:
//!
//! - **Endpoints**: messages, reactions, pins, bookmarks, read state,
//!   attachments, system messages and presence under `/api`
//! - **Extractors**: authenticated caller
//! - **Middleware**: bearer authentication, per-IP rate limiting
//! - **Hub**: live WebSocket sessions and event fan-out
//! - **Streaming**: the `/ws` session handler
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod hub;
pub mod middleware;
pub mod rate_limit;
pub mod response;
pub mod streaming;

use axum::{Router, routing::get};

pub use endpoints::router;
pub use hub::Hub;
pub use middleware::AppState;
pub use rate_limit::{ApiRateLimiter, RateLimitConfig};
pub use streaming::streaming_handler;

/// The full application: `/api` behind bearer auth and the rate limiter,
/// plus the `/ws` session endpoint, which authenticates its own handshake.
pub fn app(state: AppState, limiter: ApiRateLimiter) -> Router {
    let api = router()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit::rate_limit_middleware,
        ));

    Router::new()
        .route("/ws", get(streaming_handler))
        .nest("/api", api)
        .with_state(state)
}
