//! API endpoints.

mod attachments;
mod bookmarks;
mod messages;
mod pins;
mod read_state;
mod system_messages;
mod workspaces;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(messages::router())
        .merge(pins::router())
        .merge(read_state::router())
        .merge(attachments::router())
        .merge(system_messages::router())
        .merge(bookmarks::router())
        .merge(workspaces::router())
}
