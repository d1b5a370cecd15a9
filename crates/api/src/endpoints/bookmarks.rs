//! Bookmark listing. Adding and removing live under the message routes.

use axum::{Router, extract::State, routing::get};
use huddle_common::AppResult;
use huddle_core::BookmarkView;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<BookmarkView>>> {
    let bookmarks = state.bookmark_service.list(&user.user_id).await?;
    Ok(ApiResponse::ok(bookmarks))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/bookmarks", get(list))
}
