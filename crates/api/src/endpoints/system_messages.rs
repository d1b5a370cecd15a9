//! System message endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use huddle_common::AppResult;
use huddle_core::SystemMessageView;
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u64>,
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<SystemMessageView>>> {
    let messages = state
        .system_message_service
        .list(&channel_id, &user.user_id, query.limit)
        .await?;
    Ok(ApiResponse::ok(messages))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/channels/{id}/system-messages", get(list))
}
