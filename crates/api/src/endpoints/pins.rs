//! Pin endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use huddle_common::AppResult;
use huddle_core::PinView;
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

#[derive(Debug, Deserialize)]
pub struct PinRequest {
    pub message_id: String,
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> AppResult<ApiResponse<Vec<PinView>>> {
    let pins = state.pin_service.list(&channel_id, &user.user_id).await?;
    Ok(ApiResponse::ok(pins))
}

/// Pin a message of the channel.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(req): Json<PinRequest>,
) -> AppResult<ApiResponse<PinView>> {
    let pin = state
        .pin_service
        .pin(&channel_id, &req.message_id, &user.user_id)
        .await?;
    Ok(ApiResponse::created(pin))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((channel_id, message_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .pin_service
        .unpin(&channel_id, &message_id, &user.user_id)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels/{id}/pins", get(list).post(create))
        .route("/channels/{id}/pins/{message_id}", delete(remove))
}
