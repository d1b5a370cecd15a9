//! Read-state endpoints.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use huddle_common::{AppError, AppResult};
use huddle_core::{ChannelUnread, ReadMark, UnreadStatus};
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Read mark: a message id or an instant.
#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    pub message_id: Option<String>,
    pub last_read_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReadRequest> for ReadMark {
    type Error = AppError;

    fn try_from(req: ReadRequest) -> Result<Self, Self::Error> {
        match (req.message_id, req.last_read_at) {
            (Some(message_id), _) => Ok(Self::Message(message_id)),
            (None, Some(at)) => Ok(Self::At(at)),
            (None, None) => Err(AppError::Validation(
                "message_id or last_read_at is required".to_string(),
            )),
        }
    }
}

/// Advance the caller's read mark.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(req): Json<ReadRequest>,
) -> AppResult<ApiResponse<UnreadStatus>> {
    let status = state
        .read_state_service
        .update(&channel_id, &user.user_id, req.try_into()?)
        .await?;
    Ok(ApiResponse::ok(status))
}

async fn unread(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> AppResult<ApiResponse<UnreadStatus>> {
    let status = state
        .read_state_service
        .unread_count(&channel_id, &user.user_id)
        .await?;
    Ok(ApiResponse::ok(status))
}

/// Unread totals of every accessible channel.
async fn unread_channels(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<BTreeMap<String, ChannelUnread>>> {
    let counts = state
        .read_state_service
        .unread_channels(&user.user_id)
        .await?;
    Ok(ApiResponse::ok(counts))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels/{id}/read", post(mark_read))
        .route("/channels/{id}/unread", get(unread))
        .route("/unread", get(unread_channels))
}
