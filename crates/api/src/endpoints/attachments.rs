//! Attachment endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use huddle_common::{AppResult, PresignedUrl};
use huddle_core::{CreateUploadInput, UploadTicket};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Start an upload: records a pending attachment and presigns its `PUT`.
async fn create_upload(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(input): Json<CreateUploadInput>,
) -> AppResult<ApiResponse<UploadTicket>> {
    let ticket = state
        .attachment_service
        .create_upload(&channel_id, &user.user_id, input)
        .await?;
    Ok(ApiResponse::created(ticket))
}

async fn download(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(attachment_id): Path<String>,
) -> AppResult<ApiResponse<PresignedUrl>> {
    let url = state
        .attachment_service
        .download_url(&attachment_id, &user.user_id)
        .await?;
    Ok(ApiResponse::ok(url))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels/{id}/attachments", post(create_upload))
        .route("/attachments/{id}/download", get(download))
}
