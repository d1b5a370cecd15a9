//! Workspace presence.

use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use huddle_common::AppResult;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Users with at least one live session in the workspace.
async fn online(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> AppResult<ApiResponse<Vec<String>>> {
    state
        .access
        .ensure_workspace_member(&workspace_id, &user.user_id)
        .await?;
    Ok(ApiResponse::ok(state.hub.online_users(&workspace_id).await))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/workspaces/{id}/online", get(online))
}
