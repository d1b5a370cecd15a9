//! Message endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use huddle_common::AppResult;
use huddle_core::{CreateMessageInput, EditMessageInput, ListMessagesQuery, MessageView};
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// List root messages of a channel.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> AppResult<ApiResponse<Vec<MessageView>>> {
    let messages = state
        .message_service
        .list(&channel_id, &user.user_id, query)
        .await?;
    Ok(ApiResponse::ok(messages))
}

/// Post a message.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(input): Json<CreateMessageInput>,
) -> AppResult<ApiResponse<MessageView>> {
    let message = state
        .message_service
        .create(&channel_id, &user.user_id, input)
        .await?;
    Ok(ApiResponse::created(message))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<ApiResponse<MessageView>> {
    let message = state.message_service.get(&message_id, &user.user_id).await?;
    Ok(ApiResponse::ok(message))
}

async fn edit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(input): Json<EditMessageInput>,
) -> AppResult<ApiResponse<MessageView>> {
    let message = state
        .message_service
        .edit(&message_id, &user.user_id, input)
        .await?;
    Ok(ApiResponse::ok(message))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .message_service
        .delete(&message_id, &user.user_id)
        .await?;
    Ok(no_content())
}

#[derive(Debug, Default, Deserialize)]
pub struct ThreadQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

/// Replies to a thread root.
async fn thread(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Query(query): Query<ThreadQuery>,
) -> AppResult<ApiResponse<Vec<MessageView>>> {
    let replies = state
        .message_service
        .thread(&message_id, &user.user_id, query.include_deleted)
        .await?;
    Ok(ApiResponse::ok(replies))
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}

async fn add_reaction(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(req): Json<ReactionRequest>,
) -> AppResult<StatusCode> {
    state
        .reaction_service
        .add(&message_id, &user.user_id, &req.emoji)
        .await?;
    Ok(no_content())
}

async fn remove_reaction(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((message_id, emoji)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .reaction_service
        .remove(&message_id, &user.user_id, &emoji)
        .await?;
    Ok(no_content())
}

async fn add_bookmark(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .bookmark_service
        .add(&message_id, &user.user_id)
        .await?;
    Ok(no_content())
}

async fn remove_bookmark(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .bookmark_service
        .remove(&message_id, &user.user_id)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels/{id}/messages", get(list).post(create))
        .route("/messages/{id}", get(show).patch(edit).delete(remove))
        .route("/messages/{id}/thread", get(thread))
        .route("/messages/{id}/reactions", post(add_reaction))
        .route("/messages/{id}/reactions/{emoji}", delete(remove_reaction))
        .route(
            "/messages/{id}/bookmark",
            post(add_bookmark).delete(remove_bookmark),
        )
}
