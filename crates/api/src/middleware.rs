//! API middleware and shared state.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use huddle_common::{OgpFetcher, StorageService};
use huddle_core::{
    AccessService, AttachmentService, BookmarkService, EventDispatcher, IdentityProvider,
    LinkEnricher, MessageService, MessageViewBuilder, PinService, ReactionService,
    ReadStateService, SystemMessageService,
};
use huddle_db::TransactionManager;
use huddle_db::repositories::{
    AttachmentRepository, BookmarkRepository, ChannelRepository, MessageRepository,
    PinRepository, ReactionRepository, ReadStateRepository, SystemMessageRepository,
    WorkspaceRepository,
};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::hub::Hub;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub access: AccessService,
    pub message_service: MessageService,
    pub reaction_service: ReactionService,
    pub pin_service: PinService,
    pub bookmark_service: BookmarkService,
    pub read_state_service: ReadStateService,
    pub attachment_service: AttachmentService,
    pub system_message_service: SystemMessageService,
    pub dispatcher: EventDispatcher,
    pub identity: Arc<dyn IdentityProvider>,
    pub hub: Hub,
}

impl AppState {
    /// Wire every service over one connection pool, publishing through `hub`.
    pub fn new(
        db: Arc<DatabaseConnection>,
        hub: Hub,
        identity: Arc<dyn IdentityProvider>,
        fetcher: Arc<dyn OgpFetcher>,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        let dispatcher = EventDispatcher::new(Arc::new(hub.clone()));

        let message_repo = MessageRepository::new(Arc::clone(&db));
        let channel_repo = ChannelRepository::new(Arc::clone(&db));
        let access = AccessService::new(
            channel_repo.clone(),
            WorkspaceRepository::new(Arc::clone(&db)),
            message_repo.clone(),
        );
        let views = MessageViewBuilder::new(Arc::clone(&db));
        let tx = TransactionManager::new(Arc::clone(&db));

        let system_message_service = SystemMessageService::new(
            SystemMessageRepository::new(Arc::clone(&db)),
            access.clone(),
            dispatcher.clone(),
        );

        Self {
            message_service: MessageService::new(
                message_repo.clone(),
                AttachmentRepository::new(Arc::clone(&db)),
                tx.clone(),
                access.clone(),
                views.clone(),
                LinkEnricher::new(tx.clone(), fetcher),
                dispatcher.clone(),
            ),
            reaction_service: ReactionService::new(
                ReactionRepository::new(Arc::clone(&db)),
                access.clone(),
                dispatcher.clone(),
            ),
            pin_service: PinService::new(
                PinRepository::new(Arc::clone(&db)),
                message_repo.clone(),
                access.clone(),
                views.clone(),
                system_message_service.clone(),
                dispatcher.clone(),
            ),
            bookmark_service: BookmarkService::new(
                BookmarkRepository::new(Arc::clone(&db)),
                message_repo.clone(),
                channel_repo,
                access.clone(),
                views,
            ),
            read_state_service: ReadStateService::new(
                ReadStateRepository::new(Arc::clone(&db)),
                message_repo,
                tx,
                access.clone(),
                dispatcher.clone(),
            ),
            attachment_service: AttachmentService::new(
                AttachmentRepository::new(db),
                access.clone(),
                storage,
            ),
            system_message_service,
            access,
            dispatcher,
            identity,
            hub,
        }
    }
}

/// Extract a bearer token from the `Authorization` header.
pub fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
///
/// A valid bearer token puts the caller's [`huddle_core::Identity`] into the
/// request extensions; handlers that need one reject the request otherwise.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&req) {
        match state.identity.authenticate(token).await {
            Ok(identity) => {
                req.extensions_mut().insert(identity);
            }
            Err(e) => debug!(error = %e, "Bearer token rejected"),
        }
    }

    next.run(req).await
}
