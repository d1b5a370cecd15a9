//! WebSocket streaming API.
//!
//! One socket per client session, scoped to a workspace. The handshake is
//! authorized before upgrading: the bearer token comes from the `token`
//! query parameter or from `Sec-WebSocket-Protocol: bearer, <token>`.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::time::Duration;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use huddle_common::{AppError, AppResult};
use huddle_core::{
    ClientEvent, CreateMessageInput, EventDispatcher, Identity, ReadMark, ServerEvent,
};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at, timeout};
use tracing::{debug, info, warn};

use crate::hub::{Connection, ConnectionId};
use crate::middleware::AppState;

/// Interval between server pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(54);
/// A connection silent for this long is closed.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Deadline for a single frame write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Largest accepted inbound message.
pub const MAX_MESSAGE_SIZE: usize = 512 * 1024;

const BEARER_PROTOCOL: &str = "bearer";

/// Streaming query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    pub workspace_id: Option<String>,
    pub token: Option<String>,
}

/// Where the bearer token was found.
#[derive(Debug, PartialEq, Eq)]
enum TokenSource {
    Query(String),
    Protocol(String),
}

fn find_token(query: &StreamQuery, headers: &HeaderMap) -> Option<TokenSource> {
    if let Some(token) = query.token.as_deref().map(str::trim)
        && !token.is_empty()
    {
        return Some(TokenSource::Query(token.to_string()));
    }

    let protocols = headers
        .get(header::SEC_WEBSOCKET_PROTOCOL)?
        .to_str()
        .ok()?;
    let mut parts = protocols.split(',').map(str::trim);
    if parts.next()? != BEARER_PROTOCOL {
        return None;
    }
    parts
        .next()
        .filter(|token| !token.is_empty())
        .map(|token| TokenSource::Protocol(token.to_string()))
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(source) = find_token(&query, &headers) else {
        return AppError::Unauthorized.into_response();
    };
    let (token, via_protocol) = match &source {
        TokenSource::Query(token) => (token.as_str(), false),
        TokenSource::Protocol(token) => (token.as_str(), true),
    };

    let identity = match state.identity.authenticate(token).await {
        Ok(identity) => identity,
        Err(e) => {
            debug!(error = %e, "Streaming handshake rejected");
            return AppError::Unauthorized.into_response();
        }
    };

    let Some(workspace_id) = query.workspace_id.filter(|id| !id.is_empty()) else {
        return AppError::Validation("workspaceId is required".to_string()).into_response();
    };

    if let Err(e) = state
        .access
        .ensure_workspace_member(&workspace_id, &identity.user_id)
        .await
    {
        return e.into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let ws = if via_protocol {
        ws.protocols([BEARER_PROTOCOL])
    } else {
        ws
    };

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, workspace_id, identity))
}

/// Drive one connection until either side stops.
async fn handle_socket(socket: WebSocket, state: AppState, workspace_id: String, identity: Identity) {
    let Connection {
        id,
        outbound,
        closed,
    } = state.hub.register(&workspace_id, &identity.user_id);

    info!(
        connection_id = id,
        workspace_id = %workspace_id,
        user_id = %identity.user_id,
        "Streaming connection established"
    );

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, outbound, closed));

    let session = Session {
        state: state.clone(),
        connection_id: id,
        workspace_id,
        user_id: identity.user_id,
        joined: HashSet::new(),
    };
    let mut reader = tokio::spawn(read_loop(stream, session));

    tokio::select! {
        _ = &mut reader => {
            state.hub.unregister(id);
            // The writer sends a close frame once the hub drops the connection.
            if timeout(WRITE_TIMEOUT, &mut writer).await.is_err() {
                writer.abort();
            }
        }
        _ = &mut writer => {
            reader.abort();
            state.hub.unregister(id);
        }
    }

    info!(connection_id = id, "Streaming connection closed");
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Bytes>,
    mut closed: oneshot::Receiver<()>,
) {
    let mut ping = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);

    loop {
        let message = tokio::select! {
            biased;
            _ = &mut closed => {
                // Evicted or unregistered: queued events are dropped.
                let _ = timeout(WRITE_TIMEOUT, sink.send(Message::Close(None))).await;
                return;
            }
            payload = outbound.recv() => match payload {
                Some(payload) => Message::Text(String::from_utf8_lossy(&payload).into_owned().into()),
                None => return,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(WRITE_TIMEOUT, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "WebSocket write failed");
                return;
            }
            Err(_) => {
                warn!("WebSocket write timed out");
                return;
            }
        }
    }
}

async fn read_loop(mut stream: SplitStream<WebSocket>, mut session: Session) {
    loop {
        let frame = match timeout(READ_TIMEOUT, stream.next()).await {
            Err(_) => {
                debug!(connection_id = session.connection_id, "Read deadline passed");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "WebSocket read failed");
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => session.handle_text(text.as_str()).await,
            Message::Close(_) => return,
            // Pings are answered by the socket; pongs only refresh the deadline.
            _ => {}
        }
    }
}

/// Per-connection state on the reader side.
struct Session {
    state: AppState,
    connection_id: ConnectionId,
    workspace_id: String,
    user_id: String,
    joined: HashSet<String>,
}

impl Session {
    async fn handle_text(&mut self, text: &str) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "Malformed client event");
                self.reply(&ServerEvent::error(&AppError::Validation(format!(
                    "Malformed event: {e}"
                ))));
                return;
            }
        };

        let kind = event.kind();
        match self.handle_event(event).await {
            Ok(true) => self.reply(&ServerEvent::ack(kind)),
            Ok(false) => {}
            Err(e) => {
                if e.is_server_error() {
                    warn!(error = %e, event = kind, "Client event failed");
                }
                // A refused join leaves the connection unsubscribed.
                if matches!(kind, "join_channel") {
                    self.reply(&ServerEvent::error(&e));
                } else {
                    self.reply(&ServerEvent::nack(kind, e.public_message()));
                }
            }
        }
    }

    /// Apply a client event. `Ok(true)` means the event is acknowledged.
    async fn handle_event(&mut self, event: ClientEvent) -> AppResult<bool> {
        match event {
            ClientEvent::JoinChannel { channel_id } => {
                let channel = self
                    .state
                    .access
                    .ensure_channel_access(&channel_id, &self.user_id)
                    .await?;
                if channel.workspace_id != self.workspace_id {
                    return Err(AppError::NotFound(format!(
                        "Channel not found: {channel_id}"
                    )));
                }
                self.state.hub.subscribe(self.connection_id, &channel_id);
                self.joined.insert(channel_id);
                Ok(true)
            }
            ClientEvent::LeaveChannel { channel_id } => {
                self.state.hub.unsubscribe(self.connection_id, &channel_id);
                self.joined.remove(&channel_id);
                Ok(true)
            }
            ClientEvent::PostMessage {
                channel_id,
                body,
                parent_id,
                attachment_ids,
            } => {
                self.state
                    .message_service
                    .create(
                        &channel_id,
                        &self.user_id,
                        CreateMessageInput {
                            body,
                            parent_id,
                            attachment_ids,
                        },
                    )
                    .await?;
                Ok(true)
            }
            ClientEvent::Typing { channel_id } => {
                if !self.joined.contains(&channel_id) {
                    return Err(AppError::Validation(
                        "Join the channel before typing in it".to_string(),
                    ));
                }
                self.state
                    .dispatcher
                    .typing(&self.workspace_id, &channel_id, &self.user_id);
                Ok(false)
            }
            ClientEvent::UpdateReadState {
                channel_id,
                message_id,
                last_read_at,
            } => {
                let mark = match (message_id, last_read_at) {
                    (Some(message_id), _) => ReadMark::Message(message_id),
                    (None, Some(at)) => ReadMark::At(at),
                    (None, None) => {
                        return Err(AppError::Validation(
                            "message_id or last_read_at is required".to_string(),
                        ));
                    }
                };
                self.state
                    .read_state_service
                    .update(&channel_id, &self.user_id, mark)
                    .await?;
                Ok(true)
            }
        }
    }

    fn reply(&self, event: &ServerEvent) {
        if let Some(payload) = EventDispatcher::encode(event) {
            self.state.hub.send_to(self.connection_id, payload);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use huddle_common::{DisabledStorage, HttpOgpFetcher, UrlPreviewConfig};
    use huddle_core::JwtIdentityProvider;
    use huddle_db::entities::workspace_member::WorkspaceRole;
    use huddle_db::test_utils::TestDatabase;
    use serde_json::{Value, json};

    use crate::hub::Hub;

    /// Workspace `ws1` (owner `owner`, member `alice`), public channel
    /// `general` and private channel `secret`.
    struct Harness {
        state: AppState,
        _db: TestDatabase,
    }

    impl Harness {
        async fn new() -> Self {
            let db = TestDatabase::new().await.unwrap();
            db.create_user("owner", "Owner").await.unwrap();
            db.create_user("alice", "Alice").await.unwrap();
            db.create_workspace("ws1", "owner").await.unwrap();
            db.add_workspace_member("ws1", "alice", WorkspaceRole::Member)
                .await
                .unwrap();
            db.create_channel("general", "ws1", "owner", false)
                .await
                .unwrap();
            db.create_channel("secret", "ws1", "owner", true)
                .await
                .unwrap();

            let state = AppState::new(
                db.conn.clone(),
                Hub::spawn(),
                Arc::new(JwtIdentityProvider::new(
                    "streaming-test-secret",
                    Duration::from_secs(900),
                )),
                Arc::new(HttpOgpFetcher::new(UrlPreviewConfig::default()).unwrap()),
                Arc::new(DisabledStorage),
            );
            Self { state, _db: db }
        }

        fn open(&self, user_id: &str) -> (Session, Connection) {
            let connection = self.state.hub.register("ws1", user_id);
            let session = Session {
                state: self.state.clone(),
                connection_id: connection.id,
                workspace_id: "ws1".to_string(),
                user_id: user_id.to_string(),
                joined: HashSet::new(),
            };
            (session, connection)
        }
    }

    async fn next_frame(connection: &mut Connection) -> Value {
        let payload = timeout(Duration::from_secs(1), connection.outbound.recv())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_slice(&payload).unwrap()
    }

    fn frame(event: &Value) -> String {
        event.to_string()
    }

    #[tokio::test]
    async fn test_joined_connection_receives_new_messages() {
        let harness = Harness::new().await;
        let (mut alice, mut alice_conn) = harness.open("alice");
        let (mut owner, mut owner_conn) = harness.open("owner");

        alice
            .handle_text(&frame(&json!({
                "type": "join_channel",
                "payload": {"channel_id": "general"}
            })))
            .await;
        assert_eq!(
            next_frame(&mut alice_conn).await,
            json!({"type": "ack", "payload": {"type": "join_channel", "success": true}})
        );
        assert_eq!(harness.state.hub.subscriber_count("ws1", "general").await, 1);

        owner
            .handle_text(&frame(&json!({
                "type": "post_message",
                "payload": {"channel_id": "general", "body": "hello"}
            })))
            .await;

        let event = next_frame(&mut alice_conn).await;
        assert_eq!(event["type"], "new_message");
        assert_eq!(event["payload"]["channel_id"], "general");
        assert_eq!(event["payload"]["message"]["body"], "hello");

        assert_eq!(
            next_frame(&mut owner_conn).await,
            json!({"type": "ack", "payload": {"type": "post_message", "success": true}})
        );
    }

    #[tokio::test]
    async fn test_refused_join_sends_error_and_stays_unsubscribed() {
        let harness = Harness::new().await;
        let (mut alice, mut conn) = harness.open("alice");

        alice
            .handle_text(&frame(&json!({
                "type": "join_channel",
                "payload": {"channel_id": "secret"}
            })))
            .await;

        let event = next_frame(&mut conn).await;
        assert_eq!(event["type"], "error");
        assert_eq!(event["payload"]["code"], "FORBIDDEN");
        assert_eq!(harness.state.hub.subscriber_count("ws1", "secret").await, 0);
        assert!(!alice.joined.contains("secret"));
    }

    #[tokio::test]
    async fn test_typing_requires_join() {
        let harness = Harness::new().await;
        let (mut alice, mut conn) = harness.open("alice");

        alice
            .handle_text(&frame(&json!({
                "type": "typing",
                "payload": {"channel_id": "general"}
            })))
            .await;

        let event = next_frame(&mut conn).await;
        assert_eq!(event["type"], "ack");
        assert_eq!(event["payload"]["type"], "typing");
        assert_eq!(event["payload"]["success"], false);
        assert!(event["payload"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_frame_sends_error() {
        let harness = Harness::new().await;
        let (mut alice, mut conn) = harness.open("alice");

        alice.handle_text("{not json").await;
        let event = next_frame(&mut conn).await;
        assert_eq!(event["type"], "error");
        assert_eq!(event["payload"]["code"], "VALIDATION_ERROR");

        alice
            .handle_text(&frame(&json!({"type": "shout", "payload": {}})))
            .await;
        assert_eq!(next_frame(&mut conn).await["type"], "error");
    }

    #[tokio::test]
    async fn test_read_state_needs_a_position() {
        let harness = Harness::new().await;
        let (mut alice, mut conn) = harness.open("alice");

        alice
            .handle_text(&frame(&json!({
                "type": "update_read_state",
                "payload": {"channel_id": "general"}
            })))
            .await;

        let event = next_frame(&mut conn).await;
        assert_eq!(event["type"], "ack");
        assert_eq!(event["payload"]["type"], "update_read_state");
        assert_eq!(event["payload"]["success"], false);
    }

    #[test]
    fn test_token_from_query_wins() {
        let query = StreamQuery {
            workspace_id: Some("ws1".to_string()),
            token: Some("abc".to_string()),
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static("bearer, xyz"),
        );

        assert_eq!(
            find_token(&query, &headers),
            Some(TokenSource::Query("abc".to_string()))
        );
    }

    #[test]
    fn test_token_from_protocol_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static("bearer, xyz"),
        );

        assert_eq!(
            find_token(&StreamQuery::default(), &headers),
            Some(TokenSource::Protocol("xyz".to_string()))
        );
    }

    #[test]
    fn test_token_missing() {
        let mut headers = HeaderMap::new();
        assert_eq!(find_token(&StreamQuery::default(), &headers), None);

        headers.insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static("graphql-ws, xyz"),
        );
        assert_eq!(find_token(&StreamQuery::default(), &headers), None);

        let blank = StreamQuery {
            workspace_id: None,
            token: Some("  ".to_string()),
        };
        assert_eq!(find_token(&blank, &HeaderMap::new()), None);
    }
}
