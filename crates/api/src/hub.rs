//! Session hub.
//!
//! Tracks live WebSocket connections per workspace and user, their channel
//! subscriptions, and fans encoded events out to them. All state is owned
//! by one task; callers talk to it over a command queue, so publishing
//! never blocks and events published to one channel reach each subscriber
//! in publish order.
//!
//! Every connection has a bounded outbound queue. A connection whose queue
//! is full when an event arrives is evicted: the hub drops its handle,
//! which signals the writer to close the socket without draining.

#![allow(missing_docs)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use huddle_core::Fanout;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Outbound queue depth per connection.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

pub type ConnectionId = u64;

/// The socket side of a registered connection.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Encoded events to write to the socket.
    pub outbound: mpsc::Receiver<Bytes>,
    /// Resolves once the hub has dropped the connection.
    pub closed: oneshot::Receiver<()>,
}

/// The hub side of a registered connection.
struct ConnectionHandle {
    workspace_id: String,
    user_id: String,
    queue: mpsc::Sender<Bytes>,
    channels: HashSet<String>,
    _kill: oneshot::Sender<()>,
}

enum Command {
    Register {
        id: ConnectionId,
        handle: ConnectionHandle,
    },
    Unregister(ConnectionId),
    Subscribe {
        id: ConnectionId,
        channel_id: String,
    },
    Unsubscribe {
        id: ConnectionId,
        channel_id: String,
    },
    Direct {
        id: ConnectionId,
        payload: Bytes,
    },
    Workspace {
        workspace_id: String,
        payload: Bytes,
    },
    User {
        workspace_id: String,
        user_id: String,
        payload: Bytes,
    },
    Channel {
        workspace_id: String,
        channel_id: String,
        exclude_user: Option<String>,
        payload: Bytes,
    },
    OnlineUsers {
        workspace_id: String,
        reply: oneshot::Sender<Vec<String>>,
    },
    SubscriberCount {
        workspace_id: String,
        channel_id: String,
        reply: oneshot::Sender<usize>,
    },
    ConnectionCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the hub task.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl Hub {
    /// Start a hub on the current runtime.
    #[must_use]
    pub fn spawn() -> Self {
        Self::with_queue_capacity(OUTBOUND_QUEUE_CAPACITY)
    }

    /// Start a hub whose connections queue at most `capacity` events.
    #[must_use]
    pub fn with_queue_capacity(capacity: usize) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(HubState::default().run(rx));

        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: capacity.max(1),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Hub task is gone, command dropped");
        }
    }

    /// Register a connection of `user_id` in `workspace_id`.
    pub fn register(&self, workspace_id: &str, user_id: &str) -> Connection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (queue, outbound) = mpsc::channel(self.queue_capacity);
        let (kill, closed) = oneshot::channel();

        self.send(Command::Register {
            id,
            handle: ConnectionHandle {
                workspace_id: workspace_id.to_string(),
                user_id: user_id.to_string(),
                queue,
                channels: HashSet::new(),
                _kill: kill,
            },
        });

        Connection {
            id,
            outbound,
            closed,
        }
    }

    /// Drop a connection and all of its subscriptions.
    pub fn unregister(&self, id: ConnectionId) {
        self.send(Command::Unregister(id));
    }

    pub fn subscribe(&self, id: ConnectionId, channel_id: &str) {
        self.send(Command::Subscribe {
            id,
            channel_id: channel_id.to_string(),
        });
    }

    pub fn unsubscribe(&self, id: ConnectionId, channel_id: &str) {
        self.send(Command::Unsubscribe {
            id,
            channel_id: channel_id.to_string(),
        });
    }

    /// Queue a payload for one connection, ordered after any command
    /// already sent for it.
    pub fn send_to(&self, id: ConnectionId, payload: Bytes) {
        self.send(Command::Direct { id, payload });
    }

    /// Users with at least one live connection in the workspace.
    pub async fn online_users(&self, workspace_id: &str) -> Vec<String> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::OnlineUsers {
            workspace_id: workspace_id.to_string(),
            reply,
        });
        rx.await.unwrap_or_default()
    }

    pub async fn subscriber_count(&self, workspace_id: &str, channel_id: &str) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SubscriberCount {
            workspace_id: workspace_id.to_string(),
            channel_id: channel_id.to_string(),
            reply,
        });
        rx.await.unwrap_or_default()
    }

    pub async fn connection_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ConnectionCount { reply });
        rx.await.unwrap_or_default()
    }
}

impl Fanout for Hub {
    fn to_workspace(&self, workspace_id: &str, payload: Bytes) {
        self.send(Command::Workspace {
            workspace_id: workspace_id.to_string(),
            payload,
        });
    }

    fn to_user(&self, workspace_id: &str, user_id: &str, payload: Bytes) {
        self.send(Command::User {
            workspace_id: workspace_id.to_string(),
            user_id: user_id.to_string(),
            payload,
        });
    }

    fn to_channel(
        &self,
        workspace_id: &str,
        channel_id: &str,
        payload: Bytes,
        exclude_user: Option<&str>,
    ) {
        self.send(Command::Channel {
            workspace_id: workspace_id.to_string(),
            channel_id: channel_id.to_string(),
            exclude_user: exclude_user.map(ToString::to_string),
            payload,
        });
    }
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    /// workspace -> user -> connections
    workspaces: HashMap<String, HashMap<String, BTreeSet<ConnectionId>>>,
    /// (workspace, channel) -> subscribed connections
    channel_subs: HashMap<(String, String), BTreeSet<ConnectionId>>,
}

impl HubState {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.apply(command);
        }
        debug!("Hub stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register { id, handle } => {
                debug!(
                    connection_id = id,
                    workspace_id = %handle.workspace_id,
                    user_id = %handle.user_id,
                    "Connection registered"
                );
                self.workspaces
                    .entry(handle.workspace_id.clone())
                    .or_default()
                    .entry(handle.user_id.clone())
                    .or_default()
                    .insert(id);
                self.connections.insert(id, handle);
            }
            Command::Unregister(id) => self.remove(id),
            Command::Subscribe { id, channel_id } => {
                if let Some(handle) = self.connections.get_mut(&id) {
                    self.channel_subs
                        .entry((handle.workspace_id.clone(), channel_id.clone()))
                        .or_default()
                        .insert(id);
                    handle.channels.insert(channel_id);
                }
            }
            Command::Unsubscribe { id, channel_id } => {
                if let Some(handle) = self.connections.get_mut(&id)
                    && handle.channels.remove(&channel_id)
                {
                    let key = (handle.workspace_id.clone(), channel_id);
                    Self::remove_from(&mut self.channel_subs, &key, id);
                }
            }
            Command::Direct { id, payload } => self.deliver([id], &payload),
            Command::Workspace {
                workspace_id,
                payload,
            } => {
                let targets: Vec<ConnectionId> = self
                    .workspaces
                    .get(&workspace_id)
                    .map(|users| users.values().flatten().copied().collect())
                    .unwrap_or_default();
                self.deliver(targets, &payload);
            }
            Command::User {
                workspace_id,
                user_id,
                payload,
            } => {
                let targets: Vec<ConnectionId> = self
                    .workspaces
                    .get(&workspace_id)
                    .and_then(|users| users.get(&user_id))
                    .map(|ids| ids.iter().copied().collect())
                    .unwrap_or_default();
                self.deliver(targets, &payload);
            }
            Command::Channel {
                workspace_id,
                channel_id,
                exclude_user,
                payload,
            } => {
                let targets: Vec<ConnectionId> = self
                    .channel_subs
                    .get(&(workspace_id, channel_id))
                    .map(|ids| {
                        ids.iter()
                            .copied()
                            .filter(|id| {
                                exclude_user.as_deref().is_none_or(|excluded| {
                                    self.connections
                                        .get(id)
                                        .is_some_and(|c| c.user_id != excluded)
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                self.deliver(targets, &payload);
            }
            Command::OnlineUsers {
                workspace_id,
                reply,
            } => {
                let mut users: Vec<String> = self
                    .workspaces
                    .get(&workspace_id)
                    .map(|users| users.keys().cloned().collect())
                    .unwrap_or_default();
                users.sort();
                let _ = reply.send(users);
            }
            Command::SubscriberCount {
                workspace_id,
                channel_id,
                reply,
            } => {
                let count = self
                    .channel_subs
                    .get(&(workspace_id, channel_id))
                    .map_or(0, BTreeSet::len);
                let _ = reply.send(count);
            }
            Command::ConnectionCount { reply } => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    fn deliver(&mut self, targets: impl IntoIterator<Item = ConnectionId>, payload: &Bytes) {
        let mut evicted = Vec::new();

        for id in targets {
            let Some(handle) = self.connections.get(&id) else {
                continue;
            };
            match handle.queue.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        connection_id = id,
                        user_id = %handle.user_id,
                        "Outbound queue full, evicting slow connection"
                    );
                    evicted.push(id);
                }
                Err(TrySendError::Closed(_)) => evicted.push(id),
            }
        }

        for id in evicted {
            self.remove(id);
        }
    }

    fn remove(&mut self, id: ConnectionId) {
        let Some(handle) = self.connections.remove(&id) else {
            return;
        };

        for channel_id in &handle.channels {
            let key = (handle.workspace_id.clone(), channel_id.clone());
            Self::remove_from(&mut self.channel_subs, &key, id);
        }

        if let Some(users) = self.workspaces.get_mut(&handle.workspace_id) {
            if let Some(ids) = users.get_mut(&handle.user_id) {
                ids.remove(&id);
                if ids.is_empty() {
                    users.remove(&handle.user_id);
                }
            }
            if users.is_empty() {
                self.workspaces.remove(&handle.workspace_id);
            }
        }

        info!(
            connection_id = id,
            workspace_id = %handle.workspace_id,
            user_id = %handle.user_id,
            "Connection removed"
        );
    }

    fn remove_from(
        index: &mut HashMap<(String, String), BTreeSet<ConnectionId>>,
        key: &(String, String),
        id: ConnectionId,
    ) {
        if let Some(ids) = index.get_mut(key) {
            ids.remove(&id);
            if ids.is_empty() {
                index.remove(key);
            }
        }
    }
}
