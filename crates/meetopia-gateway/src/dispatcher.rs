use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use meetopia_types::events::{Peer, SignalEvent};

/// Why a socket command was refused. Sent back to the socket as an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("not a member of room {0}")]
    NotInRoom(String),

    #[error("unknown socket")]
    UnknownSocket,
}

/// Who a negotiation message (offer/answer/ice-candidate) goes to.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayScope<'a> {
    /// Restrict delivery to this room.
    pub room_id: Option<&'a str>,
    /// Deliver to this single socket.
    pub target: Option<Uuid>,
}

/// Per-socket bookkeeping.
struct SocketEntry {
    /// User proven by a session at upgrade. The only identity trusted for
    /// routing.
    session_user: Option<Uuid>,
    /// Shown to peers. The session user when there is one, otherwise
    /// whatever the client declared on `join-room`.
    user_id: Option<String>,
    tx: mpsc::UnboundedSender<SignalEvent>,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct Registry {
    sockets: HashMap<Uuid, SocketEntry>,
    /// room_id -> member sockets
    rooms: HashMap<String, HashSet<Uuid>>,
}

impl Registry {
    fn send(&self, socket_id: Uuid, event: SignalEvent) -> bool {
        match self.sockets.get(&socket_id) {
            Some(entry) => entry.tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Sockets sharing at least one room with `socket_id`, excluding itself.
    fn room_peers(&self, socket_id: Uuid, rooms: &HashSet<String>) -> HashSet<Uuid> {
        rooms
            .iter()
            .filter_map(|room| self.rooms.get(room))
            .flat_map(|members| members.iter().copied())
            .filter(|id| *id != socket_id)
            .collect()
    }

    fn peer(&self, socket_id: Uuid) -> Peer {
        Peer {
            socket_id,
            user_id: self.sockets.get(&socket_id).and_then(|e| e.user_id.clone()),
        }
    }

    /// Remove `socket_id` from `room_id`, dropping the room when it empties.
    /// Returns the remaining members.
    fn leave(&mut self, socket_id: Uuid, room_id: &str) -> Option<Vec<Uuid>> {
        let members = self.rooms.get_mut(room_id)?;
        if !members.remove(&socket_id) {
            return None;
        }
        let remaining: Vec<Uuid> = members.iter().copied().collect();
        if remaining.is_empty() {
            self.rooms.remove(room_id);
            debug!("Room {} is empty, dropped", room_id);
        }
        Some(remaining)
    }
}

/// Tracks every connected socket and the rooms they joined, and routes
/// signaling events between them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<RwLock<Registry>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Registry::default())),
        }
    }

    /// Register a new socket, authenticated or not. Returns (socket_id,
    /// receiver of events for it).
    pub async fn register(&self, session_user: Option<Uuid>) -> (Uuid, mpsc::UnboundedReceiver<SignalEvent>) {
        let socket_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.sockets.insert(
            socket_id,
            SocketEntry {
                session_user,
                user_id: session_user.map(|id| id.to_string()),
                tx,
                rooms: HashSet::new(),
            },
        );
        (socket_id, rx)
    }

    /// Drop a socket: it leaves every room and the remaining members are told.
    /// Returns the rooms it was in.
    pub async fn unregister(&self, socket_id: Uuid) -> Vec<String> {
        let mut registry = self.inner.write().await;

        let Some(entry) = registry.sockets.remove(&socket_id) else {
            return Vec::new();
        };

        let mut left = Vec::with_capacity(entry.rooms.len());
        for room_id in entry.rooms {
            if let Some(remaining) = registry.leave(socket_id, &room_id) {
                for member in remaining {
                    registry.send(
                        member,
                        SignalEvent::UserDisconnected {
                            room_id: room_id.clone(),
                            socket_id,
                            user_id: entry.user_id.clone(),
                        },
                    );
                }
            }
            left.push(room_id);
        }
        left
    }

    /// Add a socket to a room and announce it to the members already there.
    /// Returns those existing members. Joining a room twice is a no-op that
    /// still returns the current peers.
    ///
    /// `user_id` is only a display label for anonymous sockets. It never
    /// overrides a session user and is never used for routing.
    pub async fn join_room(
        &self,
        socket_id: Uuid,
        room_id: &str,
        user_id: Option<String>,
    ) -> Result<Vec<Peer>, RelayError> {
        let mut registry = self.inner.write().await;

        let entry = registry
            .sockets
            .get_mut(&socket_id)
            .ok_or(RelayError::UnknownSocket)?;
        if entry.session_user.is_none() && user_id.is_some() {
            entry.user_id = user_id;
        }
        let newly_joined = entry.rooms.insert(room_id.to_string());
        let announced_user = entry.user_id.clone();

        let members = registry.rooms.entry(room_id.to_string()).or_default();
        let existing: Vec<Uuid> = members.iter().copied().filter(|id| *id != socket_id).collect();
        members.insert(socket_id);

        if newly_joined {
            for member in &existing {
                registry.send(
                    *member,
                    SignalEvent::UserConnected {
                        room_id: room_id.to_string(),
                        socket_id,
                        user_id: announced_user.clone(),
                    },
                );
            }
        }

        Ok(existing.into_iter().map(|id| registry.peer(id)).collect())
    }

    /// Leave a single room. Remaining members get `user-disconnected`.
    pub async fn leave_room(&self, socket_id: Uuid, room_id: &str) -> bool {
        let mut registry = self.inner.write().await;

        let Some(entry) = registry.sockets.get_mut(&socket_id) else {
            return false;
        };
        if !entry.rooms.remove(room_id) {
            return false;
        }
        let user_id = entry.user_id.clone();

        if let Some(remaining) = registry.leave(socket_id, room_id) {
            for member in remaining {
                registry.send(
                    member,
                    SignalEvent::UserDisconnected {
                        room_id: room_id.to_string(),
                        socket_id,
                        user_id: user_id.clone(),
                    },
                );
            }
        }
        true
    }

    /// Forward a negotiation event to sockets that share a room with the
    /// sender. Returns the number of sockets it was delivered to.
    pub async fn relay(
        &self,
        socket_id: Uuid,
        scope: RelayScope<'_>,
        event: SignalEvent,
    ) -> Result<usize, RelayError> {
        let registry = self.inner.read().await;

        let sender = registry
            .sockets
            .get(&socket_id)
            .ok_or(RelayError::UnknownSocket)?;

        let candidates: HashSet<Uuid> = match scope.room_id {
            Some(room_id) => {
                if !sender.rooms.contains(room_id) {
                    return Err(RelayError::NotInRoom(room_id.to_string()));
                }
                registry
                    .rooms
                    .get(room_id)
                    .map(|members| members.iter().copied().filter(|id| *id != socket_id).collect())
                    .unwrap_or_default()
            }
            None => registry.room_peers(socket_id, &sender.rooms),
        };

        let recipients: Vec<Uuid> = match scope.target {
            Some(target) if candidates.contains(&target) => vec![target],
            Some(target) => {
                debug!("Dropping relay from {} to {}: no shared room", socket_id, target);
                Vec::new()
            }
            None => candidates.into_iter().collect(),
        };

        let delivered = recipients
            .into_iter()
            .filter(|id| registry.send(*id, event.clone()))
            .count();
        Ok(delivered)
    }

    /// Emit a chat message to every member of `room_id`, the sender included.
    pub async fn chat(&self, socket_id: Uuid, room_id: &str, message: String) -> Result<usize, RelayError> {
        let registry = self.inner.read().await;

        let sender = registry
            .sockets
            .get(&socket_id)
            .ok_or(RelayError::UnknownSocket)?;
        if !sender.rooms.contains(room_id) {
            return Err(RelayError::NotInRoom(room_id.to_string()));
        }

        let event = SignalEvent::ChatMessage {
            room_id: room_id.to_string(),
            message,
            sender_id: socket_id,
            user_id: sender.user_id.clone(),
            timestamp: chrono::Utc::now(),
        };

        let delivered = registry
            .rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|id| registry.send(**id, event.clone()))
                    .count()
            })
            .unwrap_or(0);
        Ok(delivered)
    }

    /// Send an event to one socket.
    pub async fn send_to_socket(&self, socket_id: Uuid, event: SignalEvent) -> bool {
        self.inner.read().await.send(socket_id, event)
    }

    /// Send an event to every socket whose session belongs to `user_id`.
    /// Self-declared ids do not count. Returns how many got it.
    pub async fn send_to_user(&self, user_id: Uuid, event: SignalEvent) -> usize {
        let registry = self.inner.read().await;
        registry
            .sockets
            .values()
            .filter(|entry| entry.session_user == Some(user_id))
            .filter(|entry| entry.tx.send(event.clone()).is_ok())
            .count()
    }

    /// Current members of a room.
    pub async fn room_members(&self, room_id: &str) -> Vec<Uuid> {
        self.inner
            .read()
            .await
            .rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn socket_count(&self) -> usize {
        self.inner.read().await.sockets.len()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }
}
