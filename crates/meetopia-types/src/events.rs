use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Events sent FROM the server TO a socket.
///
/// Wire shape: `{"event": "user-connected", "data": {"roomId": ..., ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SignalEvent {
    /// First frame on every socket: the id other peers will see as `from`.
    Connected { socket_id: Uuid },

    /// Reply to `join-room` listing who was already there.
    RoomJoined { room_id: String, peers: Vec<Peer> },

    /// Someone joined a room this socket is in.
    UserConnected {
        room_id: String,
        socket_id: Uuid,
        user_id: Option<String>,
    },

    /// Someone left a room this socket is in, or their socket closed.
    UserDisconnected {
        room_id: String,
        socket_id: Uuid,
        user_id: Option<String>,
    },

    Offer { from: Uuid, offer: Value },

    Answer { from: Uuid, answer: Value },

    IceCandidate { from: Uuid, candidate: Value },

    ChatMessage {
        room_id: String,
        message: String,
        sender_id: Uuid,
        user_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The matchmaker paired this user with a peer.
    MatchFound {
        room_id: String,
        peer_id: Uuid,
        common_interests: Vec<String>,
    },

    Error { message: String },
}

/// Commands sent FROM a socket TO the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SignalCommand {
    JoinRoom {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },

    LeaveRoom { room_id: String },

    Offer {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        target: Option<Uuid>,
        offer: Value,
    },

    Answer {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        target: Option<Uuid>,
        answer: Value,
    },

    IceCandidate {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        target: Option<Uuid>,
        candidate: Value,
    },

    ChatMessage { room_id: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub socket_id: Uuid,
    pub user_id: Option<String>,
}
