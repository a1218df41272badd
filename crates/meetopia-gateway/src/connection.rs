use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use meetopia_types::events::{SignalCommand, SignalEvent};

use crate::dispatcher::{Dispatcher, RelayScope};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

pub const MAX_CHAT_MESSAGE_CHARS: usize = 2000;
pub const MAX_ROOM_ID_CHARS: usize = 128;

/// Session-derived identity of a socket, if the upgrade request carried one.
#[derive(Debug, Clone)]
pub struct SocketIdentity {
    pub user_id: Uuid,
    pub username: String,
}

/// Missed-pong counter for one socket.
#[derive(Debug, Default)]
struct Heartbeat {
    missed: u8,
}

impl Heartbeat {
    /// Record one interval. Returns false once the socket should be dropped.
    fn tick(&mut self, pong_seen: bool) -> bool {
        if pong_seen {
            self.missed = 0;
        } else {
            self.missed = self.missed.saturating_add(1);
        }
        self.missed < MAX_MISSED_PONGS
    }
}

/// Drive one signaling socket until either side closes it.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, identity: Option<SocketIdentity>) {
    let (mut sender, receiver) = socket.split();

    let (socket_id, events) = dispatcher
        .register(identity.as_ref().map(|id| id.user_id))
        .await;

    match &identity {
        Some(id) => info!("{} ({}) connected as socket {}", id.username, id.user_id, socket_id),
        None => info!("Anonymous socket {} connected", socket_id),
    }

    if send_event(&mut sender, &SignalEvent::Connected { socket_id }).await.is_err() {
        dispatcher.unregister(socket_id).await;
        return;
    }

    run_connection_loop(sender, receiver, events, dispatcher.clone(), socket_id).await;

    let rooms = dispatcher.unregister(socket_id).await;
    info!("Socket {} disconnected (left {} rooms)", socket_id, rooms.len());
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut events: tokio::sync::mpsc::UnboundedReceiver<SignalEvent>,
    dispatcher: Dispatcher,
    socket_id: Uuid,
) {
    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward dispatcher events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut pongs = Heartbeat::default();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if !pongs.tick(pong_flag_send.swap(false, Ordering::Acquire)) {
                        warn!("Socket {} heartbeat timeout (missed {} pongs), dropping", socket_id, pongs.missed);
                        break;
                    }
                    if sender.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_text(&dispatcher, socket_id, text.as_str()).await,
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &SignalEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode {:?}: {}", event, e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

/// Check a room id from the wire.
pub fn validate_room_id(room_id: &str) -> Result<(), String> {
    if room_id.trim().is_empty() {
        return Err("room id must not be empty".into());
    }
    if room_id.chars().count() > MAX_ROOM_ID_CHARS {
        return Err(format!("room id longer than {} characters", MAX_ROOM_ID_CHARS));
    }
    Ok(())
}

/// Check a chat message from the wire.
pub fn validate_chat_message(message: &str) -> Result<(), String> {
    if message.trim().is_empty() {
        return Err("message must not be empty".into());
    }
    if message.chars().count() > MAX_CHAT_MESSAGE_CHARS {
        return Err(format!("message longer than {} characters", MAX_CHAT_MESSAGE_CHARS));
    }
    Ok(())
}

/// Decode one text frame and run it. Undecodable frames get an `error` event back.
pub async fn handle_text(dispatcher: &Dispatcher, socket_id: Uuid, text: &str) {
    match serde_json::from_str::<SignalCommand>(text) {
        Ok(cmd) => handle_command(dispatcher, socket_id, cmd).await,
        Err(e) => {
            let raw: String = text.chars().take(200).collect();
            warn!("Socket {} bad command: {} -- raw: {}", socket_id, e, raw);
            dispatcher
                .send_to_socket(socket_id, SignalEvent::Error { message: "malformed command".into() })
                .await;
        }
    }
}

pub async fn handle_command(dispatcher: &Dispatcher, socket_id: Uuid, cmd: SignalCommand) {
    let result: Result<(), String> = match cmd {
        SignalCommand::JoinRoom { room_id, user_id } => match validate_room_id(&room_id) {
            Ok(()) => match dispatcher.join_room(socket_id, &room_id, user_id).await {
                Ok(peers) => {
                    info!("Socket {} joined room {} ({} peers)", socket_id, room_id, peers.len());
                    dispatcher
                        .send_to_socket(socket_id, SignalEvent::RoomJoined { room_id, peers })
                        .await;
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e),
        },

        SignalCommand::LeaveRoom { room_id } => {
            if dispatcher.leave_room(socket_id, &room_id).await {
                info!("Socket {} left room {}", socket_id, room_id);
            }
            Ok(())
        }

        SignalCommand::Offer { room_id, target, offer } => {
            debug!("Socket {} -> offer", socket_id);
            let scope = RelayScope { room_id: room_id.as_deref(), target };
            let event = SignalEvent::Offer { from: socket_id, offer };
            dispatcher.relay(socket_id, scope, event).await.map(|_| ()).map_err(|e| e.to_string())
        }

        SignalCommand::Answer { room_id, target, answer } => {
            debug!("Socket {} -> answer", socket_id);
            let scope = RelayScope { room_id: room_id.as_deref(), target };
            let event = SignalEvent::Answer { from: socket_id, answer };
            dispatcher.relay(socket_id, scope, event).await.map(|_| ()).map_err(|e| e.to_string())
        }

        // Candidates are chatty; keep them at trace level
        SignalCommand::IceCandidate { room_id, target, candidate } => {
            tracing::trace!("Socket {} -> ice-candidate", socket_id);
            let scope = RelayScope { room_id: room_id.as_deref(), target };
            let event = SignalEvent::IceCandidate { from: socket_id, candidate };
            dispatcher.relay(socket_id, scope, event).await.map(|_| ()).map_err(|e| e.to_string())
        }

        SignalCommand::ChatMessage { room_id, message } => match validate_chat_message(&message) {
            Ok(()) => dispatcher
                .chat(socket_id, &room_id, message)
                .await
                .map(|delivered| debug!("Socket {} chat to {} ({} recipients)", socket_id, room_id, delivered))
                .map_err(|e| e.to_string()),
            Err(e) => Err(e),
        },
    };

    if let Err(message) = result {
        debug!("Socket {} command refused: {}", socket_id, message);
        dispatcher
            .send_to_socket(socket_id, SignalEvent::Error { message })
            .await;
    }
}
