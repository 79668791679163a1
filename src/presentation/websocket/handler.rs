//! WebSocket Connection Handler
//!
//! One task per socket: wait for `join`, register presence, then relay chat
//! events addressed to the user and handle inbound frames until the socket
//! closes.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, timeout};
use uuid::Uuid;

use super::messages::{
    error_payload, event_payload, names, ChatMessagePayload, ClientEvent, HelloPayload, ReadyPayload, ServerFrame,
};
use super::session::SessionState;
use crate::application::services::SendMessageDto;
use crate::domain::ChatEvent;
use crate::infrastructure::metrics;
use crate::presentation::middleware::verify_token;
use crate::shared::error::AppError;
use crate::shared::validation::parse_id_field;
use crate::startup::AppState;

/// Grace period on top of the heartbeat interval before a silent socket is dropped
const HEARTBEAT_GRACE_MS: u64 = 10_000;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Outbound half of a socket: sequences frames and hands them to the writer task.
struct Outbox {
    session: SessionState,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl Outbox {
    fn send(&mut self, t: &'static str, d: serde_json::Value) -> bool {
        let frame = ServerFrame {
            t,
            s: self.session.next_sequence(),
            d,
        };
        self.tx.send(frame).is_ok()
    }

    fn send_payload<T: Serialize>(&mut self, t: &'static str, payload: &T) -> bool {
        self.send(t, serde_json::to_value(payload).unwrap_or_default())
    }

    fn send_error(&mut self, error: &AppError) -> bool {
        let (_, code) = error.status_and_code();
        let message = match error {
            AppError::Internal(_) | AppError::Database(_) | AppError::Redis(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        self.send(names::ERROR, error_payload(code, &message))
    }
}

enum Flow {
    Continue,
    Close,
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    state.gateway.socket_opened();
    tracing::debug!(connection_id = %connection_id, "New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    // Writer task: forwards sequenced frames to the socket
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Subscribed before `hello` and presence registration: anything marked
    // delivered to this connection must also reach its receiver.
    let mut events = state.events.subscribe();

    let mut outbox = Outbox {
        session: SessionState::new(connection_id.clone()),
        tx,
    };
    outbox.send_payload(
        names::HELLO,
        &HelloPayload {
            heartbeat_interval: state.gateway.heartbeat_interval(),
        },
    );

    if let Some(user_id) = identify(&state, &mut receiver, &mut outbox).await {
        outbox.session.user_id = user_id;
        run_session(&state, &mut receiver, &mut events, &mut outbox).await;

        state.gateway.unregister_session(&connection_id);
        if let Err(e) = state.presence.disconnect(&connection_id).await {
            tracing::error!(connection_id = %connection_id, error = %e, "Failed to unregister presence");
        }
        tracing::info!(user_id, connection_id = %connection_id, "User disconnected");
    }

    // Let queued frames (e.g. invalid-session) flush before the writer goes away
    drop(events);
    drop(outbox);
    let _ = timeout(Duration::from_millis(100), sender_task).await;
    state.gateway.socket_closed();
}

/// Wait for `join`, verify its token and register the connection.
async fn identify(state: &AppState, receiver: &mut SplitStream<WebSocket>, outbox: &mut Outbox) -> Option<i64> {
    let identify_timeout = Duration::from_secs(state.settings.websocket.identify_timeout_secs);
    let token = timeout(identify_timeout, async {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::Join(payload)) => return Some(payload.token),
                    Ok(ClientEvent::Disconnecting) => return None,
                    _ => {
                        tracing::trace!("Ignoring frame before join");
                    }
                },
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => continue,
            }
        }
        None
    })
    .await;

    let connection_id = outbox.session.connection_id.clone();
    let token = match token {
        Ok(Some(token)) => token,
        Ok(None) => {
            tracing::debug!(connection_id = %connection_id, "Connection closed before join");
            return None;
        }
        Err(_) => {
            tracing::debug!(connection_id = %connection_id, "Join timeout");
            outbox.send(names::INVALID_SESSION, json!({ "reason": "timeout" }));
            return None;
        }
    };

    let user_id = match verify_token(&state.settings.jwt.secret, &token) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "Invalid token");
            outbox.send(names::INVALID_SESSION, json!({ "reason": "unauthorized" }));
            return None;
        }
    };

    // Registered before presence so the new id counts as live while pruning.
    state.gateway.register_session(&connection_id, user_id);
    let outcome = match state.presence.connect(user_id, &connection_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, error = %e, "Failed to register presence");
            state.gateway.unregister_session(&connection_id);
            outbox.send_error(&e);
            return None;
        }
    };

    outbox.send_payload(
        names::READY,
        &ReadyPayload {
            connection_id: connection_id.clone(),
            user_id: user_id.to_string(),
            rooms: outcome.rooms.iter().map(|id| id.to_string()).collect(),
            heartbeat_interval: state.gateway.heartbeat_interval(),
        },
    );
    tracing::info!(user_id, connection_id = %connection_id, pruned = outcome.pruned.len(), "User connected");
    Some(user_id)
}

/// Main loop of an identified socket.
async fn run_session(
    state: &AppState,
    receiver: &mut SplitStream<WebSocket>,
    events: &mut broadcast::Receiver<Arc<ChatEvent>>,
    outbox: &mut Outbox,
) {
    let user_id = outbox.session.user_id;
    let connection_id = outbox.session.connection_id.clone();

    let heartbeat_timeout_ms = state.gateway.heartbeat_interval() + HEARTBEAT_GRACE_MS;
    let mut heartbeat_check = interval(Duration::from_millis(heartbeat_timeout_ms));
    heartbeat_check.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match handle_message(state, outbox, &text).await {
                            Ok(Flow::Continue) => {}
                            Ok(Flow::Close) => break,
                            Err(e) => {
                                tracing::debug!(connection_id = %connection_id, error = %e, "Error handling frame");
                                if !outbox.send_error(&e) {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if event.is_for(user_id) && !relay(outbox, &event) {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(connection_id = %connection_id, skipped, "Event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::error!("Event bus closed");
                        break;
                    }
                }
            }

            _ = heartbeat_check.tick() => {
                if !outbox.session.is_alive(heartbeat_timeout_ms) {
                    tracing::info!(connection_id = %connection_id, "Heartbeat timeout, closing connection");
                    break;
                }
            }
        }
    }
}

fn relay(outbox: &mut Outbox, event: &Arc<ChatEvent>) -> bool {
    let name = event.name();
    metrics::record_socket_event(name);
    outbox.send(name, event_payload(event))
}

/// Handle one inbound frame of an identified socket
async fn handle_message(state: &AppState, outbox: &mut Outbox, text: &str) -> Result<Flow, AppError> {
    let event: ClientEvent =
        serde_json::from_str(text).map_err(|e| AppError::BadRequest(format!("Invalid frame: {}", e)))?;
    let user_id = outbox.session.user_id;
    let connection_id = outbox.session.connection_id.clone();

    match event {
        ClientEvent::Heartbeat => {
            outbox.session.heartbeat();
            outbox.send(names::HEARTBEAT_ACK, serde_json::Value::Null);
        }

        ClientEvent::JoinRoom(payload) => {
            let room_id = parse_id_field("room_id", &payload.room_id)?;
            state.gateway.join_room(&connection_id, room_id);
            match state.chat.mark_room_read(room_id, user_id).await {
                Ok(read_count) => {
                    outbox.send(
                        names::ROOM_JOINED,
                        json!({ "room_id": room_id.to_string(), "read_count": read_count }),
                    );
                }
                Err(e) => {
                    state.gateway.leave_room(&connection_id, room_id);
                    return Err(e.into());
                }
            }
        }

        ClientEvent::LeaveRoom(payload) => {
            let room_id = parse_id_field("room_id", &payload.room_id)?;
            state.gateway.leave_room(&connection_id, room_id);
            outbox.send(names::ROOM_LEFT, json!({ "room_id": room_id.to_string() }));
        }

        ClientEvent::ChatMessage(payload) => {
            let request = send_message_dto(payload)?;
            // The sender's sockets receive the message back through the bus.
            state.chat.send_message(user_id, request).await?;
        }

        ClientEvent::Disconnecting => return Ok(Flow::Close),

        ClientEvent::Join(_) => {
            return Err(AppError::BadRequest("Connection already joined".into()));
        }
    }

    Ok(Flow::Continue)
}

fn send_message_dto(payload: ChatMessagePayload) -> Result<SendMessageDto, AppError> {
    Ok(SendMessageDto {
        room_id: parse_id_field("room_id", &payload.room_id)?,
        text: payload.message,
        reply_to: payload
            .reply_to
            .as_deref()
            .map(|id| parse_id_field("reply_to", id))
            .transpose()?,
    })
}
