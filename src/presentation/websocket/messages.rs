//! WebSocket Message Types
//!
//! Inbound frames are `{"t": <event>, "d": <payload>}`; outbound frames add a
//! per-connection sequence number `s`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::application::dto::response::{
    MessageResponse, NotificationResponse, ReceiptResponse, RoomResponse,
};
use crate::domain::ChatEvent;

/// Events a client may send
#[derive(Debug, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Authenticate the socket; must be the first frame
    Join(JoinPayload),
    /// Start viewing a room: subscribe and mark it read
    JoinRoom(RoomPayload),
    /// Stop viewing a room
    LeaveRoom(RoomPayload),
    /// Send a message
    ChatMessage(ChatMessagePayload),
    /// Graceful close requested by the client
    Disconnecting,
    Heartbeat,
}

#[derive(Debug, Deserialize)]
pub struct JoinPayload {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RoomPayload {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessagePayload {
    pub room_id: String,
    pub message: String,
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// Outgoing frame
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    pub t: &'static str,
    pub s: u64,
    pub d: Value,
}

/// Server-originated event names that are not chat events
pub mod names {
    pub const HELLO: &str = "hello";
    pub const READY: &str = "ready";
    pub const INVALID_SESSION: &str = "invalid-session";
    pub const HEARTBEAT_ACK: &str = "heartbeat-ack";
    pub const ROOM_JOINED: &str = "room-joined";
    pub const ROOM_LEFT: &str = "room-left";
    pub const ERROR: &str = "error";
}

/// Hello payload, sent as soon as the socket opens
#[derive(Debug, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// Ready payload, sent after a successful `join`
#[derive(Debug, Serialize)]
pub struct ReadyPayload {
    pub connection_id: String,
    pub user_id: String,
    pub rooms: Vec<String>,
    pub heartbeat_interval: u64,
}

/// Wire payload of a chat event.
pub fn event_payload(event: &ChatEvent) -> Value {
    let value = match event {
        ChatEvent::RoomActivity { room, .. } => serde_json::to_value(RoomResponse::from(room.clone())),
        ChatEvent::MessageCreated { message } => serde_json::to_value(MessageResponse::from(message.clone())),
        ChatEvent::MessagesDelivered { room_id, user_id, .. } | ChatEvent::MessagesRead { room_id, user_id, .. } => {
            serde_json::to_value(ReceiptResponse {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
            })
        }
        ChatEvent::NotificationCreated { notification } => {
            serde_json::to_value(NotificationResponse::from(notification.clone()))
        }
    };
    value.unwrap_or_default()
}

/// Error payload with the same numeric codes as the HTTP API
pub fn error_payload(code: u16, message: &str) -> Value {
    json!({ "code": code, "message": message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_events() {
        let join: ClientEvent = serde_json::from_str(r#"{"t":"join","d":{"token":"abc"}}"#).unwrap();
        assert!(matches!(join, ClientEvent::Join(JoinPayload { token }) if token == "abc"));

        let send: ClientEvent =
            serde_json::from_str(r#"{"t":"chat-message","d":{"room_id":"5","message":"hi"}}"#).unwrap();
        match send {
            ClientEvent::ChatMessage(p) => {
                assert_eq!(p.room_id, "5");
                assert!(p.reply_to.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        let heartbeat: ClientEvent = serde_json::from_str(r#"{"t":"heartbeat"}"#).unwrap();
        assert!(matches!(heartbeat, ClientEvent::Heartbeat));
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"t":"typing","d":{}}"#).is_err());
    }

    #[test]
    fn test_receipt_payload() {
        let event = ChatEvent::MessagesRead {
            room_id: 4,
            user_id: 9,
            recipients: vec![1],
        };
        assert_eq!(event_payload(&event), json!({"room_id": "4", "user_id": "9"}));
    }
}
