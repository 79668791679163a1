//! Domain events published by the chat core.
//!
//! Every state change that other parties must learn about is published as a
//! [`ChatEvent`]. Subscribers (the socket gateway, the notification
//! dispatcher) decide independently what to do with it; the publisher never
//! calls them directly.

use super::entities::{Message, Notification, Room};

#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A room was created or received a message; listed members should
    /// refresh their room list.
    RoomActivity { room: Room, recipients: Vec<i64> },

    /// A message was persisted. The sender's own connections receive it too.
    MessageCreated { message: Message },

    /// `user_id` came online and pending messages in `room_id` were
    /// marked delivered.
    MessagesDelivered {
        room_id: i64,
        user_id: i64,
        recipients: Vec<i64>,
    },

    /// `user_id` viewed `room_id` and its messages were marked read.
    MessagesRead {
        room_id: i64,
        user_id: i64,
        recipients: Vec<i64>,
    },

    /// A notification was persisted for its receiver.
    NotificationCreated { notification: Notification },
}

impl ChatEvent {
    /// Event name on the socket wire.
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::RoomActivity { .. } => "new-room",
            ChatEvent::MessageCreated { .. } => "chat-message",
            ChatEvent::MessagesDelivered { .. } => "chat-delivered",
            ChatEvent::MessagesRead { .. } => "chat-read",
            ChatEvent::NotificationCreated { .. } => "new-notification",
        }
    }

    /// Whether `user_id`'s live connections should receive this event.
    pub fn is_for(&self, user_id: i64) -> bool {
        match self {
            ChatEvent::MessageCreated { message, .. } => message.from == user_id || message.to.contains(&user_id),
            ChatEvent::NotificationCreated { notification } => notification.receiver_id == user_id,
            ChatEvent::RoomActivity { recipients, .. }
            | ChatEvent::MessagesDelivered { recipients, .. }
            | ChatEvent::MessagesRead { recipients, .. } => recipients.contains(&user_id),
        }
    }
}
