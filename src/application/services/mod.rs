//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ChatService**: Rooms, messages, delivery and read tracking
//! - **PresenceService**: Connection lifecycle and delivery reconciliation
//! - **NotificationService**: Durable alerts and seen acknowledgement

pub mod chat_service;
pub mod notification_service;
pub mod presence_service;

// Re-export chat service types
pub use chat_service::{
    ChatError, ChatPolicy, ChatService, ChatServiceImpl, MemberView, RoomView, SendMessageDto, SentMessage,
    StartChatDto, StartedChat,
};

// Re-export notification service types
pub use notification_service::{
    NotificationError, NotificationList, NotificationService, NotificationServiceImpl,
};

// Re-export presence service types
pub use presence_service::{ConnectOutcome, PresenceService, PresenceServiceImpl};
