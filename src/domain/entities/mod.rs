//! # Domain Entities
//!
//! Core domain entities of the chat core. Persistent entities map directly to
//! their corresponding database tables.
//!
//! - **UserProfile**: read-only view of an externally owned user account
//! - **Room**: a conversation with its members and unread counters
//! - **Message**: immutable content plus growing delivery/read/deletion sets
//! - **Notification**: durable alert addressed to one receiver
//! - **Presence**: live connection tracking contracts
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod message;
mod notification;
mod presence;
mod room;
mod user;

pub use message::{Message, MessageFilter, MessageRepository};
pub use notification::{
    NewNotification, Notification, NotificationFlag, NotificationPayload, NotificationRepository, SenderMode,
};
pub use presence::{ConnectionDirectory, Departure, PresenceStore};
pub use room::{
    pair_key, LastMessage, NewRoom, Room, RoomFilter, RoomMember, RoomMembership, RoomReference, RoomRepository,
};
pub use user::{name_matches, PresenceSnapshot, UserProfile, UserRepository};

#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use notification::MockNotificationRepository;
#[cfg(test)]
pub use presence::{MockConnectionDirectory, MockPresenceStore};
#[cfg(test)]
pub use room::MockRoomRepository;
#[cfg(test)]
pub use user::MockUserRepository;
