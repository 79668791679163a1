//! In-memory Stores
//!
//! Lock-protected implementations of every repository and store trait, used by
//! the `memory` storage backend and by tests. Locks are never held across an
//! await point.

mod messages;
mod notifications;
mod presence;
mod rooms;
mod users;

pub use messages::InMemoryMessageRepository;
pub use notifications::InMemoryNotificationRepository;
pub use presence::InMemoryPresenceStore;
pub use rooms::InMemoryRoomRepository;
pub use users::InMemoryUserRepository;
