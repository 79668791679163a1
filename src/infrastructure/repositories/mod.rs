//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **RoomRepository** - Rooms, ordered memberships and unread counters
//! - **MessageRepository** - Message ledger with delivery/read arrays
//! - **UserRepository** - Read-only user profiles
//! - **NotificationRepository** - Durable alerts
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use chat_core::infrastructure::repositories::{PgMessageRepository, PgRoomRepository};
//!
//! fn setup_repositories(pool: PgPool) {
//!     let rooms = PgRoomRepository::new(pool.clone());
//!     let messages = PgMessageRepository::new(pool);
//! }
//! ```

mod message_repository;
mod notification_repository;
mod room_repository;
mod user_repository;

pub use message_repository::PgMessageRepository;
pub use notification_repository::PgNotificationRepository;
pub use room_repository::PgRoomRepository;
pub use user_repository::PgUserRepository;
