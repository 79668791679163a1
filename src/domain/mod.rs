//! # Domain Layer
//!
//! The domain layer contains the core business logic of the chat core.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (Room, Message, Notification, presence)
//! - **events**: Events published after state changes
//! - **value_objects**: Immutable value types (Pagination, Page)
//! - **services**: Domain services for complex business logic
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Pure business logic and domain rules
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior

pub mod entities;
pub mod events;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use events::ChatEvent;
pub use value_objects::*;
