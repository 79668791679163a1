//! WebSocket Gateway
//!
//! Real-time delivery of chat events via WebSocket connections.

pub mod gateway;
pub mod handler;
pub mod messages;
pub mod session;

pub use gateway::Gateway;
pub use handler::ws_handler;
pub use messages::{ClientEvent, ServerFrame};
pub use session::SessionState;
