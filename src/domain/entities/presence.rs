//! Presence registry contracts.
//!
//! A user is online exactly when their live connection set is non-empty.
//! Stores mutate that set with atomic add/remove operations scoped by user id;
//! callers never read-modify-write it.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::user::PresenceSnapshot;
use crate::shared::error::AppError;

/// Result of removing a connection from its owner's set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub user_id: i64,
    /// Connections the user still holds
    pub remaining: u64,
}

impl Departure {
    pub fn went_offline(&self) -> bool {
        self.remaining == 0
    }
}

/// Durable user -> live connection set mapping.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Atomically drop `stale` ids from the user's set and add `connection_id`.
    async fn add_connection(&self, user_id: i64, connection_id: &str, stale: &[String]) -> Result<(), AppError>;

    /// Remove a connection from whichever user owns it. `None` if unknown.
    /// When the set becomes empty the store records `last_seen`.
    async fn remove_connection(&self, connection_id: &str) -> Result<Option<Departure>, AppError>;

    /// Connection ids currently recorded for the user.
    async fn connections(&self, user_id: i64) -> Result<Vec<String>, AppError>;

    /// Online flag and last-seen timestamp for each user.
    async fn snapshot(&self, user_ids: &[i64]) -> Result<HashMap<i64, PresenceSnapshot>, AppError>;

    /// Subset of `user_ids` with at least one live connection.
    async fn online_users(&self, user_ids: &[i64]) -> Result<HashSet<i64>, AppError>;
}

/// Live view of the sockets attached to this process.
///
/// Implemented by the socket gateway; the presence service uses it to tell
/// recorded ids that are actually live from leftovers of a crashed process,
/// and the chat service uses it to find who is viewing a room.
#[cfg_attr(test, automock)]
pub trait ConnectionDirectory: Send + Sync {
    fn is_live(&self, connection_id: &str) -> bool;

    /// Users with at least one connection subscribed to the room's channel.
    fn viewing_users(&self, room_id: i64) -> HashSet<i64>;
}
