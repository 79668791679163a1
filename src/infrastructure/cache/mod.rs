//! Cache Module
//!
//! Redis connection management and the shared presence store.
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_core::infrastructure::cache::{create_redis_client, RedisPresenceStore};
//!
//! let conn = create_redis_client(&settings.redis).await?;
//! let presence = RedisPresenceStore::new(conn);
//! ```

mod presence_store;

pub use presence_store::RedisPresenceStore;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Errors
/// Returns `redis::RedisError` if the URL is invalid or the first
/// connection cannot be established.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(settings: &RedisSettings) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Round-trip PING used by the readiness endpoint.
pub async fn ping(conn: &ConnectionManager) -> Result<(), redis::RedisError> {
    let mut conn = conn.clone();
    redis::cmd("PING").query_async::<String>(&mut conn).await.map(|_| ())
}

/// Cache key prefixes for presence data.
///
/// ```rust,ignore
/// use chat_core::infrastructure::cache::keys;
///
/// let set_key = keys::connections(42); // "presence:conns:42"
/// ```
pub mod keys {
    /// SET of live connection ids per user
    pub const CONNECTIONS: &str = "presence:conns:";

    /// Owning user id per connection id
    pub const OWNER: &str = "presence:owner:";

    /// Epoch millis of the moment a user's last connection closed
    pub const LAST_SEEN: &str = "presence:last_seen:";

    #[inline]
    pub fn connections(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", CONNECTIONS, user_id)
    }

    #[inline]
    pub fn owner(connection_id: impl std::fmt::Display) -> String {
        format!("{}{}", OWNER, connection_id)
    }

    #[inline]
    pub fn last_seen(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", LAST_SEEN, user_id)
    }
}
