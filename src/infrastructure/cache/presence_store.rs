//! Redis Presence Store
//!
//! Connection sets shared by every gateway node. Each user owns a SET of live
//! connection ids; each connection id maps back to its user so a bare id is
//! enough to unregister it.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::{debug, instrument};

use super::keys;
use crate::domain::{Departure, PresenceSnapshot, PresenceStore};
use crate::shared::error::AppError;

/// Drop the owner mapping, remove the id from the user's set and stamp
/// `last_seen` when the set empties, all in one server-side step.
///
/// KEYS[1] owner key, ARGV: connections prefix, connection id, last-seen
/// prefix, now (ms). Returns nil for unknown ids, else `{user, remaining}`.
static REMOVE_CONNECTION: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local user = redis.call('GET', KEYS[1])
        if not user then
            return nil
        end
        redis.call('DEL', KEYS[1])
        local set_key = ARGV[1] .. user
        redis.call('SREM', set_key, ARGV[2])
        local remaining = redis.call('SCARD', set_key)
        if remaining == 0 then
            redis.call('SET', ARGV[3] .. user, ARGV[4])
        end
        return {tonumber(user), remaining}
        "#,
    )
});

/// Presence store backed by Redis.
#[derive(Clone)]
pub struct RedisPresenceStore {
    redis: ConnectionManager,
}

impl RedisPresenceStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    async fn connection_counts(&self, user_ids: &[i64]) -> Result<Vec<u64>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in user_ids {
            pipe.cmd("SCARD").arg(keys::connections(id));
        }

        let mut conn = self.redis.clone();
        Ok(pipe.query_async::<Vec<u64>>(&mut conn).await?)
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    #[instrument(skip(self, stale), fields(stale = stale.len()))]
    async fn add_connection(&self, user_id: i64, connection_id: &str, stale: &[String]) -> Result<(), AppError> {
        let set_key = keys::connections(user_id);
        let mut pipe = redis::pipe();
        pipe.atomic();

        if !stale.is_empty() {
            pipe.cmd("SREM").arg(&set_key).arg(stale).ignore();
            let owner_keys: Vec<String> = stale.iter().map(|id| keys::owner(id)).collect();
            pipe.cmd("DEL").arg(owner_keys).ignore();
        }
        pipe.cmd("SADD").arg(&set_key).arg(connection_id).ignore();
        pipe.cmd("SET").arg(keys::owner(connection_id)).arg(user_id).ignore();

        let mut conn = self.redis.clone();
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_connection(&self, connection_id: &str) -> Result<Option<Departure>, AppError> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.redis.clone();
        let result: Option<(i64, u64)> = REMOVE_CONNECTION
            .key(keys::owner(connection_id))
            .arg(keys::CONNECTIONS)
            .arg(connection_id)
            .arg(keys::LAST_SEEN)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;

        if result.is_none() {
            debug!("Connection id had no owner");
        }
        Ok(result.map(|(user_id, remaining)| Departure { user_id, remaining }))
    }

    async fn connections(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let mut conn = self.redis.clone();
        let mut ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(keys::connections(user_id))
            .query_async(&mut conn)
            .await?;
        ids.sort();
        Ok(ids)
    }

    async fn snapshot(&self, user_ids: &[i64]) -> Result<HashMap<i64, PresenceSnapshot>, AppError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let counts = self.connection_counts(user_ids).await?;
        let last_seen_keys: Vec<String> = user_ids.iter().map(keys::last_seen).collect();
        let mut conn = self.redis.clone();
        let last_seen: Vec<Option<i64>> = redis::cmd("MGET").arg(&last_seen_keys).query_async(&mut conn).await?;

        Ok(user_ids
            .iter()
            .zip(counts)
            .zip(last_seen)
            .map(|((id, count), seen)| {
                let snapshot = PresenceSnapshot {
                    online: count > 0,
                    last_seen: seen.and_then(DateTime::from_timestamp_millis),
                };
                (*id, snapshot)
            })
            .collect())
    }

    async fn online_users(&self, user_ids: &[i64]) -> Result<HashSet<i64>, AppError> {
        let counts = self.connection_counts(user_ids).await?;
        Ok(user_ids
            .iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(id, _)| *id)
            .collect())
    }
}
