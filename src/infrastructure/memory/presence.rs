//! In-memory Presence Store

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::{Departure, PresenceSnapshot, PresenceStore};
use crate::shared::error::AppError;

#[derive(Default)]
struct PresenceTable {
    connections: HashMap<i64, HashSet<String>>,
    owners: HashMap<String, i64>,
    last_seen: HashMap<i64, DateTime<Utc>>,
}

/// Presence store for single-process deployments and tests.
///
/// Each operation runs under one mutex guard, matching the atomicity of the
/// Redis implementation.
#[derive(Default)]
pub struct InMemoryPresenceStore {
    table: Mutex<PresenceTable>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn add_connection(&self, user_id: i64, connection_id: &str, stale: &[String]) -> Result<(), AppError> {
        let mut table = self.table.lock();
        let set = table.connections.entry(user_id).or_default();
        for id in stale {
            set.remove(id);
        }
        set.insert(connection_id.to_string());

        for id in stale {
            if table.owners.get(id) == Some(&user_id) {
                table.owners.remove(id);
            }
        }
        table.owners.insert(connection_id.to_string(), user_id);
        Ok(())
    }

    async fn remove_connection(&self, connection_id: &str) -> Result<Option<Departure>, AppError> {
        let mut table = self.table.lock();
        let Some(user_id) = table.owners.remove(connection_id) else {
            return Ok(None);
        };

        let remaining = match table.connections.get_mut(&user_id) {
            Some(set) => {
                set.remove(connection_id);
                set.len() as u64
            }
            None => 0,
        };
        if remaining == 0 {
            table.connections.remove(&user_id);
            table.last_seen.insert(user_id, Utc::now());
        }

        Ok(Some(Departure { user_id, remaining }))
    }

    async fn connections(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let table = self.table.lock();
        let mut ids: Vec<String> = table
            .connections
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    async fn snapshot(&self, user_ids: &[i64]) -> Result<HashMap<i64, PresenceSnapshot>, AppError> {
        let table = self.table.lock();
        Ok(user_ids
            .iter()
            .map(|id| {
                let online = table.connections.get(id).is_some_and(|set| !set.is_empty());
                let snapshot = PresenceSnapshot {
                    online,
                    last_seen: table.last_seen.get(id).copied(),
                };
                (*id, snapshot)
            })
            .collect())
    }

    async fn online_users(&self, user_ids: &[i64]) -> Result<HashSet<i64>, AppError> {
        let table = self.table.lock();
        Ok(user_ids
            .iter()
            .copied()
            .filter(|id| table.connections.get(id).is_some_and(|set| !set.is_empty()))
            .collect())
    }
}
