//! WebSocket Gateway
//!
//! Tracks the sockets of this process and the rooms they are viewing. Event
//! delivery itself happens in each socket task, which subscribes to the event
//! bus and filters by audience.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::domain::ConnectionDirectory;
use crate::infrastructure::metrics;

/// Identified socket
#[derive(Debug, Clone)]
pub struct ConnectedSession {
    pub user_id: i64,
    pub connection_id: String,
    pub rooms: HashSet<i64>,
}

/// Registry of live sockets
pub struct Gateway {
    /// Identified sessions by connection id
    sessions: DashMap<String, ConnectedSession>,
    /// Room ID to connection IDs currently viewing it
    room_sessions: DashMap<i64, HashSet<String>>,
    /// Open sockets, identified or not
    connected: AtomicUsize,
    heartbeat_interval_ms: u64,
}

impl Gateway {
    pub fn new(heartbeat_interval_ms: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            room_sessions: DashMap::new(),
            connected: AtomicUsize::new(0),
            heartbeat_interval_ms,
        }
    }

    pub fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    pub fn socket_opened(&self) {
        self.connected.fetch_add(1, Ordering::Relaxed);
        self.update_metrics();
    }

    pub fn socket_closed(&self) {
        self.connected.fetch_sub(1, Ordering::Relaxed);
        self.update_metrics();
    }

    /// Register an identified socket
    pub fn register_session(&self, connection_id: &str, user_id: i64) {
        self.sessions.insert(
            connection_id.to_string(),
            ConnectedSession {
                user_id,
                connection_id: connection_id.to_string(),
                rooms: HashSet::new(),
            },
        );
        self.update_metrics();

        tracing::info!(user_id, connection_id, "Session registered");
    }

    /// Unregister a socket and drop its room subscriptions
    pub fn unregister_session(&self, connection_id: &str) -> Option<i64> {
        let (_, session) = self.sessions.remove(connection_id)?;

        for room_id in &session.rooms {
            self.room_sessions.remove_if_mut(room_id, |_, ids| {
                ids.remove(connection_id);
                ids.is_empty()
            });
        }
        self.update_metrics();

        tracing::info!(user_id = session.user_id, connection_id, "Session unregistered");
        Some(session.user_id)
    }

    /// Subscribe a socket to a room. Returns false for unknown sockets.
    pub fn join_room(&self, connection_id: &str, room_id: i64) -> bool {
        let Some(mut session) = self.sessions.get_mut(connection_id) else {
            return false;
        };
        session.rooms.insert(room_id);
        drop(session);

        self.room_sessions
            .entry(room_id)
            .or_default()
            .insert(connection_id.to_string());
        true
    }

    pub fn leave_room(&self, connection_id: &str, room_id: i64) {
        if let Some(mut session) = self.sessions.get_mut(connection_id) {
            session.rooms.remove(&room_id);
        }
        self.room_sessions.remove_if_mut(&room_id, |_, ids| {
            ids.remove(connection_id);
            ids.is_empty()
        });
    }

    /// Number of identified sockets
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn update_metrics(&self) {
        metrics::set_websocket_connections(self.connected.load(Ordering::Relaxed), self.sessions.len());
    }
}

impl ConnectionDirectory for Gateway {
    fn is_live(&self, connection_id: &str) -> bool {
        self.sessions.contains_key(connection_id)
    }

    fn viewing_users(&self, room_id: i64) -> HashSet<i64> {
        let Some(ids) = self.room_sessions.get(&room_id) else {
            return HashSet::new();
        };
        let ids: Vec<String> = ids.iter().cloned().collect();
        ids.iter()
            .filter_map(|id| self.sessions.get(id).map(|s| s.user_id))
            .collect()
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(45_000)
    }
}
