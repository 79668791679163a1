//! Presence Service
//!
//! Connection lifecycle: registering a live connection, reconciling delivery
//! state for messages sent while the user was offline, and unregistering.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::application::events::EventBus;
use crate::domain::{ChatEvent, ConnectionDirectory, Departure, MessageRepository, PresenceStore, RoomRepository};
use crate::shared::error::AppError;

/// Presence service trait
#[async_trait]
pub trait PresenceService: Send + Sync {
    /// Register a live connection for the user, pruning recorded ids that are
    /// no longer live, then mark pending messages delivered.
    async fn connect(&self, user_id: i64, connection_id: &str) -> Result<ConnectOutcome, AppError>;

    /// Unregister a connection. Unknown ids are a no-op.
    async fn disconnect(&self, connection_id: &str) -> Result<Option<Departure>, AppError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// Recorded ids dropped because their sockets are gone
    pub pruned: Vec<String>,
    /// Rooms where pending messages were marked delivered
    pub delivered_rooms: Vec<i64>,
    /// Every room the user belongs to
    pub rooms: Vec<i64>,
}

/// PresenceService implementation
pub struct PresenceServiceImpl {
    store: Arc<dyn PresenceStore>,
    directory: Arc<dyn ConnectionDirectory>,
    messages: Arc<dyn MessageRepository>,
    rooms: Arc<dyn RoomRepository>,
    events: EventBus,
}

impl PresenceServiceImpl {
    pub fn new(
        store: Arc<dyn PresenceStore>,
        directory: Arc<dyn ConnectionDirectory>,
        messages: Arc<dyn MessageRepository>,
        rooms: Arc<dyn RoomRepository>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            directory,
            messages,
            rooms,
            events,
        }
    }
}

#[async_trait]
impl PresenceService for PresenceServiceImpl {
    #[instrument(skip(self), fields(user_id = %user_id, connection_id = %connection_id))]
    async fn connect(&self, user_id: i64, connection_id: &str) -> Result<ConnectOutcome, AppError> {
        let pruned: Vec<String> = self
            .store
            .connections(user_id)
            .await?
            .into_iter()
            .filter(|id| id != connection_id && !self.directory.is_live(id))
            .collect();
        if !pruned.is_empty() {
            debug!(count = pruned.len(), "Pruning stale connection ids");
        }
        self.store.add_connection(user_id, connection_id, &pruned).await?;

        let delivered_rooms = self.messages.mark_delivered(user_id).await?;
        let memberships = self.rooms.memberships_for_user(user_id).await?;

        let mut rooms = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let recipients: Vec<i64> = membership.member_ids.into_iter().filter(|id| *id != user_id).collect();
            if !recipients.is_empty() {
                self.events.publish(ChatEvent::MessagesDelivered {
                    room_id: membership.room_id,
                    user_id,
                    recipients,
                });
            }
            rooms.push(membership.room_id);
        }

        info!(pending_rooms = delivered_rooms.len(), "User connected");
        Ok(ConnectOutcome {
            pruned,
            delivered_rooms,
            rooms,
        })
    }

    #[instrument(skip(self), fields(connection_id = %connection_id))]
    async fn disconnect(&self, connection_id: &str) -> Result<Option<Departure>, AppError> {
        let departure = self.store.remove_connection(connection_id).await?;
        match &departure {
            Some(d) if d.went_offline() => info!(user_id = d.user_id, "User went offline"),
            Some(d) => debug!(user_id = d.user_id, remaining = d.remaining, "Connection closed"),
            None => debug!("Unknown connection, nothing to remove"),
        }
        Ok(departure)
    }
}
