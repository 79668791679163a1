//! Notification Service
//!
//! Durable alerts with per-receiver in-app preference, listings and seen
//! acknowledgement.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::application::events::EventBus;
use crate::domain::{
    ChatEvent, NewNotification, Notification, NotificationRepository, Page, Pagination, UserRepository,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Notification service trait
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Persist and push a notification. Returns `None` when the receiver has
    /// in-app notifications disabled.
    async fn create(&self, notification: NewNotification) -> Result<Option<Notification>, NotificationError>;

    /// Receiver's notifications, newest first, with unseen count.
    async fn list(&self, receiver_id: i64, page: Pagination) -> Result<NotificationList, NotificationError>;

    /// Mark one notification (or all) seen. Returns the remaining unseen count.
    async fn mark_seen(&self, receiver_id: i64, notification_id: Option<i64>) -> Result<u64, NotificationError>;
}

#[derive(Debug, Clone)]
pub struct NotificationList {
    pub notifications: Page<Notification>,
    pub unread_count: u64,
}

/// Notification service errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Receiver not found: {0}")]
    ReceiverNotFound(i64),

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<NotificationError> for AppError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::ReceiverNotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            NotificationError::Storage(e) => e,
        }
    }
}

/// NotificationService implementation
pub struct NotificationServiceImpl {
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    events: EventBus,
    id_generator: Arc<SnowflakeGenerator>,
}

impl NotificationServiceImpl {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        users: Arc<dyn UserRepository>,
        events: EventBus,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            notifications,
            users,
            events,
            id_generator,
        }
    }
}

#[async_trait]
impl NotificationService for NotificationServiceImpl {
    #[instrument(skip(self, notification), fields(receiver_id = %notification.receiver_id, flag = ?notification.flag))]
    async fn create(&self, notification: NewNotification) -> Result<Option<Notification>, NotificationError> {
        let receiver = self
            .users
            .find_by_id(notification.receiver_id)
            .await?
            .ok_or(NotificationError::ReceiverNotFound(notification.receiver_id))?;

        if !receiver.in_app_notifications {
            debug!("In-app notifications disabled, skipping");
            return Ok(None);
        }

        let notification = notification.into_notification(self.id_generator.generate(), Utc::now());
        let saved = self.notifications.create(&notification).await?;

        self.events.publish(ChatEvent::NotificationCreated {
            notification: saved.clone(),
        });
        Ok(Some(saved))
    }

    async fn list(&self, receiver_id: i64, page: Pagination) -> Result<NotificationList, NotificationError> {
        let notifications = self.notifications.list_for_receiver(receiver_id, page).await?;
        let unread_count = self.notifications.count_unseen(receiver_id).await?;
        Ok(NotificationList {
            notifications,
            unread_count,
        })
    }

    #[instrument(skip(self), fields(receiver_id = %receiver_id))]
    async fn mark_seen(&self, receiver_id: i64, notification_id: Option<i64>) -> Result<u64, NotificationError> {
        let changed = self.notifications.mark_seen(receiver_id, notification_id).await?;
        debug!(changed, "Notifications marked seen");
        Ok(self.notifications.count_unseen(receiver_id).await?)
    }
}
