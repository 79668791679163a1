//! Notification Dispatcher
//!
//! Takes a durable feed from the event bus and turns every persisted chat
//! message into one CHAT notification per recipient. Runs as its own task so
//! a slow or failing notification store never blocks a send, and a burst of
//! sends only queues up instead of being skipped.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::events::EventBus;
use crate::application::services::NotificationService;
use crate::domain::{
    ChatEvent, Message, NewNotification, NotificationFlag, NotificationPayload, SenderMode, UserRepository,
};
use crate::infrastructure::metrics;

pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationService>,
    users: Arc<dyn UserRepository>,
}

impl NotificationDispatcher {
    pub fn new(notifications: Arc<dyn NotificationService>, users: Arc<dyn UserRepository>) -> Self {
        Self { notifications, users }
    }

    /// Subscribe now and process events on a background task until the bus
    /// is dropped.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe_durable();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let ChatEvent::MessageCreated { message } = &*event {
                    self.dispatch(message).await;
                }
            }
            info!("Notification dispatcher stopped");
        })
    }

    /// Create a notification for each recipient of the message. Failures are
    /// logged and counted, never propagated.
    pub async fn dispatch(&self, message: &Message) {
        let title = match self.users.find_by_id(message.from).await {
            Ok(Some(sender)) => sender.display_name(),
            Ok(None) => format!("User {}", message.from),
            Err(e) => {
                warn!(user_id = message.from, error = %e, "Sender lookup failed");
                format!("User {}", message.from)
            }
        };

        for receiver_id in message.to.iter().copied().filter(|id| *id != message.from) {
            let notification = NewNotification {
                sender_mode: SenderMode::User,
                sender_id: message.from,
                receiver_id,
                title: title.clone(),
                message: message.text.clone(),
                flag: NotificationFlag::Chat,
                payload: NotificationPayload {
                    room_id: Some(message.room_id),
                },
            };

            match self.notifications.create(notification).await {
                Ok(Some(_)) => metrics::record_notification("created"),
                Ok(None) => metrics::record_notification("suppressed"),
                Err(e) => {
                    metrics::record_notification("failed");
                    warn!(
                        receiver_id,
                        message_id = message.id,
                        error = %e,
                        "Failed to create chat notification"
                    );
                }
            }
        }
    }
}
