//! In-memory Notification Repository

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{Notification, NotificationRepository, Page, Pagination};
use crate::shared::error::AppError;

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError> {
        self.notifications.write().push(notification.clone());
        Ok(notification.clone())
    }

    async fn list_for_receiver(&self, receiver_id: i64, page: Pagination) -> Result<Page<Notification>, AppError> {
        let mut items: Vec<Notification> = self
            .notifications
            .read()
            .iter()
            .filter(|n| n.receiver_id == receiver_id)
            .cloned()
            .collect();

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = items.len() as u64;
        Ok(Page::new(page.apply(items), total))
    }

    async fn count_unseen(&self, receiver_id: i64) -> Result<u64, AppError> {
        Ok(self
            .notifications
            .read()
            .iter()
            .filter(|n| n.receiver_id == receiver_id && !n.seen)
            .count() as u64)
    }

    async fn mark_seen(&self, receiver_id: i64, notification_id: Option<i64>) -> Result<u64, AppError> {
        let mut changed = 0;
        for n in self.notifications.write().iter_mut() {
            let selected = n.receiver_id == receiver_id && notification_id.map_or(true, |id| n.id == id);
            if selected && !n.seen {
                n.seen = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
