//! In-memory Message Repository

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{Message, MessageFilter, MessageRepository, Page, Pagination};
use crate::shared::error::AppError;

/// Messages keyed by Snowflake id, which sorts in creation order.
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<BTreeMap<i64, Message>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        let mut messages = self.messages.write();
        if messages.contains_key(&message.id) {
            return Err(AppError::Conflict(format!("Message {} already exists", message.id)));
        }
        messages.insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self.messages.read().get(&id).cloned())
    }

    async fn list(&self, filter: MessageFilter, page: Pagination) -> Result<Page<Message>, AppError> {
        let mut matching: Vec<Message> = self
            .messages
            .read()
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();

        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let total = matching.len() as u64;
        Ok(Page::new(page.apply(matching), total))
    }

    async fn mark_delivered(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let mut rooms = Vec::new();
        for message in self.messages.write().values_mut() {
            if message.mark_delivered(user_id) && !rooms.contains(&message.room_id) {
                rooms.push(message.room_id);
            }
        }
        Ok(rooms)
    }

    async fn mark_room_read(&self, room_id: i64, user_id: i64) -> Result<u64, AppError> {
        let mut changed = 0;
        for message in self.messages.write().values_mut() {
            if message.room_id == room_id && message.mark_read(user_id) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn soft_delete(&self, message_id: i64, user_id: i64) -> Result<bool, AppError> {
        match self.messages.write().get_mut(&message_id) {
            Some(message) => {
                message.deleted_by.insert(user_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
