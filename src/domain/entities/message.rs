//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Page, Pagination};
use crate::shared::error::AppError;

/// Represents a message in a room.
///
/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - room_id: BIGINT NOT NULL REFERENCES rooms(id)
/// - sender_id: BIGINT NOT NULL
/// - to_ids / delivered_to / read_by / deleted_by: BIGINT[] NOT NULL
/// - text: TEXT NOT NULL
/// - is_forwarded: BOOLEAN NOT NULL DEFAULT FALSE
/// - reply_to_id: BIGINT NULL REFERENCES messages(id)
/// - created_at: TIMESTAMPTZ NOT NULL
///
/// Content is immutable; only the recipient sets and `deleted_by` grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    /// Sender id
    pub from: i64,
    /// Room members minus the sender, captured at send time
    pub to: BTreeSet<i64>,
    pub delivered_to: BTreeSet<i64>,
    pub read_by: BTreeSet<i64>,
    pub deleted_by: BTreeSet<i64>,
    pub text: String,
    pub is_forwarded: bool,
    pub reply_to: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_addressed_to(&self, user_id: i64) -> bool {
        self.to.contains(&user_id)
    }

    /// Sender or recipient who has not deleted it for themselves.
    pub fn is_visible_to(&self, user_id: i64) -> bool {
        (self.from == user_id || self.is_addressed_to(user_id)) && !self.deleted_by.contains(&user_id)
    }

    /// `read_by ⊆ delivered_to ⊆ to` and `from ∉ to`.
    pub fn recipient_sets_consistent(&self) -> bool {
        !self.to.contains(&self.from)
            && self.delivered_to.is_subset(&self.to)
            && self.read_by.is_subset(&self.delivered_to)
    }

    /// Record delivery to a recipient. Returns true if the state advanced.
    pub fn mark_delivered(&mut self, user_id: i64) -> bool {
        self.is_addressed_to(user_id) && self.delivered_to.insert(user_id)
    }

    /// Record a read; a read message is delivered as well.
    /// Returns true if the state advanced.
    pub fn mark_read(&mut self, user_id: i64) -> bool {
        if !self.is_addressed_to(user_id) {
            return false;
        }
        let delivered = self.delivered_to.insert(user_id);
        let read = self.read_by.insert(user_id);
        delivered || read
    }

    /// Content length in characters.
    pub fn text_length(&self) -> usize {
        self.text.chars().count()
    }
}

/// Typed filter for message listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageFilter {
    pub room_id: i64,
    /// Only messages this user sent or received and has not deleted
    pub visible_to: i64,
}

impl MessageFilter {
    pub fn matches(&self, message: &Message) -> bool {
        message.room_id == self.room_id && message.is_visible_to(self.visible_to)
    }
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a new message.
    async fn create(&self, message: &Message) -> Result<Message, AppError>;

    /// Find a message by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Messages matching the filter in creation order (oldest first).
    async fn list(&self, filter: MessageFilter, page: Pagination) -> Result<Page<Message>, AppError>;

    /// Add `user_id` to `delivered_to` of every message addressed to them
    /// that lacks it. Returns the ids of rooms that had pending messages.
    async fn mark_delivered(&self, user_id: i64) -> Result<Vec<i64>, AppError>;

    /// Add `user_id` to `read_by` (and `delivered_to`) of every message in the
    /// room addressed to them. Returns how many messages changed.
    async fn mark_room_read(&self, room_id: i64, user_id: i64) -> Result<u64, AppError>;

    /// Add `user_id` to `deleted_by`. Returns false if the message is unknown.
    async fn soft_delete(&self, message_id: i64, user_id: i64) -> Result<bool, AppError>;
}
