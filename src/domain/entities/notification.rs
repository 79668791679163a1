//! Notification entity and repository trait.
//!
//! Maps to the `notifications` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Page, Pagination};
use crate::shared::error::AppError;

/// Who triggered the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderMode {
    #[default]
    User,
    Admin,
    System,
}

impl SenderMode {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Self::Admin,
            "system" => Self::System,
            _ => Self::User,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

/// Category tag of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationFlag {
    #[default]
    Chat,
    System,
}

impl NotificationFlag {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "system" => Self::System,
            _ => Self::Chat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::System => "system",
        }
    }
}

/// Free-form context attached to a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    pub room_id: Option<i64>,
}

/// A durable alert addressed to one receiver.
///
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - sender_mode / flag: TEXT NOT NULL
/// - sender_id / receiver_id: BIGINT NOT NULL
/// - title / message: TEXT NOT NULL
/// - payload_room_id: BIGINT NULL
/// - seen: BOOLEAN NOT NULL DEFAULT FALSE
/// - created_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    pub sender_mode: SenderMode,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub title: String,
    pub message: String,
    pub flag: NotificationFlag,
    pub payload: NotificationPayload,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub sender_mode: SenderMode,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub title: String,
    pub message: String,
    pub flag: NotificationFlag,
    pub payload: NotificationPayload,
}

impl NewNotification {
    pub fn into_notification(self, id: i64, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id,
            sender_mode: self.sender_mode,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            title: self.title,
            message: self.message,
            flag: self.flag,
            payload: self.payload,
            seen: false,
            created_at,
        }
    }
}

/// Repository trait for Notification data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError>;

    /// Notifications for a receiver, newest first.
    async fn list_for_receiver(&self, receiver_id: i64, page: Pagination) -> Result<Page<Notification>, AppError>;

    async fn count_unseen(&self, receiver_id: i64) -> Result<u64, AppError>;

    /// Mark one notification (or all when `None`) of the receiver as seen.
    /// Returns how many rows changed.
    async fn mark_seen(&self, receiver_id: i64, notification_id: Option<i64>) -> Result<u64, AppError>;
}
