//! Notification Repository Implementation
//!
//! PostgreSQL implementation of the NotificationRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    Notification, NotificationFlag, NotificationPayload, NotificationRepository, Page, Pagination, SenderMode,
};
use crate::shared::error::AppError;

/// Database row representation of the notifications table.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    sender_mode: String,
    sender_id: i64,
    receiver_id: i64,
    title: String,
    message: String,
    flag: String,
    payload_room_id: Option<i64>,
    seen: bool,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> Notification {
        Notification {
            id: self.id,
            sender_mode: SenderMode::from_str(&self.sender_mode),
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            title: self.title,
            message: self.message,
            flag: NotificationFlag::from_str(&self.flag),
            payload: NotificationPayload {
                room_id: self.payload_room_id,
            },
            seen: self.seen,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL notification repository implementation.
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    /// Create a new PgNotificationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (id, sender_mode, sender_id, receiver_id, title, message,
                                       flag, payload_room_id, seen, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, sender_mode, sender_id, receiver_id, title, message,
                      flag, payload_room_id, seen, created_at
            "#,
        )
        .bind(notification.id)
        .bind(notification.sender_mode.as_str())
        .bind(notification.sender_id)
        .bind(notification.receiver_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.flag.as_str())
        .bind(notification.payload.room_id)
        .bind(notification.seen)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_notification())
    }

    async fn list_for_receiver(&self, receiver_id: i64, page: Pagination) -> Result<Page<Notification>, AppError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE receiver_id = $1")
            .bind(receiver_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, sender_mode, sender_id, receiver_id, title, message,
                   flag, payload_room_id, seen, created_at
            FROM notifications
            WHERE receiver_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(receiver_id)
        .bind(page.limit() as i64)
        .bind(page.skip() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.into_notification()).collect(),
            total as u64,
        ))
    }

    async fn count_unseen(&self, receiver_id: i64) -> Result<u64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE receiver_id = $1 AND NOT seen",
        )
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn mark_seen(&self, receiver_id: i64, notification_id: Option<i64>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET seen = TRUE
            WHERE receiver_id = $1 AND NOT seen AND ($2::BIGINT IS NULL OR id = $2)
            "#,
        )
        .bind(receiver_id)
        .bind(notification_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
