//! Message Repository Implementation
//!
//! PostgreSQL implementation of the MessageRepository trait.
//! Recipient state is kept in BIGINT[] columns and only ever grows, via
//! conditional `array_append` updates that are safe under concurrency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Message, MessageFilter, MessageRepository, Page, Pagination};
use crate::shared::error::AppError;

/// Database row representation of the messages table.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    room_id: i64,
    sender_id: i64,
    to_ids: Vec<i64>,
    delivered_to: Vec<i64>,
    read_by: Vec<i64>,
    deleted_by: Vec<i64>,
    text: String,
    is_forwarded: bool,
    reply_to_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Convert database row to domain Message entity.
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            room_id: self.room_id,
            from: self.sender_id,
            to: self.to_ids.into_iter().collect(),
            delivered_to: self.delivered_to.into_iter().collect(),
            read_by: self.read_by.into_iter().collect(),
            deleted_by: self.deleted_by.into_iter().collect(),
            text: self.text,
            is_forwarded: self.is_forwarded,
            reply_to: self.reply_to_id,
            created_at: self.created_at,
        }
    }
}

const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, to_ids, delivered_to, read_by, deleted_by, \
                               text, is_forwarded, reply_to_id, created_at";

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Create a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_vec(ids: &std::collections::BTreeSet<i64>) -> Vec<i64> {
    ids.iter().copied().collect()
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            INSERT INTO messages (id, room_id, sender_id, to_ids, delivered_to, read_by, deleted_by,
                                  text, is_forwarded, reply_to_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(message.id)
        .bind(message.room_id)
        .bind(message.from)
        .bind(to_vec(&message.to))
        .bind(to_vec(&message.delivered_to))
        .bind(to_vec(&message.read_by))
        .bind(to_vec(&message.deleted_by))
        .bind(&message.text)
        .bind(message.is_forwarded)
        .bind(message.reply_to)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("Message {} already exists", message.id))
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_message())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!("SELECT {} FROM messages WHERE id = $1", MESSAGE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn list(&self, filter: MessageFilter, page: Pagination) -> Result<Page<Message>, AppError> {
        const WHERE_CLAUSE: &str = r#"
            WHERE room_id = $1
              AND (sender_id = $2 OR $2 = ANY(to_ids))
              AND NOT ($2 = ANY(deleted_by))
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM messages {}", WHERE_CLAUSE))
            .bind(filter.room_id)
            .bind(filter.visible_to)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM messages {} ORDER BY created_at ASC, id ASC LIMIT $3 OFFSET $4",
            MESSAGE_COLUMNS, WHERE_CLAUSE
        ))
        .bind(filter.room_id)
        .bind(filter.visible_to)
        .bind(page.limit() as i64)
        .bind(page.skip() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.into_message()).collect(),
            total as u64,
        ))
    }

    async fn mark_delivered(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let touched = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE messages
            SET delivered_to = array_append(delivered_to, $1)
            WHERE $1 = ANY(to_ids) AND NOT ($1 = ANY(delivered_to))
            RETURNING room_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rooms: Vec<i64> = Vec::new();
        for room_id in touched {
            if !rooms.contains(&room_id) {
                rooms.push(room_id);
            }
        }
        rooms.sort_unstable();
        Ok(rooms)
    }

    async fn mark_room_read(&self, room_id: i64, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read_by = array_append(read_by, $2),
                delivered_to = CASE
                    WHEN $2 = ANY(delivered_to) THEN delivered_to
                    ELSE array_append(delivered_to, $2)
                END
            WHERE room_id = $1 AND $2 = ANY(to_ids) AND NOT ($2 = ANY(read_by))
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete(&self, message_id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET deleted_by = CASE
                WHEN $2 = ANY(deleted_by) THEN deleted_by
                ELSE array_append(deleted_by, $2)
            END
            WHERE id = $1
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
