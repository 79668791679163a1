//! Room Repository Implementation
//!
//! PostgreSQL implementation of the RoomRepository trait.
//! Rooms live in `rooms`, ordered memberships in `room_members`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    LastMessage, NewRoom, Page, Pagination, Room, RoomFilter, RoomMember, RoomMembership, RoomReference,
    RoomRepository,
};
use crate::shared::error::AppError;

/// Database row representation of the rooms table.
#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: i64,
    reference: String,
    last_message_sender_id: Option<i64>,
    last_message_text: Option<String>,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    room_id: i64,
    user_id: i64,
    unread_count: i32,
}

impl RoomRow {
    /// Convert database row to domain Room entity.
    /// Members are loaded separately.
    fn into_room(self, members: Vec<RoomMember>) -> Room {
        let last_message = match (self.last_message_sender_id, self.last_message_text) {
            (Some(sender_id), Some(text)) => Some(LastMessage { sender_id, text }),
            _ => None,
        };

        Room {
            id: self.id,
            reference: RoomReference::from_str(&self.reference),
            members,
            last_message,
            last_activity_at: self.last_activity_at,
            created_at: self.created_at,
        }
    }
}

const ROOM_COLUMNS: &str =
    "r.id, r.reference, r.last_message_sender_id, r.last_message_text, r.last_activity_at, r.created_at";

/// PostgreSQL room repository implementation.
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    /// Create a new PgRoomRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load members for a batch of rooms, keyed by room id, in join order.
    async fn load_members(&self, room_ids: &[i64]) -> Result<HashMap<i64, Vec<RoomMember>>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT room_id, user_id, unread_count
            FROM room_members
            WHERE room_id = ANY($1)
            ORDER BY room_id, position
            "#,
        )
        .bind(room_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut members: HashMap<i64, Vec<RoomMember>> = HashMap::new();
        for row in rows {
            members.entry(row.room_id).or_default().push(RoomMember {
                user_id: row.user_id,
                unread_count: row.unread_count,
            });
        }
        Ok(members)
    }

    async fn hydrate(&self, rows: Vec<RoomRow>) -> Result<Vec<Room>, AppError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut members = self.load_members(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let room_members = members.remove(&row.id).unwrap_or_default();
                row.into_room(room_members)
            })
            .collect())
    }

    async fn insert_members(
        tx: &mut Transaction<'_, Postgres>,
        room_id: i64,
        member_ids: &[i64],
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id, position)
            SELECT $1, m.user_id, (m.ord - 1)::INT
            FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS m(user_id, ord)
            "#,
        )
        .bind(room_id)
        .bind(member_ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!("SELECT {} FROM rooms r WHERE r.id = $1", ROOM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// The unique `pair_key` column arbitrates concurrent resolutions: the
    /// losing insert does nothing and reads the winner's room.
    async fn resolve_one_to_one(&self, candidate: NewRoom) -> Result<(Room, bool), AppError> {
        let key = candidate
            .pair_key()
            .ok_or_else(|| AppError::BadRequest("A one-to-one room needs exactly two members".into()))?;

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO rooms (id, reference, pair_key, last_activity_at, created_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (pair_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(candidate.id)
        .bind(candidate.reference.as_str())
        .bind(&key)
        .bind(candidate.created_at)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_some() {
            Self::insert_members(&mut tx, candidate.id, &candidate.member_ids).await?;
            tx.commit().await?;
            return Ok((candidate.into_room(), true));
        }
        tx.rollback().await?;

        let existing_id = sqlx::query_scalar::<_, i64>("SELECT id FROM rooms WHERE pair_key = $1")
            .bind(&key)
            .fetch_one(&self.pool)
            .await?;
        let room = self
            .find_by_id(existing_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Room {} vanished during resolution", existing_id)))?;
        Ok((room, false))
    }

    async fn create(&self, room: NewRoom) -> Result<Room, AppError> {
        if room.reference == RoomReference::OneToOne {
            return Err(AppError::BadRequest("One-to-one rooms must be resolved, not created".into()));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO rooms (id, reference, pair_key, last_activity_at, created_at)
            VALUES ($1, $2, NULL, $3, $3)
            "#,
        )
        .bind(room.id)
        .bind(room.reference.as_str())
        .bind(room.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("Room {} already exists", room.id))
            }
            _ => AppError::Database(e),
        })?;
        Self::insert_members(&mut tx, room.id, &room.member_ids).await?;
        tx.commit().await?;

        Ok(room.into_room())
    }

    async fn list(&self, filter: RoomFilter, page: Pagination) -> Result<Page<Room>, AppError> {
        const WHERE_CLAUSE: &str = r#"
            FROM rooms r
            JOIN room_members me ON me.room_id = r.id AND me.user_id = $1
            WHERE $2::BIGINT[] IS NULL OR EXISTS (
                SELECT 1 FROM room_members o
                WHERE o.room_id = r.id AND o.user_id <> $1 AND o.user_id = ANY($2)
            )
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {}", WHERE_CLAUSE))
            .bind(filter.member_id)
            .bind(filter.co_member_any_of.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {} {} ORDER BY r.last_activity_at DESC, r.id DESC LIMIT $3 OFFSET $4",
            ROOM_COLUMNS, WHERE_CLAUSE
        ))
        .bind(filter.member_id)
        .bind(filter.co_member_any_of.as_deref())
        .bind(page.limit() as i64)
        .bind(page.skip() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(self.hydrate(rows).await?, total as u64))
    }

    async fn record_message(
        &self,
        room_id: i64,
        last_message: LastMessage,
        at: DateTime<Utc>,
        increment_unread_for: &[i64],
    ) -> Result<Option<Room>, AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE rooms
            SET last_message_sender_id = $2, last_message_text = $3, last_activity_at = $4
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .bind(last_message.sender_id)
        .bind(&last_message.text)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // Relative increment so concurrent senders never lose a count.
        sqlx::query(
            r#"
            UPDATE room_members
            SET unread_count = unread_count + 1
            WHERE room_id = $1 AND user_id = ANY($2)
            "#,
        )
        .bind(room_id)
        .bind(increment_unread_for)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.find_by_id(room_id).await
    }

    async fn reset_unread(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE room_members SET unread_count = 0 WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn memberships_for_user(&self, user_id: i64) -> Result<Vec<RoomMembership>, AppError> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT m.room_id, m.user_id
            FROM room_members m
            WHERE m.room_id IN (SELECT room_id FROM room_members WHERE user_id = $1)
            ORDER BY m.room_id, m.position
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut memberships: Vec<RoomMembership> = Vec::new();
        for (room_id, member_id) in rows {
            match memberships.last_mut() {
                Some(last) if last.room_id == room_id => last.member_ids.push(member_id),
                _ => memberships.push(RoomMembership {
                    room_id,
                    member_ids: vec![member_id],
                }),
            }
        }
        Ok(memberships)
    }
}
