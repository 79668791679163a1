//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//! The chat core only reads profiles; accounts are provisioned elsewhere.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{UserProfile, UserRepository};
use crate::shared::error::AppError;

/// Database row representation of the users table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    in_app_notifications: bool,
}

impl UserRow {
    /// Convert database row to domain UserProfile.
    fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            in_app_notifications: self.in_app_notifications,
        }
    }
}

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, in_app_notifications
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_profile()))
    }

    async fn find_many(&self, ids: &[i64]) -> Result<Vec<UserProfile>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, in_app_notifications
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_profile()).collect())
    }

    async fn search_ids(&self, needle: &str) -> Result<Vec<i64>, AppError> {
        let escaped = needle.trim().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{}%", escaped.to_lowercase());

        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM users
            WHERE LOWER(first_name) LIKE $1 OR LOWER(last_name) LIKE $1
            ORDER BY id
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
