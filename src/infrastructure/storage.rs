//! Storage Wiring
//!
//! Builds the set of repository and presence trait objects for the configured
//! backend so the services never know which one they run against.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tracing::info;

use crate::config::{Settings, StorageBackend};
use crate::domain::{MessageRepository, NotificationRepository, PresenceStore, RoomRepository, UserProfile, UserRepository};
use crate::infrastructure::cache::{self, RedisPresenceStore};
use crate::infrastructure::database;
use crate::infrastructure::memory::{
    InMemoryMessageRepository, InMemoryNotificationRepository, InMemoryPresenceStore, InMemoryRoomRepository,
    InMemoryUserRepository,
};
use crate::infrastructure::repositories::{
    PgMessageRepository, PgNotificationRepository, PgRoomRepository, PgUserRepository,
};
use crate::shared::error::AppError;

/// External connections held for readiness probes.
#[derive(Clone)]
pub struct Backends {
    pub db: PgPool,
    pub redis: ConnectionManager,
}

/// Store handles shared by the services.
#[derive(Clone)]
pub struct Storage {
    pub rooms: Arc<dyn RoomRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub users: Arc<dyn UserRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub presence: Arc<dyn PresenceStore>,
    /// `None` for the memory backend
    pub backends: Option<Backends>,
}

impl Storage {
    /// Open the backend named in the settings.
    pub async fn connect(settings: &Settings) -> Result<Self, AppError> {
        match settings.storage.backend {
            StorageBackend::Postgres => Self::postgres(settings).await,
            StorageBackend::Memory => {
                let users = Arc::new(InMemoryUserRepository::new());
                for seed in &settings.storage.seed_users {
                    users.upsert(UserProfile::new(seed.id, &seed.first_name, &seed.last_name));
                }
                info!(seed_users = settings.storage.seed_users.len(), "Using in-memory storage");
                Ok(Self::in_memory_with(users))
            }
        }
    }

    async fn postgres(settings: &Settings) -> Result<Self, AppError> {
        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;
        let redis = cache::create_redis_client(&settings.redis).await?;

        Ok(Self {
            rooms: Arc::new(PgRoomRepository::new(db.clone())),
            messages: Arc::new(PgMessageRepository::new(db.clone())),
            users: Arc::new(PgUserRepository::new(db.clone())),
            notifications: Arc::new(PgNotificationRepository::new(db.clone())),
            presence: Arc::new(RedisPresenceStore::new(redis.clone())),
            backends: Some(Backends { db, redis }),
        })
    }

    /// Empty in-memory stores.
    pub fn in_memory() -> Self {
        Self::in_memory_with(Arc::new(InMemoryUserRepository::new()))
    }

    /// In-memory stores reading profiles from `users`, which the caller may
    /// keep populating.
    pub fn in_memory_with(users: Arc<InMemoryUserRepository>) -> Self {
        Self {
            rooms: Arc::new(InMemoryRoomRepository::new()),
            messages: Arc::new(InMemoryMessageRepository::new()),
            users,
            notifications: Arc::new(InMemoryNotificationRepository::new()),
            presence: Arc::new(InMemoryPresenceStore::new()),
            backends: None,
        }
    }
}
