//! In-memory User Repository

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{name_matches, UserProfile, UserRepository};
use crate::shared::error::AppError;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<i64, UserProfile>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile.
    pub fn upsert(&self, profile: UserProfile) {
        self.users.write().insert(profile.id, profile);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserProfile>, AppError> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn find_many(&self, ids: &[i64]) -> Result<Vec<UserProfile>, AppError> {
        let users = self.users.read();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn search_ids(&self, needle: &str) -> Result<Vec<i64>, AppError> {
        let mut ids: Vec<i64> = self
            .users
            .read()
            .values()
            .filter(|u| name_matches(u, needle))
            .map(|u| u.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
