//! User profile as seen by the chat core, and its repository trait.
//!
//! Accounts are owned by the identity service; the chat core only reads the
//! `users` table for display names and notification preferences.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY
/// - first_name: TEXT NULL
/// - last_name: TEXT NULL
/// - in_app_notifications: BOOLEAN NOT NULL DEFAULT TRUE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Whether chat alerts are persisted and pushed in-app for this user
    pub in_app_notifications: bool,
}

impl UserProfile {
    pub fn new(id: i64, first_name: &str, last_name: &str) -> Self {
        Self {
            id,
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            in_app_notifications: true,
        }
    }

    /// "First Last", falling back to whichever part is present.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            format!("User {}", self.id)
        } else {
            parts.join(" ")
        }
    }
}

/// Case-insensitive substring match against first or last name.
pub fn name_matches(profile: &UserProfile, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    [profile.first_name.as_deref(), profile.last_name.as_deref()]
        .into_iter()
        .flatten()
        .any(|name| name.to_lowercase().contains(&needle))
}

/// Online state derived from the presence registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PresenceSnapshot {
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Repository trait for reading user profiles.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<UserProfile>, AppError>;

    /// Find all users among `ids` (missing ids are skipped).
    async fn find_many(&self, ids: &[i64]) -> Result<Vec<UserProfile>, AppError>;

    /// Ids of users whose first or last name contains `needle` (case-insensitive).
    async fn search_ids(&self, needle: &str) -> Result<Vec<i64>, AppError>;
}
