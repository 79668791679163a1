//! Room entity and repository trait.
//!
//! Maps to the `rooms` and `room_members` tables in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Page, Pagination};
use crate::shared::error::AppError;

/// Kind of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomReference {
    /// Exactly two distinct members, at most one room per pair
    #[default]
    OneToOne,
    /// Any number of members, never deduplicated
    Group,
}

impl RoomReference {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "group" => Self::Group,
            _ => Self::OneToOne,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for RoomReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's membership entry in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    pub user_id: i64,
    pub unread_count: i32,
}

/// Denormalized snapshot of the latest message, used for room lists only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub sender_id: i64,
    pub text: String,
}

/// A persistent conversation scoped to a fixed participant set.
///
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - reference: TEXT NOT NULL ('one_to_one' | 'group')
/// - pair_key: TEXT NULL UNIQUE (set for one-to-one rooms)
/// - last_message_sender_id / last_message_text: NULL until the first send
/// - last_activity_at: TIMESTAMPTZ NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub reference: RoomReference,
    /// Members in join order
    pub members: Vec<RoomMember>,
    pub last_message: Option<LastMessage>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn member_ids(&self) -> Vec<i64> {
        self.members.iter().map(|m| m.user_id).collect()
    }

    pub fn is_member(&self, user_id: i64) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }

    pub fn member(&self, user_id: i64) -> Option<&RoomMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// Members other than `user_id`.
    pub fn others(&self, user_id: i64) -> Vec<i64> {
        self.members
            .iter()
            .map(|m| m.user_id)
            .filter(|id| *id != user_id)
            .collect()
    }
}

/// Canonical key for an unordered pair of users: `"<min>:<max>"`.
///
/// Stored in a unique column so two concurrent resolutions of the same pair
/// cannot both insert a room.
pub fn pair_key(a: i64, b: i64) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", lo, hi)
}

/// A room about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub id: i64,
    pub reference: RoomReference,
    pub member_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl NewRoom {
    /// Unique pair key for one-to-one rooms.
    pub fn pair_key(&self) -> Option<String> {
        match (self.reference, self.member_ids.as_slice()) {
            (RoomReference::OneToOne, [a, b]) => Some(pair_key(*a, *b)),
            _ => None,
        }
    }

    pub fn into_room(self) -> Room {
        Room {
            id: self.id,
            reference: self.reference,
            members: self
                .member_ids
                .into_iter()
                .map(|user_id| RoomMember {
                    user_id,
                    unread_count: 0,
                })
                .collect(),
            last_message: None,
            last_activity_at: self.created_at,
            created_at: self.created_at,
        }
    }
}

/// Typed filter for room listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomFilter {
    /// Only rooms this user belongs to
    pub member_id: i64,
    /// When set, only rooms where at least one *other* member is in this list
    pub co_member_any_of: Option<Vec<i64>>,
}

impl RoomFilter {
    pub fn for_member(member_id: i64) -> Self {
        Self {
            member_id,
            co_member_any_of: None,
        }
    }

    pub fn matches(&self, room: &Room) -> bool {
        if !room.is_member(self.member_id) {
            return false;
        }
        match &self.co_member_any_of {
            None => true,
            Some(ids) => room
                .members
                .iter()
                .any(|m| m.user_id != self.member_id && ids.contains(&m.user_id)),
        }
    }
}

/// Room id with its member ids, used for fan-out targeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMembership {
    pub room_id: i64,
    pub member_ids: Vec<i64>,
}

/// Repository trait for Room data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Find a room with its members.
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError>;

    /// Return the one-to-one room for the candidate's member pair, inserting
    /// the candidate if none exists. The flag is `true` when inserted.
    async fn resolve_one_to_one(&self, candidate: NewRoom) -> Result<(Room, bool), AppError>;

    /// Insert a room that is never deduplicated (groups).
    async fn create(&self, room: NewRoom) -> Result<Room, AppError>;

    /// Rooms matching the filter, most recent activity first.
    async fn list(&self, filter: RoomFilter, page: Pagination) -> Result<Page<Room>, AppError>;

    /// Set the last-message snapshot, bump activity, and atomically add one
    /// to `unread_count` of each listed member.
    async fn record_message(
        &self,
        room_id: i64,
        last_message: LastMessage,
        at: DateTime<Utc>,
        increment_unread_for: &[i64],
    ) -> Result<Option<Room>, AppError>;

    /// Reset one member's unread counter. Returns false if not a member.
    async fn reset_unread(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Every room the user belongs to with its member ids.
    async fn memberships_for_user(&self, user_id: i64) -> Result<Vec<RoomMembership>, AppError>;
}
