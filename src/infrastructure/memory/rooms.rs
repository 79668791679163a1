//! In-memory Room Repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    LastMessage, NewRoom, Page, Pagination, Room, RoomFilter, RoomMembership, RoomReference, RoomRepository,
};
use crate::shared::error::AppError;

#[derive(Default)]
struct RoomTable {
    rooms: HashMap<i64, Room>,
    /// pair key -> room id, the in-memory counterpart of the unique column
    pairs: HashMap<String, i64>,
}

/// Room repository backed by a single lock-protected table.
#[derive(Default)]
pub struct InMemoryRoomRepository {
    table: RwLock<RoomTable>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rooms.
    pub fn len(&self) -> usize {
        self.table.read().rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError> {
        Ok(self.table.read().rooms.get(&id).cloned())
    }

    async fn resolve_one_to_one(&self, candidate: NewRoom) -> Result<(Room, bool), AppError> {
        let key = candidate
            .pair_key()
            .ok_or_else(|| AppError::BadRequest("A one-to-one room needs exactly two members".into()))?;

        // Lookup and insert under one write guard.
        let mut table = self.table.write();
        if let Some(existing) = table.pairs.get(&key).and_then(|id| table.rooms.get(id)) {
            return Ok((existing.clone(), false));
        }

        let room = candidate.into_room();
        table.pairs.insert(key, room.id);
        table.rooms.insert(room.id, room.clone());
        Ok((room, true))
    }

    async fn create(&self, room: NewRoom) -> Result<Room, AppError> {
        if room.reference == RoomReference::OneToOne {
            return Err(AppError::BadRequest("One-to-one rooms must be resolved, not created".into()));
        }

        let room = room.into_room();
        let mut table = self.table.write();
        if table.rooms.contains_key(&room.id) {
            return Err(AppError::Conflict(format!("Room {} already exists", room.id)));
        }
        table.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn list(&self, filter: RoomFilter, page: Pagination) -> Result<Page<Room>, AppError> {
        let mut rooms: Vec<Room> = self
            .table
            .read()
            .rooms
            .values()
            .filter(|room| filter.matches(room))
            .cloned()
            .collect();

        rooms.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at).then(b.id.cmp(&a.id)));
        let total = rooms.len() as u64;
        Ok(Page::new(page.apply(rooms), total))
    }

    async fn record_message(
        &self,
        room_id: i64,
        last_message: LastMessage,
        at: DateTime<Utc>,
        increment_unread_for: &[i64],
    ) -> Result<Option<Room>, AppError> {
        let mut table = self.table.write();
        let Some(room) = table.rooms.get_mut(&room_id) else {
            return Ok(None);
        };

        room.last_message = Some(last_message);
        room.last_activity_at = at;
        for member in room.members.iter_mut() {
            if increment_unread_for.contains(&member.user_id) {
                member.unread_count += 1;
            }
        }
        Ok(Some(room.clone()))
    }

    async fn reset_unread(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let mut table = self.table.write();
        let member = table
            .rooms
            .get_mut(&room_id)
            .and_then(|room| room.members.iter_mut().find(|m| m.user_id == user_id));

        match member {
            Some(member) => {
                member.unread_count = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn memberships_for_user(&self, user_id: i64) -> Result<Vec<RoomMembership>, AppError> {
        let mut memberships: Vec<RoomMembership> = self
            .table
            .read()
            .rooms
            .values()
            .filter(|room| room.is_member(user_id))
            .map(|room| RoomMembership {
                room_id: room.id,
                member_ids: room.member_ids(),
            })
            .collect();
        memberships.sort_by_key(|m| m.room_id);
        Ok(memberships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn one_to_one(id: i64, a: i64, b: i64) -> NewRoom {
        NewRoom {
            id,
            reference: RoomReference::OneToOne,
            member_ids: vec![a, b],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_resolve_returns_existing_room_for_either_order() {
        let repo = InMemoryRoomRepository::new();
        let (first, created) = repo.resolve_one_to_one(one_to_one(1, 10, 20)).await.unwrap();
        assert!(created);

        let (second, created) = repo.resolve_one_to_one(one_to_one(2, 20, 10)).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution_yields_one_room() {
        let repo = Arc::new(InMemoryRoomRepository::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let (a, b) = if i % 2 == 0 { (1, 2) } else { (2, 1) };
                    repo.resolve_one_to_one(one_to_one(100 + i, a, b)).await.unwrap().0.id
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_record_message_increments_only_listed_members() {
        let repo = InMemoryRoomRepository::new();
        let (room, _) = repo.resolve_one_to_one(one_to_one(1, 10, 20)).await.unwrap();

        let last = LastMessage {
            sender_id: 10,
            text: "hi".into(),
        };
        repo.record_message(room.id, last.clone(), Utc::now(), &[20]).await.unwrap();
        let room = repo.record_message(room.id, last, Utc::now(), &[20]).await.unwrap().unwrap();

        assert_eq!(room.member(20).unwrap().unread_count, 2);
        assert_eq!(room.member(10).unwrap().unread_count, 0);
        assert_eq!(room.last_message.unwrap().text, "hi");

        assert!(repo.reset_unread(room.id, 20).await.unwrap());
        assert!(!repo.reset_unread(room.id, 99).await.unwrap());
        let room = repo.find_by_id(room.id).await.unwrap().unwrap();
        assert_eq!(room.member(20).unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn test_list_orders_by_recent_activity() {
        let repo = InMemoryRoomRepository::new();
        repo.resolve_one_to_one(one_to_one(1, 10, 20)).await.unwrap();
        repo.resolve_one_to_one(one_to_one(2, 10, 30)).await.unwrap();
        repo.resolve_one_to_one(one_to_one(3, 40, 50)).await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(5);
        let last = LastMessage {
            sender_id: 20,
            text: "ping".into(),
        };
        repo.record_message(1, last, later, &[10]).await.unwrap();

        let page = repo.list(RoomFilter::for_member(10), Pagination::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_groups_are_never_deduplicated() {
        let repo = InMemoryRoomRepository::new();
        let group = |id| NewRoom {
            id,
            reference: RoomReference::Group,
            member_ids: vec![1, 2],
            created_at: Utc::now(),
        };
        repo.create(group(1)).await.unwrap();
        repo.create(group(2)).await.unwrap();
        assert_eq!(repo.len(), 2);
        assert!(repo.create(one_to_one(3, 1, 2)).await.is_err());
    }
}
