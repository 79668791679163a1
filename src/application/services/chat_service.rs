//! Chat Service
//!
//! Room resolution, message sending, read tracking and message listings.
//! Every state change is persisted first and then published on the
//! [`EventBus`]; fan-out never rolls back persisted state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::application::events::EventBus;
use crate::domain::services::recipient_state;
use crate::domain::{
    ChatEvent, ConnectionDirectory, LastMessage, Message, MessageFilter, MessageRepository, NewRoom, Page,
    Pagination, PresenceSnapshot, PresenceStore, Room, RoomFilter, RoomReference, RoomRepository, UserProfile,
    UserRepository,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Chat service trait
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Rooms the user belongs to, most recent activity first, optionally
    /// narrowed to rooms with a co-member whose name contains `search`.
    async fn list_rooms(&self, user_id: i64, search: Option<String>, page: Pagination) -> Result<Page<RoomView>, ChatError>;

    /// Messages of a room the user sent or received, oldest first.
    async fn list_messages(&self, room_id: i64, user_id: i64, page: Pagination) -> Result<Page<Message>, ChatError>;

    /// Resolve (one-to-one) or create (group) a room, optionally sending a first message.
    async fn start_chat(&self, user_id: i64, request: StartChatDto) -> Result<StartedChat, ChatError>;

    /// Send a message to a room the user belongs to.
    async fn send_message(&self, user_id: i64, request: SendMessageDto) -> Result<SentMessage, ChatError>;

    /// Mark every message addressed to the user in the room as read and reset
    /// their unread counter. Returns how many messages changed.
    async fn mark_room_read(&self, room_id: i64, user_id: i64) -> Result<u64, ChatError>;

    /// Leave a room. Not supported yet.
    async fn leave_room(&self, room_id: i64, user_id: i64) -> Result<(), ChatError>;

    /// End a room. Not supported yet.
    async fn end_room(&self, room_id: i64, user_id: i64) -> Result<(), ChatError>;

    /// Hide a message for the user only.
    async fn delete_message(&self, message_id: i64, user_id: i64) -> Result<(), ChatError>;

    /// Send a copy of a visible message into another room of the user.
    async fn forward_message(&self, message_id: i64, user_id: i64, target_room_id: i64) -> Result<SentMessage, ChatError>;
}

/// Start chat request
#[derive(Debug, Clone)]
pub struct StartChatDto {
    pub users: Vec<i64>,
    pub message: Option<String>,
    pub reference: RoomReference,
}

/// Send message request
#[derive(Debug, Clone)]
pub struct SendMessageDto {
    pub room_id: i64,
    pub text: String,
    pub reply_to: Option<i64>,
}

/// Room member joined with profile and presence
#[derive(Debug, Clone, PartialEq)]
pub struct MemberView {
    pub user_id: i64,
    pub unread_count: i32,
    pub profile: Option<UserProfile>,
    pub presence: PresenceSnapshot,
}

/// Room enriched with member profiles
#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    pub room: Room,
    pub members: Vec<MemberView>,
}

#[derive(Debug, Clone)]
pub struct StartedChat {
    pub room: RoomView,
    /// False when an existing one-to-one room was returned
    pub created: bool,
    pub message: Option<Message>,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message: Message,
    pub room: Room,
}

/// Limits applied to chat operations
#[derive(Debug, Clone, Copy)]
pub struct ChatPolicy {
    pub max_message_length: usize,
    pub max_group_size: usize,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            max_message_length: 4000,
            max_group_size: 256,
        }
    }
}

/// Chat service errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Not a member of this room")]
    NotMember,

    #[error("Not a participant of this message")]
    NotParticipant,

    #[error("{0}")]
    Validation(String),

    #[error("{0} is not supported yet")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::RoomNotFound => AppError::NotFound("Room not found".into()),
            ChatError::MessageNotFound => AppError::NotFound("Message not found".into()),
            ChatError::UserNotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            ChatError::NotMember => AppError::Forbidden("Not a member of this room".into()),
            ChatError::NotParticipant => AppError::Forbidden("Not a participant of this message".into()),
            ChatError::Validation(msg) => AppError::Validation(msg),
            e @ ChatError::NotImplemented(_) => AppError::NotImplemented(e.to_string()),
            ChatError::Storage(e) => e,
        }
    }
}

/// ChatService implementation
pub struct ChatServiceImpl {
    rooms: Arc<dyn RoomRepository>,
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserRepository>,
    presence: Arc<dyn PresenceStore>,
    directory: Arc<dyn ConnectionDirectory>,
    events: EventBus,
    id_generator: Arc<SnowflakeGenerator>,
    policy: ChatPolicy,
}

impl ChatServiceImpl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        messages: Arc<dyn MessageRepository>,
        users: Arc<dyn UserRepository>,
        presence: Arc<dyn PresenceStore>,
        directory: Arc<dyn ConnectionDirectory>,
        events: EventBus,
        id_generator: Arc<SnowflakeGenerator>,
        policy: ChatPolicy,
    ) -> Self {
        Self {
            rooms,
            messages,
            users,
            presence,
            directory,
            events,
            id_generator,
            policy,
        }
    }

    fn validate_text(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation("message: must not be empty".into()));
        }
        if text.chars().count() > self.policy.max_message_length {
            return Err(ChatError::Validation(format!(
                "message: must be at most {} characters",
                self.policy.max_message_length
            )));
        }
        Ok(())
    }

    async fn member_room(&self, room_id: i64, user_id: i64) -> Result<Room, ChatError> {
        let room = self.rooms.find_by_id(room_id).await?.ok_or(ChatError::RoomNotFound)?;
        if !room.is_member(user_id) {
            return Err(ChatError::NotMember);
        }
        Ok(room)
    }

    /// Join members with profiles and presence. Presence failures degrade to
    /// "offline" rather than failing the listing.
    async fn enrich(&self, rooms: Vec<Room>) -> Result<Vec<RoomView>, ChatError> {
        let mut ids: Vec<i64> = rooms.iter().flat_map(|r| r.member_ids()).collect();
        ids.sort_unstable();
        ids.dedup();

        let profiles: HashMap<i64, UserProfile> = self
            .users
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let presence = match self.presence.snapshot(&ids).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Presence lookup failed, reporting members offline");
                HashMap::new()
            }
        };

        Ok(rooms
            .into_iter()
            .map(|room| {
                let members = room
                    .members
                    .iter()
                    .map(|m| MemberView {
                        user_id: m.user_id,
                        unread_count: m.unread_count,
                        profile: profiles.get(&m.user_id).cloned(),
                        presence: presence.get(&m.user_id).copied().unwrap_or_default(),
                    })
                    .collect();
                RoomView { room, members }
            })
            .collect())
    }

    /// Persist a message with its recipient sets, update the room and publish.
    async fn deliver(
        &self,
        room: Room,
        from: i64,
        text: String,
        reply_to: Option<i64>,
        is_forwarded: bool,
    ) -> Result<SentMessage, ChatError> {
        let others = room.others(from);
        let online = match self.presence.online_users(&others).await {
            Ok(online) => online,
            Err(e) => {
                // Delivery is reconciled when recipients next connect.
                warn!(room_id = room.id, error = %e, "Presence lookup failed, treating recipients as offline");
                HashSet::new()
            }
        };
        let viewing = self.directory.viewing_users(room.id);
        let state = recipient_state(&room, from, &online, &viewing);
        let unread_targets = state.unread_targets();

        let now = Utc::now();
        let message = Message {
            id: self.id_generator.generate(),
            room_id: room.id,
            from,
            to: state.to,
            delivered_to: state.delivered_to,
            read_by: state.read_by,
            deleted_by: Default::default(),
            text,
            is_forwarded,
            reply_to,
            created_at: now,
        };
        let message = self.messages.create(&message).await?;
        metrics::record_message_sent();

        let last_message = LastMessage {
            sender_id: from,
            text: message.text.clone(),
        };
        let room = match self
            .rooms
            .record_message(room.id, last_message, now, &unread_targets)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => room,
            Err(e) => {
                // The message is durable; the room snapshot is only a display cache.
                error!(room_id = room.id, message_id = message.id, error = %e, "Failed to update room after send");
                room
            }
        };

        debug!(
            room_id = room.id,
            message_id = message.id,
            delivered = message.delivered_to.len(),
            read = message.read_by.len(),
            "Message persisted"
        );

        self.events.publish(ChatEvent::MessageCreated {
            message: message.clone(),
        });
        self.events.publish(ChatEvent::RoomActivity {
            recipients: room.others(from),
            room: room.clone(),
        });

        Ok(SentMessage { message, room })
    }
}

#[async_trait]
impl ChatService for ChatServiceImpl {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_rooms(&self, user_id: i64, search: Option<String>, page: Pagination) -> Result<Page<RoomView>, ChatError> {
        let mut filter = RoomFilter::for_member(user_id);

        if let Some(needle) = search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let matching = self.users.search_ids(needle).await?;
            if matching.is_empty() {
                return Ok(Page::empty());
            }
            filter.co_member_any_of = Some(matching);
        }

        let rooms = self.rooms.list(filter, page).await?;
        let total = rooms.total;
        let views = self.enrich(rooms.items).await?;
        Ok(Page::new(views, total))
    }

    #[instrument(skip(self), fields(room_id = %room_id, user_id = %user_id))]
    async fn list_messages(&self, room_id: i64, user_id: i64, page: Pagination) -> Result<Page<Message>, ChatError> {
        if self.rooms.find_by_id(room_id).await?.is_none() {
            return Err(ChatError::RoomNotFound);
        }

        let filter = MessageFilter {
            room_id,
            visible_to: user_id,
        };
        Ok(self.messages.list(filter, page).await?)
    }

    #[instrument(skip(self, request), fields(user_id = %user_id, reference = %request.reference))]
    async fn start_chat(&self, user_id: i64, request: StartChatDto) -> Result<StartedChat, ChatError> {
        let mut others: Vec<i64> = Vec::with_capacity(request.users.len());
        for id in request.users {
            if id != user_id && !others.contains(&id) {
                others.push(id);
            }
        }

        if others.is_empty() {
            return Err(ChatError::Validation("users: must name at least one other participant".into()));
        }
        match request.reference {
            RoomReference::OneToOne if others.len() != 1 => {
                return Err(ChatError::Validation(
                    "users: a one-to-one chat needs exactly one other participant".into(),
                ));
            }
            RoomReference::Group if others.len() + 1 > self.policy.max_group_size => {
                return Err(ChatError::Validation(format!(
                    "users: a group may have at most {} members",
                    self.policy.max_group_size
                )));
            }
            _ => {}
        }

        let text = request.message.filter(|m| !m.trim().is_empty());
        if let Some(text) = &text {
            self.validate_text(text)?;
        }

        let found: HashSet<i64> = self.users.find_many(&others).await?.into_iter().map(|u| u.id).collect();
        if let Some(missing) = others.iter().find(|id| !found.contains(id)) {
            return Err(ChatError::UserNotFound(*missing));
        }

        let mut member_ids = vec![user_id];
        member_ids.extend(others);
        let candidate = NewRoom {
            id: self.id_generator.generate(),
            reference: request.reference,
            member_ids,
            created_at: Utc::now(),
        };

        let (mut room, created) = match request.reference {
            RoomReference::OneToOne => self.rooms.resolve_one_to_one(candidate).await?,
            RoomReference::Group => (self.rooms.create(candidate).await?, true),
        };
        if created {
            info!(room_id = room.id, "Room created");
        }

        let message = match text {
            Some(text) => {
                let sent = self.deliver(room, user_id, text, None, false).await?;
                room = sent.room;
                Some(sent.message)
            }
            None => {
                self.events.publish(ChatEvent::RoomActivity {
                    recipients: room.others(user_id),
                    room: room.clone(),
                });
                None
            }
        };

        let view = self
            .enrich(vec![room])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("room view missing".into()))?;

        Ok(StartedChat {
            room: view,
            created,
            message,
        })
    }

    #[instrument(skip(self, request), fields(user_id = %user_id, room_id = %request.room_id))]
    async fn send_message(&self, user_id: i64, request: SendMessageDto) -> Result<SentMessage, ChatError> {
        self.validate_text(&request.text)?;
        let room = self.member_room(request.room_id, user_id).await?;

        if let Some(reply_to) = request.reply_to {
            let parent = self
                .messages
                .find_by_id(reply_to)
                .await?
                .ok_or(ChatError::MessageNotFound)?;
            if parent.room_id != room.id {
                return Err(ChatError::Validation(
                    "reply_to: must reference a message in the same room".into(),
                ));
            }
        }

        self.deliver(room, user_id, request.text, request.reply_to, false).await
    }

    #[instrument(skip(self), fields(room_id = %room_id, user_id = %user_id))]
    async fn mark_room_read(&self, room_id: i64, user_id: i64) -> Result<u64, ChatError> {
        let room = self.member_room(room_id, user_id).await?;

        let changed = self.messages.mark_room_read(room_id, user_id).await?;
        self.rooms.reset_unread(room_id, user_id).await?;
        debug!(changed, "Room marked read");

        self.events.publish(ChatEvent::MessagesRead {
            room_id,
            user_id,
            recipients: room.others(user_id),
        });
        Ok(changed)
    }

    async fn leave_room(&self, room_id: i64, user_id: i64) -> Result<(), ChatError> {
        self.member_room(room_id, user_id).await?;
        Err(ChatError::NotImplemented("Leaving a room"))
    }

    async fn end_room(&self, room_id: i64, user_id: i64) -> Result<(), ChatError> {
        self.member_room(room_id, user_id).await?;
        Err(ChatError::NotImplemented("Ending a room"))
    }

    #[instrument(skip(self), fields(message_id = %message_id, user_id = %user_id))]
    async fn delete_message(&self, message_id: i64, user_id: i64) -> Result<(), ChatError> {
        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or(ChatError::MessageNotFound)?;
        if message.from != user_id && !message.is_addressed_to(user_id) {
            return Err(ChatError::NotParticipant);
        }

        if !self.messages.soft_delete(message_id, user_id).await? {
            return Err(ChatError::MessageNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(message_id = %message_id, user_id = %user_id, room_id = %target_room_id))]
    async fn forward_message(&self, message_id: i64, user_id: i64, target_room_id: i64) -> Result<SentMessage, ChatError> {
        let original = self
            .messages
            .find_by_id(message_id)
            .await?
            .filter(|m| m.is_visible_to(user_id))
            .ok_or(ChatError::MessageNotFound)?;

        let room = self.member_room(target_room_id, user_id).await?;
        self.deliver(room, user_id, original.text, None, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockConnectionDirectory, MockPresenceStore, MockRoomRepository};
    use crate::infrastructure::memory::{
        InMemoryMessageRepository, InMemoryPresenceStore, InMemoryRoomRepository, InMemoryUserRepository,
    };
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    /// Directory whose viewers are set by the test.
    #[derive(Default)]
    struct FakeDirectory {
        viewing: Mutex<HashMap<i64, HashSet<i64>>>,
    }

    impl FakeDirectory {
        fn view(&self, room_id: i64, user_id: i64) {
            self.viewing.lock().entry(room_id).or_default().insert(user_id);
        }
    }

    impl ConnectionDirectory for FakeDirectory {
        fn is_live(&self, _connection_id: &str) -> bool {
            true
        }

        fn viewing_users(&self, room_id: i64) -> HashSet<i64> {
            self.viewing.lock().get(&room_id).cloned().unwrap_or_default()
        }
    }

    struct Harness {
        service: ChatServiceImpl,
        rooms: Arc<InMemoryRoomRepository>,
        messages: Arc<InMemoryMessageRepository>,
        presence: Arc<InMemoryPresenceStore>,
        directory: Arc<FakeDirectory>,
        events: EventBus,
    }

    fn harness() -> Harness {
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        for (id, first, last) in [(1, "Ada", "Lovelace"), (2, "Grace", "Hopper"), (3, "Alan", "Turing")] {
            users.upsert(UserProfile::new(id, first, last));
        }
        let presence = Arc::new(InMemoryPresenceStore::new());
        let directory = Arc::new(FakeDirectory::default());
        let events = EventBus::new(64);

        let service = ChatServiceImpl::new(
            rooms.clone(),
            messages.clone(),
            users,
            presence.clone(),
            directory.clone(),
            events.clone(),
            Arc::new(SnowflakeGenerator::new(1, crate::shared::snowflake::DEFAULT_EPOCH)),
            ChatPolicy::default(),
        );

        Harness {
            service,
            rooms,
            messages,
            presence,
            directory,
            events,
        }
    }

    fn start(users: &[i64], message: Option<&str>) -> StartChatDto {
        StartChatDto {
            users: users.to_vec(),
            message: message.map(String::from),
            reference: RoomReference::OneToOne,
        }
    }

    fn send(room_id: i64, text: &str) -> SendMessageDto {
        SendMessageDto {
            room_id,
            text: text.into(),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_start_chat_with_offline_peer() {
        let h = harness();
        let started = h.service.start_chat(1, start(&[2], Some("hi"))).await.unwrap();

        assert!(started.created);
        assert_eq!(started.room.room.reference, RoomReference::OneToOne);
        assert_eq!(started.room.room.members.len(), 2);
        assert_eq!(started.room.room.last_message.as_ref().unwrap().text, "hi");

        let message = started.message.unwrap();
        assert_eq!(message.to, BTreeSet::from([2]));
        assert!(message.delivered_to.is_empty());
        assert_eq!(started.room.room.member(2).unwrap().unread_count, 1);
    }

    #[tokio::test]
    async fn test_start_chat_reuses_room_for_the_pair() {
        let h = harness();
        let first = h.service.start_chat(1, start(&[2], None)).await.unwrap();
        let second = h.service.start_chat(2, start(&[1, 2], None)).await.unwrap();

        assert!(!second.created);
        assert_eq!(first.room.room.id, second.room.room.id);
        assert_eq!(h.rooms.len(), 1);
    }

    #[tokio::test]
    async fn test_start_chat_validation() {
        let h = harness();
        assert!(matches!(
            h.service.start_chat(1, start(&[1], None)).await,
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            h.service.start_chat(1, start(&[2, 3], None)).await,
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            h.service.start_chat(1, start(&[42], None)).await,
            Err(ChatError::UserNotFound(42))
        ));
        assert!(h.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_group_chat_creates_distinct_rooms() {
        let h = harness();
        let group = StartChatDto {
            users: vec![2, 3, 3],
            message: None,
            reference: RoomReference::Group,
        };
        let a = h.service.start_chat(1, group.clone()).await.unwrap();
        let b = h.service.start_chat(1, group).await.unwrap();

        assert_ne!(a.room.room.id, b.room.room.id);
        assert_eq!(a.room.room.member_ids(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unread_counts_follow_viewers() {
        let h = harness();
        let room_id = h.service.start_chat(1, start(&[2], None)).await.unwrap().room.room.id;

        // Recipient offline: every message counts.
        for _ in 0..3 {
            h.service.send_message(1, send(room_id, "ping")).await.unwrap();
        }
        let room = h.rooms.find_by_id(room_id).await.unwrap().unwrap();
        assert_eq!(room.member(2).unwrap().unread_count, 3);

        // Recipient online and viewing: nothing counts and messages are read.
        h.service.mark_room_read(room_id, 2).await.unwrap();
        h.presence.add_connection(2, "c2", &[]).await.unwrap();
        h.directory.view(room_id, 2);
        for _ in 0..3 {
            let sent = h.service.send_message(1, send(room_id, "pong")).await.unwrap();
            assert_eq!(sent.message.read_by, BTreeSet::from([2]));
            assert_eq!(sent.message.delivered_to, BTreeSet::from([2]));
        }
        let room = h.rooms.find_by_id(room_id).await.unwrap().unwrap();
        assert_eq!(room.member(2).unwrap().unread_count, 0);
        assert_eq!(room.member(1).unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn test_mark_room_read_publishes_and_is_idempotent() {
        let h = harness();
        let room_id = h.service.start_chat(1, start(&[2], Some("hi"))).await.unwrap().room.room.id;
        let mut rx = h.events.subscribe();

        assert_eq!(h.service.mark_room_read(room_id, 2).await.unwrap(), 1);
        assert_eq!(h.service.mark_room_read(room_id, 2).await.unwrap(), 0);

        let page = h
            .messages
            .list(MessageFilter { room_id, visible_to: 2 }, Pagination::default())
            .await
            .unwrap();
        assert!(page.items.iter().all(|m| m.read_by.contains(&2) && m.delivered_to.contains(&2)));

        match &*rx.recv().await.unwrap() {
            ChatEvent::MessagesRead {
                user_id, recipients, ..
            } => {
                assert_eq!(*user_id, 2);
                assert_eq!(recipients, &vec![1]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_requires_membership_and_same_room_reply() {
        let h = harness();
        let room_a = h.service.start_chat(1, start(&[2], Some("a"))).await.unwrap();
        let room_b = h.service.start_chat(1, start(&[3], Some("b"))).await.unwrap();

        assert!(matches!(
            h.service.send_message(3, send(room_a.room.room.id, "intrude")).await,
            Err(ChatError::NotMember)
        ));
        assert!(matches!(
            h.service.send_message(1, send(999, "lost")).await,
            Err(ChatError::RoomNotFound)
        ));
        assert!(matches!(
            h.service.send_message(1, send(room_a.room.room.id, "   ")).await,
            Err(ChatError::Validation(_))
        ));

        let foreign_parent = room_b.message.unwrap().id;
        let reply = SendMessageDto {
            reply_to: Some(foreign_parent),
            ..send(room_a.room.room.id, "re")
        };
        assert!(matches!(
            h.service.send_message(1, reply).await,
            Err(ChatError::Validation(_))
        ));

        let parent = room_a.message.unwrap().id;
        let reply = SendMessageDto {
            reply_to: Some(parent),
            ..send(room_a.room.room.id, "re")
        };
        let sent = h.service.send_message(2, reply).await.unwrap();
        assert_eq!(sent.message.reply_to, Some(parent));
    }

    #[tokio::test]
    async fn test_list_messages_hides_own_deletions() {
        let h = harness();
        let started = h.service.start_chat(1, start(&[2], Some("first"))).await.unwrap();
        let room_id = started.room.room.id;
        h.service.send_message(2, send(room_id, "second")).await.unwrap();

        h.service.delete_message(started.message.unwrap().id, 2).await.unwrap();

        let for_two = h.service.list_messages(room_id, 2, Pagination::default()).await.unwrap();
        assert_eq!(for_two.items.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(), vec!["second"]);

        let for_one = h.service.list_messages(room_id, 1, Pagination::default()).await.unwrap();
        assert_eq!(for_one.total, 2);
        assert_eq!(for_one.items[0].text, "first");

        let outsider = h.service.list_messages(room_id, 3, Pagination::default()).await.unwrap();
        assert_eq!(outsider.total, 0);

        assert!(matches!(
            h.service.list_messages(404, 1, Pagination::default()).await,
            Err(ChatError::RoomNotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_participation() {
        let h = harness();
        let started = h.service.start_chat(1, start(&[2], Some("secret"))).await.unwrap();
        let id = started.message.unwrap().id;

        assert!(matches!(h.service.delete_message(id, 3).await, Err(ChatError::NotParticipant)));
        assert!(matches!(h.service.delete_message(7, 1).await, Err(ChatError::MessageNotFound)));
    }

    #[tokio::test]
    async fn test_forward_copies_text_into_another_room() {
        let h = harness();
        let source = h.service.start_chat(1, start(&[2], Some("news"))).await.unwrap();
        let target = h.service.start_chat(1, start(&[3], None)).await.unwrap();

        let source_id = source.message.unwrap().id;
        let forwarded = h.service.forward_message(source_id, 1, target.room.room.id).await.unwrap();
        assert!(forwarded.message.is_forwarded);
        assert_eq!(forwarded.message.text, "news");
        assert_eq!(forwarded.message.to, BTreeSet::from([3]));

        // User 3 cannot see the source message.
        assert!(matches!(
            h.service.forward_message(source_id, 3, target.room.room.id).await,
            Err(ChatError::MessageNotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_rooms_search_matches_co_members_only() {
        let h = harness();
        h.service.start_chat(1, start(&[2], Some("to grace"))).await.unwrap();
        h.service.start_chat(1, start(&[3], Some("to alan"))).await.unwrap();

        let all = h.service.list_rooms(1, None, Pagination::default()).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].room.last_message.as_ref().unwrap().text, "to alan");

        let grace = h.service.list_rooms(1, Some("HOP".into()), Pagination::default()).await.unwrap();
        assert_eq!(grace.total, 1);
        let names: Vec<String> = grace.items[0]
            .members
            .iter()
            .filter_map(|m| m.profile.as_ref().map(|p| p.display_name()))
            .collect();
        assert!(names.contains(&"Grace Hopper".to_string()));

        let own_name = h.service.list_rooms(1, Some("lovelace".into()), Pagination::default()).await.unwrap();
        assert_eq!(own_name.total, 0);

        let nobody = h.service.list_rooms(1, Some("zzz".into()), Pagination::default()).await.unwrap();
        assert_eq!(nobody.total, 0);
    }

    #[tokio::test]
    async fn test_leave_and_end_are_placeholders_after_checks() {
        let h = harness();
        let room_id = h.service.start_chat(1, start(&[2], None)).await.unwrap().room.room.id;

        assert!(matches!(h.service.leave_room(room_id, 1).await, Err(ChatError::NotImplemented(_))));
        assert!(matches!(h.service.end_room(room_id, 2).await, Err(ChatError::NotImplemented(_))));
        assert!(matches!(h.service.leave_room(room_id, 3).await, Err(ChatError::NotMember)));
        assert!(matches!(h.service.end_room(12345, 1).await, Err(ChatError::RoomNotFound)));
        assert_eq!(h.rooms.find_by_id(room_id).await.unwrap().unwrap().members.len(), 2);
    }

    #[tokio::test]
    async fn test_send_survives_presence_outage() {
        let mut presence = MockPresenceStore::new();
        presence
            .expect_online_users()
            .returning(|_| Err(AppError::Internal("redis down".into())));

        let mut rooms = MockRoomRepository::new();
        let room = NewRoom {
            id: 5,
            reference: RoomReference::OneToOne,
            member_ids: vec![1, 2],
            created_at: Utc::now(),
        }
        .into_room();
        let found = room.clone();
        rooms.expect_find_by_id().returning(move |_| Ok(Some(found.clone())));
        rooms
            .expect_record_message()
            .withf(|room_id, _, _, unread| *room_id == 5 && unread.to_vec() == vec![2])
            .times(1)
            .returning(|_, _, _, _| Err(AppError::Internal("write failed".into())));

        let mut directory = MockConnectionDirectory::new();
        directory.expect_viewing_users().returning(|_| HashSet::new());

        let service = ChatServiceImpl::new(
            Arc::new(rooms),
            Arc::new(InMemoryMessageRepository::new()),
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(presence),
            Arc::new(directory),
            EventBus::new(8),
            Arc::new(SnowflakeGenerator::new(1, crate::shared::snowflake::DEFAULT_EPOCH)),
            ChatPolicy::default(),
        );

        let sent = service.send_message(1, send(5, "still stored")).await.unwrap();
        assert!(sent.message.delivered_to.is_empty());
        assert_eq!(sent.room, room);
    }

    #[test]
    fn test_error_mapping() {
        let (status, _) = AppError::from(ChatError::NotImplemented("Leaving a room")).status_and_code();
        assert_eq!(status, axum::http::StatusCode::NOT_IMPLEMENTED);
        let (status, _) = AppError::from(ChatError::NotMember).status_and_code();
        assert_eq!(status, axum::http::StatusCode::FORBIDDEN);
        let (status, _) = AppError::from(ChatError::RoomNotFound).status_and_code();
        assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    }
}
