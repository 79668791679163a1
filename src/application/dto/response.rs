//! Response DTOs
//!
//! Data structures for API response bodies and socket payloads.

use serde::Serialize;

use crate::application::services::{MemberView, NotificationList, RoomView, StartedChat};
use crate::domain::{Message, Notification, Page, Pagination, Room, RoomMember};

fn ids<'a>(ids: impl IntoIterator<Item = &'a i64>) -> Vec<String> {
    ids.into_iter().map(|id| id.to_string()).collect()
}

/// Room member response
#[derive(Debug, Clone, Serialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub unread_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

impl From<&RoomMember> for MemberResponse {
    fn from(member: &RoomMember) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            unread_count: member.unread_count,
            first_name: None,
            last_name: None,
            online: None,
            last_seen: None,
        }
    }
}

impl From<MemberView> for MemberResponse {
    fn from(view: MemberView) -> Self {
        let (first_name, last_name) = view
            .profile
            .map(|p| (p.first_name, p.last_name))
            .unwrap_or((None, None));
        Self {
            user_id: view.user_id.to_string(),
            unread_count: view.unread_count,
            first_name,
            last_name,
            online: Some(view.presence.online),
            last_seen: view.presence.last_seen.map(|t| t.to_rfc3339()),
        }
    }
}

/// Last message snapshot response
#[derive(Debug, Clone, Serialize)]
pub struct LastMessageResponse {
    pub sender_id: String,
    pub message: String,
}

/// Room response
#[derive(Debug, Clone, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub reference: String,
    pub members: Vec<MemberResponse>,
    pub last_message: Option<LastMessageResponse>,
    pub last_activity_at: String,
    pub created_at: String,
}

impl RoomResponse {
    fn with_members(room: Room, members: Vec<MemberResponse>) -> Self {
        Self {
            id: room.id.to_string(),
            reference: reference_label(&room),
            members,
            last_message: room.last_message.map(|m| LastMessageResponse {
                sender_id: m.sender_id.to_string(),
                message: m.text,
            }),
            last_activity_at: room.last_activity_at.to_rfc3339(),
            created_at: room.created_at.to_rfc3339(),
        }
    }
}

fn reference_label(room: &Room) -> String {
    room.reference.as_str().to_uppercase()
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        let members = room.members.iter().map(MemberResponse::from).collect();
        Self::with_members(room, members)
    }
}

impl From<RoomView> for RoomResponse {
    fn from(view: RoomView) -> Self {
        let members = view.members.into_iter().map(MemberResponse::from).collect();
        Self::with_members(view.room, members)
    }
}

/// Room list response
#[derive(Debug, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomResponse>,
    pub total_count: u64,
    pub page: u32,
    pub limit: u32,
}

impl RoomListResponse {
    pub fn new(page: Page<RoomView>, pagination: Pagination) -> Self {
        Self {
            total_count: page.total,
            rooms: page.items.into_iter().map(RoomResponse::from).collect(),
            page: pagination.page(),
            limit: pagination.limit(),
        }
    }
}

/// Message response
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub room_id: String,
    pub from: String,
    pub to: Vec<String>,
    pub delivered_to: Vec<String>,
    pub read_by: Vec<String>,
    pub message: String,
    pub is_forwarded: bool,
    pub reply_to: Option<String>,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.to_string(),
            room_id: message.room_id.to_string(),
            from: message.from.to_string(),
            to: ids(&message.to),
            delivered_to: ids(&message.delivered_to),
            read_by: ids(&message.read_by),
            message: message.text,
            is_forwarded: message.is_forwarded,
            reply_to: message.reply_to.map(|id| id.to_string()),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Message list response
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
    pub total_count: u64,
    pub page: u32,
    pub limit: u32,
}

impl MessageListResponse {
    pub fn new(page: Page<Message>, pagination: Pagination) -> Self {
        Self {
            total_count: page.total,
            messages: page.items.into_iter().map(MessageResponse::from).collect(),
            page: pagination.page(),
            limit: pagination.limit(),
        }
    }
}

/// Start chat response
#[derive(Debug, Serialize)]
pub struct StartChatResponse {
    pub room: RoomResponse,
    pub created: bool,
    pub message: Option<MessageResponse>,
}

impl From<StartedChat> for StartChatResponse {
    fn from(started: StartedChat) -> Self {
        Self {
            room: started.room.into(),
            created: started.created,
            message: started.message.map(MessageResponse::from),
        }
    }
}

/// Read receipt response for joining a room
#[derive(Debug, Serialize)]
pub struct RoomReadResponse {
    pub room_id: String,
    pub read_count: u64,
}

/// Delivery / read receipt payload pushed over the socket
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptResponse {
    pub room_id: String,
    pub user_id: String,
}

/// Notification response
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub sender_mode: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub title: String,
    pub message: String,
    pub flag: String,
    pub payload: NotificationPayloadResponse,
    pub seen: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayloadResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.to_string(),
            sender_mode: n.sender_mode.as_str().to_uppercase(),
            sender_id: n.sender_id.to_string(),
            receiver_id: n.receiver_id.to_string(),
            title: n.title,
            message: n.message,
            flag: n.flag.as_str().to_uppercase(),
            payload: NotificationPayloadResponse {
                room_id: n.payload.room_id.map(|id| id.to_string()),
            },
            seen: n.seen,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// Notification list response
#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub total_count: u64,
    pub unread_count: u64,
}

impl From<NotificationList> for NotificationListResponse {
    fn from(list: NotificationList) -> Self {
        Self {
            total_count: list.notifications.total,
            notifications: list
                .notifications
                .items
                .into_iter()
                .map(NotificationResponse::from)
                .collect(),
            unread_count: list.unread_count,
        }
    }
}

/// Seen acknowledgement response
#[derive(Debug, Serialize)]
pub struct SeenNotificationsResponse {
    pub unseen_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewRoom, RoomReference};
    use chrono::Utc;
    use std::collections::BTreeSet;

    #[test]
    fn test_message_ids_are_strings() {
        let message = Message {
            id: 1234567890123,
            room_id: 5,
            from: 1,
            to: BTreeSet::from([2, 3]),
            delivered_to: BTreeSet::from([2]),
            read_by: BTreeSet::new(),
            deleted_by: BTreeSet::from([3]),
            text: "hi".into(),
            is_forwarded: false,
            reply_to: Some(9),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(MessageResponse::from(message)).unwrap();
        assert_eq!(json["id"], "1234567890123");
        assert_eq!(json["to"], serde_json::json!(["2", "3"]));
        assert_eq!(json["reply_to"], "9");
        assert!(json.get("deleted_by").is_none());
    }

    #[test]
    fn test_room_without_profiles_omits_names() {
        let room = NewRoom {
            id: 7,
            reference: RoomReference::OneToOne,
            member_ids: vec![1, 2],
            created_at: Utc::now(),
        }
        .into_room();
        let json = serde_json::to_value(RoomResponse::from(room)).unwrap();
        assert_eq!(json["reference"], "ONE_TO_ONE");
        assert_eq!(json["members"][0], serde_json::json!({"user_id": "1", "unread_count": 0}));
        assert!(json["last_message"].is_null());
    }
}
