//! Request DTOs
//!
//! Data structures for API request bodies. Ids travel as strings.

use serde::Deserialize;
use validator::Validate;

use crate::domain::RoomReference;

/// Start chat request
#[derive(Debug, Deserialize, Validate)]
pub struct StartChatRequest {
    #[validate(length(min = 1, message = "At least one participant is required"))]
    pub users: Vec<String>,

    pub message: Option<String>,

    #[serde(default)]
    pub reference: RoomReference,
}

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, message = "Room id is required"))]
    pub room_id: String,

    #[validate(length(min = 1, message = "Message must not be empty"))]
    pub message: String,

    pub reply_to: Option<String>,
}

/// Join / leave / end room request
#[derive(Debug, Deserialize, Validate)]
pub struct RoomActionRequest {
    #[validate(length(min = 1, message = "Room id is required"))]
    pub room_id: String,
}

/// Forward message request
#[derive(Debug, Deserialize, Validate)]
pub struct ForwardMessageRequest {
    #[validate(length(min = 1, message = "Room id is required"))]
    pub room_id: String,
}

/// Mark notifications seen; all of them when no id is given
#[derive(Debug, Default, Deserialize)]
pub struct SeenNotificationRequest {
    pub notification_id: Option<String>,
}
