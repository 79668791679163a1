//! Chat Handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::application::dto::request::{
    ForwardMessageRequest, RoomActionRequest, SendMessageRequest, StartChatRequest,
};
use crate::application::dto::response::{
    MessageListResponse, MessageResponse, RoomListResponse, RoomReadResponse, StartChatResponse,
};
use crate::application::services::{SendMessageDto, StartChatDto};
use crate::domain::Pagination;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::{parse_id_field, validate};
use crate::startup::AppState;

/// Listing query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

/// List the caller's rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RoomListResponse>, AppError> {
    let chat = &state.settings.chat;
    let pagination = Pagination::from_query(query.page, query.limit, chat.rooms_page_size, chat.max_page_size);

    let page = state.chat.list_rooms(auth.user_id, query.search, pagination).await?;
    Ok(Json(RoomListResponse::new(page, pagination)))
}

/// List messages of a room
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MessageListResponse>, AppError> {
    let room_id = parse_id_field("room_id", &room_id)?;
    let chat = &state.settings.chat;
    let pagination = Pagination::from_query(query.page, query.limit, chat.messages_page_size, chat.max_page_size);

    let page = state.chat.list_messages(room_id, auth.user_id, pagination).await?;
    Ok(Json(MessageListResponse::new(page, pagination)))
}

/// Resolve or create a room, optionally with a first message
pub async fn start_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<StartChatRequest>,
) -> Result<(StatusCode, Json<StartChatResponse>), AppError> {
    validate(&body)?;

    let users = body
        .users
        .iter()
        .map(|id| parse_id_field("users", id))
        .collect::<Result<Vec<i64>, _>>()?;

    let started = state
        .chat
        .start_chat(
            auth.user_id,
            StartChatDto {
                users,
                message: body.message,
                reference: body.reference,
            },
        )
        .await?;

    let status = if started.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(StartChatResponse::from(started))))
}

/// Send a message over HTTP
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    validate(&body)?;

    let request = SendMessageDto {
        room_id: parse_id_field("room_id", &body.room_id)?,
        text: body.message,
        reply_to: body
            .reply_to
            .as_deref()
            .map(|id| parse_id_field("reply_to", id))
            .transpose()?,
    };

    let sent = state.chat.send_message(auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(sent.message))))
}

/// Hide a message for the caller
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let message_id = parse_id_field("message_id", &message_id)?;
    state.chat.delete_message(message_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Forward a message into another room
pub async fn forward_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
    Json(body): Json<ForwardMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    validate(&body)?;
    let message_id = parse_id_field("message_id", &message_id)?;
    let target = parse_id_field("room_id", &body.room_id)?;

    let sent = state.chat.forward_message(message_id, auth.user_id, target).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(sent.message))))
}

/// Mark a room read for the caller
pub async fn join_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<RoomActionRequest>,
) -> Result<Json<RoomReadResponse>, AppError> {
    validate(&body)?;
    let room_id = parse_id_field("room_id", &body.room_id)?;

    let read_count = state.chat.mark_room_read(room_id, auth.user_id).await?;
    Ok(Json(RoomReadResponse {
        room_id: room_id.to_string(),
        read_count,
    }))
}

pub async fn leave_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<RoomActionRequest>,
) -> Result<StatusCode, AppError> {
    validate(&body)?;
    let room_id = parse_id_field("room_id", &body.room_id)?;
    state.chat.leave_room(room_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn end_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<RoomActionRequest>,
) -> Result<StatusCode, AppError> {
    validate(&body)?;
    let room_id = parse_id_field("room_id", &body.room_id)?;
    state.chat.end_room(room_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
