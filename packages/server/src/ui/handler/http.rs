//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use lapak_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{RoomId, UserId},
    infrastructure::dto::{
        http::{
            ChatListDto, ChatSummaryDto, ErrorDto, InitPrivateChatRequest,
            InitPrivateChatResponse, LeaveChatResponse, ParticipantStatusDto, PendingMessagesDto,
            RoomStatusDto, UserQuery,
        },
        websocket::MessagePayload,
    },
    ui::state::AppState,
    usecase::{InitPrivateChatError, ListChatsError, RoomAccessError},
};

type ApiError = (StatusCode, Json<ErrorDto>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorDto::new(message)))
}

fn room_access_error(err: RoomAccessError) -> ApiError {
    let status = match &err {
        RoomAccessError::RoomNotFound(_) => StatusCode::NOT_FOUND,
        RoomAccessError::NotParticipant { .. } => StatusCode::FORBIDDEN,
        RoomAccessError::Store(e) => {
            tracing::error!("Store failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorDto::new(err.to_string())))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Find or create the private chat room between two users
pub async fn init_private_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InitPrivateChatRequest>,
) -> Result<(StatusCode, Json<InitPrivateChatResponse>), ApiError> {
    let user_id = UserId::new(request.user_id).map_err(|e| bad_request(e.to_string()))?;
    let target_user_id =
        UserId::new(request.target_user_id).map_err(|e| bad_request(e.to_string()))?;

    match state
        .init_private_chat_usecase
        .execute(user_id, target_user_id)
        .await
    {
        Ok((room_id, created)) => {
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok((
                status,
                Json(InitPrivateChatResponse {
                    room_id: room_id.value(),
                    created,
                }),
            ))
        }
        Err(InitPrivateChatError::SameUser) => {
            Err(bad_request(InitPrivateChatError::SameUser.to_string()))
        }
        Err(InitPrivateChatError::Store(e)) => {
            tracing::error!("Failed to open private chat: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorDto::new("failed to open private chat")),
            ))
        }
    }
}

/// Online and in-room status of every participant of a room
pub async fn get_room_status(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<u64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<RoomStatusDto>, ApiError> {
    let room_id = RoomId::new(room_id).map_err(|e| bad_request(e.to_string()))?;
    let caller = UserId::new(query.user_id).map_err(|e| bad_request(e.to_string()))?;

    let participants = state
        .get_room_status_usecase
        .execute(caller, room_id)
        .await
        .map_err(room_access_error)?;

    // Domain Model から DTO への変換
    Ok(Json(RoomStatusDto {
        room_id: room_id.value(),
        participants: participants
            .into_iter()
            .map(|p| ParticipantStatusDto {
                user_id: p.user_id.value(),
                is_online: p.is_online,
                in_room: p.in_room,
            })
            .collect(),
    }))
}

/// Hand over the caller's pending messages for a room and delete them
pub async fn drain_room_messages(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<u64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<PendingMessagesDto>, ApiError> {
    let room_id = RoomId::new(room_id).map_err(|e| bad_request(e.to_string()))?;
    let caller = UserId::new(query.user_id).map_err(|e| bad_request(e.to_string()))?;

    let messages = state
        .drain_messages_usecase
        .execute(caller, room_id)
        .await
        .map_err(room_access_error)?;

    Ok(Json(PendingMessagesDto {
        room_id: room_id.value(),
        messages: messages.into_iter().map(MessagePayload::from).collect(),
    }))
}

/// The caller's chats, most recent message first
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ChatListDto>, ApiError> {
    let caller = UserId::new(query.user_id).map_err(|e| bad_request(e.to_string()))?;

    let chats = match state.list_chats_usecase.execute(caller).await {
        Ok(chats) => chats,
        Err(ListChatsError::Store(e)) => {
            tracing::error!("Failed to list chats for user {}: {}", caller, e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorDto::new("failed to list chats")),
            ));
        }
    };

    Ok(Json(ChatListDto {
        data: chats
            .into_iter()
            .map(|chat| ChatSummaryDto {
                id: chat.room_id.value(),
                other_user_id: chat.other_user_id.map(|u| u.value()),
                last_message: chat.last_message,
                last_message_at: chat.last_message_at.map(|t| timestamp_to_rfc3339(t.value())),
                unread_count: chat.unread_count,
            })
            .collect(),
    }))
}

/// Leave a chat; the room stays for the other participant
pub async fn leave_chat(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<u64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<LeaveChatResponse>, ApiError> {
    let room_id = RoomId::new(room_id).map_err(|e| bad_request(e.to_string()))?;
    let caller = UserId::new(query.user_id).map_err(|e| bad_request(e.to_string()))?;

    let discarded_messages = state
        .leave_chat_usecase
        .execute(caller, room_id)
        .await
        .map_err(room_access_error)?;

    Ok(Json(LeaveChatResponse {
        room_id: room_id.value(),
        discarded_messages,
    }))
}
