use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use application::{
    AddChatMemberCommand, ChatDto, ChatMemberDto, ChatSummaryDto, CommandHandler,
    CreateChatCommand, GetChatsQuery, QueryHandler, RemoveChatMemberCommand,
};

use crate::{
    error::ApiError,
    extract::{ApiJson, ApiPath},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatPayload {
    name: String,
    description: Option<String>,
    #[serde(default)]
    is_default: bool,
    created_by_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberPayload {
    user_id: Uuid,
    #[serde(default)]
    is_admin: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_chats).post(create_chat))
        .route("/{chat_id}/members", post(add_member))
        .route("/{chat_id}/members/{user_id}", delete(remove_member))
}

async fn list_chats(State(state): State<AppState>) -> Result<Json<Vec<ChatSummaryDto>>, ApiError> {
    let chats = state
        .application
        .chat_queries
        .handle(GetChatsQuery)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "failed to list chats");
            ApiError::internal_server_error("An error occurred while retrieving chats")
        })?;

    Ok(Json(chats))
}

async fn create_chat(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateChatPayload>,
) -> Result<Json<ChatDto>, ApiError> {
    let dto = state
        .application
        .chats
        .handle(CreateChatCommand {
            name: payload.name,
            description: payload.description,
            is_default: payload.is_default,
            created_by_id: payload.created_by_id,
        })
        .await
        .map_err(|err| {
            let api = ApiError::from(err);
            // 创建者不存在属于请求本身无效
            if api.status() == StatusCode::NOT_FOUND {
                tracing::warn!(error = %api.message(), "failed to create chat");
                api.with_status(StatusCode::BAD_REQUEST)
            } else {
                api
            }
        })?;

    Ok(Json(dto))
}

async fn add_member(
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AddMemberPayload>,
) -> Result<(StatusCode, Json<ChatMemberDto>), ApiError> {
    let dto = state
        .application
        .chats
        .handle(AddChatMemberCommand {
            chat_id,
            user_id: payload.user_id,
            is_admin: payload.is_admin,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn remove_member(
    State(state): State<AppState>,
    ApiPath((chat_id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .application
        .chats
        .handle(RemoveChatMemberCommand { chat_id, user_id })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
