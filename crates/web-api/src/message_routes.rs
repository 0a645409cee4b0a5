use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use application::{
    CommandHandler, EditMessageCommand, GetChatMessagesQuery, GetMessageQuery, IdentityClaims,
    MessageDto, QueryHandler, SendMessageCommand,
};

use crate::{
    error::ApiError,
    extract::{ApiPath, ApiQuery},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct PageQuery {
    skip: Option<u32>,
    take: Option<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/{chat_id}", get(list_messages).post(send_message))
        .route("/{message_id}", get(get_message).put(edit_message))
}

/// 消息正文：JSON 字符串（`"hello"`）或纯文本
#[derive(Debug)]
pub struct MessageBody(pub String);

impl<S> FromRequest<S> for MessageBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| ApiError::bad_request(err.body_text()))?;

        if is_json {
            serde_json::from_slice::<String>(&bytes)
                .map(MessageBody)
                .map_err(|err| ApiError::bad_request(format!("Invalid message body: {err}")))
        } else {
            String::from_utf8(bytes.to_vec())
                .map(MessageBody)
                .map_err(|_| ApiError::bad_request("Message body must be valid UTF-8"))
        }
    }
}

async fn list_messages(
    State(state): State<AppState>,
    ApiPath(chat_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let items = state
        .application
        .message_queries
        .handle(GetChatMessagesQuery {
            chat_id,
            skip: page.skip,
            take: page.take,
        })
        .await?;

    Ok(Json(items))
}

async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityClaims>,
    ApiPath(chat_id): ApiPath<Uuid>,
    MessageBody(content): MessageBody,
) -> Result<(StatusCode, HeaderMap, Json<MessageDto>), ApiError> {
    let dto = state
        .application
        .messages
        .handle(SendMessageCommand {
            chat_id,
            content,
            sender: identity,
        })
        .await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/messages/{}", dto.id)) {
        headers.insert(LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(dto)))
}

async fn get_message(
    State(state): State<AppState>,
    ApiPath(message_id): ApiPath<Uuid>,
) -> Result<Json<MessageDto>, ApiError> {
    let dto = state
        .application
        .message_queries
        .handle(GetMessageQuery { message_id })
        .await?;

    Ok(Json(dto))
}

async fn edit_message(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityClaims>,
    ApiPath(message_id): ApiPath<Uuid>,
    MessageBody(content): MessageBody,
) -> Result<Json<MessageDto>, ApiError> {
    let dto = state
        .application
        .messages
        .handle(EditMessageCommand {
            message_id,
            content,
            editor: identity,
        })
        .await?;

    Ok(Json(dto))
}
