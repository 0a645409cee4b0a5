use axum::{
    extract::State,
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use application::{
    CreateUserCommand, CommandHandler, GetUserDetailsQuery, QueryHandler, UserDetailsDto, UserDto,
};

use crate::{
    error::ApiError,
    extract::{ApiJson, ApiPath},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserPayload {
    email: String,
    first_name: String,
    last_name: String,
    password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/{user_id}", get(get_user))
}

async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserPayload>,
) -> Result<(StatusCode, HeaderMap, Json<UserDto>), ApiError> {
    let dto = state
        .application
        .users
        .handle(CreateUserCommand {
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password: payload.password,
        })
        .await
        .map_err(|err| {
            let api = ApiError::from(err);
            // 注册冲突按 400 返回
            if api.status() == StatusCode::CONFLICT {
                tracing::warn!(error = %api.message(), "failed to create user");
                api.with_status(StatusCode::BAD_REQUEST)
            } else {
                api
            }
        })?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/users/{}", dto.id)) {
        headers.insert(LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(dto)))
}

async fn get_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<UserDetailsDto>, ApiError> {
    let dto = state
        .application
        .user_queries
        .handle(GetUserDetailsQuery { user_id })
        .await?;

    Ok(Json(dto))
}
