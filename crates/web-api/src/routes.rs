use axum::{
    http::{HeaderValue, Method, StatusCode},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::require_identity, chat_routes, message_routes, state::AppState, user_routes,
    ws_connection,
};

pub fn router(state: AppState) -> Router {
    // 聊天与消息接口需要 Bearer 令牌，用户注册保持开放
    let protected = Router::new()
        .nest("/chats", chat_routes::routes())
        .nest("/messages", message_routes::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    let api = Router::new()
        .nest("/users", user_routes::routes())
        .merge(protected);

    Router::new()
        .route("/health", get(health))
        .route("/hubs/chat", get(ws_connection::websocket_upgrade))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `*` 表示允许任意来源
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
