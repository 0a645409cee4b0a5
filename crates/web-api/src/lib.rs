//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP / WebSocket 请求委托给应用层的命令与查询处理器。

mod auth;
mod chat_routes;
mod error;
mod extract;
mod message_routes;
mod routes;
mod state;
mod user_routes;
mod ws_connection;

pub use auth::{Claims, JwtService, OneOrMany, ACCESS_TOKEN_PARAM};
pub use config::JwtConfig;
pub use error::{ApiError, ErrorBody};
pub use routes::{cors_layer, router};
pub use state::AppState;
pub use ws_connection::{ClientFrame, ServerFrame};
