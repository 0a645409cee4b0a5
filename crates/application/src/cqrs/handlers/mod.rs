//! 命令与查询处理器

pub mod chat_command_handler;
pub mod chat_query_handler;
pub mod message_command_handler;
pub mod message_query_handler;
pub mod user_command_handler;
pub mod user_query_handler;

pub use chat_command_handler::ChatCommandHandler;
pub use chat_query_handler::ChatQueryHandler;
pub use message_command_handler::MessageCommandHandler;
pub use message_query_handler::MessageQueryHandler;
pub use user_command_handler::UserCommandHandler;
pub use user_query_handler::UserQueryHandler;
