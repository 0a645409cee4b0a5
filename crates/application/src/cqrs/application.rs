//! 应用门面
//!
//! 把仓储、时钟、密码哈希与广播器装配成各个处理器，边界层只依赖这里。

use std::sync::Arc;

use domain::{ChatRepository, MessageRepository, UserRepository};

use super::handlers::{
    ChatCommandHandler, ChatQueryHandler, MessageCommandHandler, MessageQueryHandler,
    UserCommandHandler, UserQueryHandler,
};
use crate::broadcaster::MessageBroadcaster;
use crate::clock::Clock;
use crate::password::PasswordHasher;

#[derive(Clone)]
pub struct ApplicationDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn MessageBroadcaster>,
}

#[derive(Clone)]
pub struct ChatApplication {
    pub users: Arc<UserCommandHandler>,
    pub user_queries: Arc<UserQueryHandler>,
    pub chats: Arc<ChatCommandHandler>,
    pub chat_queries: Arc<ChatQueryHandler>,
    pub messages: Arc<MessageCommandHandler>,
    pub message_queries: Arc<MessageQueryHandler>,
}

impl ChatApplication {
    pub fn new(deps: ApplicationDependencies) -> Self {
        Self {
            users: Arc::new(UserCommandHandler::new(
                deps.user_repository.clone(),
                deps.password_hasher.clone(),
                deps.clock.clone(),
            )),
            user_queries: Arc::new(UserQueryHandler::new(deps.user_repository.clone())),
            chats: Arc::new(ChatCommandHandler::new(
                deps.user_repository.clone(),
                deps.chat_repository.clone(),
                deps.broadcaster.clone(),
                deps.clock.clone(),
            )),
            chat_queries: Arc::new(ChatQueryHandler::new(deps.chat_repository.clone())),
            messages: Arc::new(MessageCommandHandler::new(
                deps.user_repository.clone(),
                deps.chat_repository.clone(),
                deps.message_repository.clone(),
                deps.broadcaster.clone(),
                deps.clock.clone(),
            )),
            message_queries: Arc::new(MessageQueryHandler::new(
                deps.chat_repository,
                deps.message_repository,
            )),
        }
    }
}
