//! 消息查询处理器

use std::sync::Arc;

use async_trait::async_trait;
use domain::{ChatId, ChatRepository, DomainError, MessageId, MessageRepository};

use super::chat_command_handler::chat_not_found;
use crate::cqrs::{dtos::MessageDto, GetChatMessagesQuery, GetMessageQuery, QueryHandler};
use crate::error::ApplicationResult;

pub struct MessageQueryHandler {
    chat_repository: Arc<dyn ChatRepository>,
    message_repository: Arc<dyn MessageRepository>,
}

impl MessageQueryHandler {
    pub fn new(
        chat_repository: Arc<dyn ChatRepository>,
        message_repository: Arc<dyn MessageRepository>,
    ) -> Self {
        Self {
            chat_repository,
            message_repository,
        }
    }
}

#[async_trait]
impl QueryHandler<GetChatMessagesQuery> for MessageQueryHandler {
    async fn handle(&self, query: GetChatMessagesQuery) -> ApplicationResult<Vec<MessageDto>> {
        let chat_id = ChatId::from(query.chat_id);
        if !self.chat_repository.exists(chat_id).await? {
            return Err(chat_not_found(chat_id));
        }

        let (skip, take) = query.page();
        let messages = self
            .message_repository
            .list_by_chat(chat_id, skip, take)
            .await?;
        Ok(messages.iter().map(MessageDto::from).collect())
    }
}

#[async_trait]
impl QueryHandler<GetMessageQuery> for MessageQueryHandler {
    async fn handle(&self, query: GetMessageQuery) -> ApplicationResult<MessageDto> {
        let message = self
            .message_repository
            .find_detailed(MessageId::from(query.message_id))
            .await?
            .ok_or(DomainError::MessageNotFound)?;
        Ok(MessageDto::from(&message))
    }
}
