use async_trait::async_trait;
use domain::{ChatId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cqrs::dtos::MessageDto;

/// 推送给聊天分组内所有连接的事件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChatEvent {
    ReceiveMessage { message: MessageDto },
    MessageEdited { message: MessageDto },
}

impl ChatEvent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            ChatEvent::ReceiveMessage { message } | ChatEvent::MessageEdited { message } => {
                ChatId::from(message.chat_id)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 分组推送。每个连接最多投递一次，不确认也不重试。
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    /// 返回实际投递到的连接数。
    async fn publish(&self, chat_id: ChatId, event: ChatEvent) -> Result<usize, BroadcastError>;

    /// 把用户的所有在线连接移出聊天分组，返回被移出的连接数。
    /// 成员被移除后调用，之后的事件不再推送给该用户。
    async fn evict_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<usize, BroadcastError>;
}
