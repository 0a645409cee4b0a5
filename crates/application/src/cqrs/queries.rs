//! 查询定义

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dtos::{ChatSummaryDto, MessageDto, UserDetailsDto};
use super::Query;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetChatsQuery;

impl Query for GetChatsQuery {
    type Result = Vec<ChatSummaryDto>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserDetailsQuery {
    pub user_id: Uuid,
}

impl Query for GetUserDetailsQuery {
    type Result = UserDetailsDto;
}

/// 分页读取聊天消息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetChatMessagesQuery {
    pub chat_id: Uuid,
    pub skip: Option<u32>,
    pub take: Option<u32>,
}

impl GetChatMessagesQuery {
    pub const DEFAULT_TAKE: u32 = 50;
    pub const MAX_TAKE: u32 = 100;

    pub fn page(&self) -> (u32, u32) {
        let take = self.take.unwrap_or(Self::DEFAULT_TAKE).min(Self::MAX_TAKE);
        (self.skip.unwrap_or(0), take)
    }
}

impl Query for GetChatMessagesQuery {
    type Result = Vec<MessageDto>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessageQuery {
    pub message_id: Uuid,
}

impl Query for GetMessageQuery {
    type Result = MessageDto;
}

/// 校验用户是否可以订阅聊天的实时推送
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeChatSubscriptionQuery {
    pub chat_id: Uuid,
    pub user_id: Uuid,
}

impl Query for AuthorizeChatSubscriptionQuery {
    type Result = ();
}
