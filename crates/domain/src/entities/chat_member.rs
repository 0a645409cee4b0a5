use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, Timestamp, UserId};

/// 聊天成员，以 (chat_id, user_id) 为键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMember {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub joined_at: Timestamp,
    pub is_admin: bool,
}

impl ChatMember {
    pub fn new(chat_id: ChatId, user_id: UserId, is_admin: bool, joined_at: Timestamp) -> Self {
        Self {
            chat_id,
            user_id,
            joined_at,
            is_admin,
        }
    }
}
