//! 消息实体定义

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, MessageContent, MessageId, Timestamp, UserId};

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub created_at: Timestamp,
    pub edited_at: Option<Timestamp>,
    pub is_edited: bool,
}

impl Message {
    pub fn new(
        id: MessageId,
        chat_id: ChatId,
        sender_id: UserId,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            chat_id,
            sender_id,
            content,
            created_at,
            edited_at: None,
            is_edited: false,
        }
    }

    /// 编辑内容。时钟精度不足时 `edited_at` 仍严格晚于 `created_at`。
    pub fn edit(&mut self, content: MessageContent, at: Timestamp) {
        let edited_at = if at > self.created_at {
            at
        } else {
            self.created_at + Duration::microseconds(1)
        };
        self.content = content;
        self.edited_at = Some(edited_at);
        self.is_edited = true;
    }
}

/// 发送者公开资料，随消息反规范化下发。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
}

/// 携带发送者资料的消息读模型。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithSender {
    pub message: Message,
    pub sender: SenderProfile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message() -> Message {
        Message::new(
            MessageId::generate(),
            ChatId::generate(),
            UserId::generate(),
            MessageContent::new("hello").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn new_message_is_unedited() {
        let message = message();
        assert!(!message.is_edited);
        assert!(message.edited_at.is_none());
        assert_eq!(message.content.as_str(), "hello");
    }

    #[test]
    fn edit_sets_flag_and_timestamp() {
        let mut message = message();
        let later = message.created_at + Duration::seconds(5);
        message.edit(MessageContent::new("updated").unwrap(), later);

        assert!(message.is_edited);
        assert_eq!(message.edited_at, Some(later));
        assert_eq!(message.content.as_str(), "updated");
    }

    #[test]
    fn edit_with_stale_clock_still_moves_forward() {
        let mut message = message();
        let created_at = message.created_at;
        message.edit(MessageContent::new("again").unwrap(), created_at);

        assert!(message.edited_at.unwrap() > created_at);
    }
}
