//! 数据传输对象（DTO）定义
//!
//! 对外 JSON 字段统一使用 camelCase。

use chrono::{DateTime, Utc};
use domain::{Chat, ChatMember, ChatSummary, MessageWithSender, SenderProfile, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户公开投影，不含任何密码信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            email: user.email.to_string(),
            first_name: user.first_name.to_string(),
            last_name: user.last_name.to_string(),
        }
    }
}

/// 用户详情
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailsDto {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<&User> for UserDetailsDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            email: user.email.to_string(),
            first_name: user.first_name.to_string(),
            last_name: user.last_name.to_string(),
            created_at: user.created_at,
            last_login_at: user.last_login_at,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub created_by_id: Uuid,
}

impl From<&Chat> for ChatDto {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id.into(),
            name: chat.name.clone(),
            description: chat.description.clone(),
            is_default: chat.is_default,
            created_at: chat.created_at,
            created_by_id: chat.created_by.into(),
        }
    }
}

/// 聊天列表项，`created_by` 为创建者全名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummaryDto {
    pub id: Uuid,
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatSummary> for ChatSummaryDto {
    fn from(summary: ChatSummary) -> Self {
        Self {
            id: summary.id.into(),
            name: summary.name,
            created_by: summary.created_by_name,
            created_at: summary.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMemberDto {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub is_admin: bool,
}

impl From<&ChatMember> for ChatMemberDto {
    fn from(member: &ChatMember) -> Self {
        Self {
            chat_id: member.chat_id.into(),
            user_id: member.user_id.into(),
            joined_at: member.joined_at,
            is_admin: member.is_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderDto {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl From<&SenderProfile> for SenderDto {
    fn from(sender: &SenderProfile) -> Self {
        Self {
            id: sender.id.into(),
            first_name: sender.first_name.clone(),
            last_name: sender.last_name.clone(),
        }
    }
}

/// 反规范化的消息载荷，HTTP 响应与实时推送共用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_edited: bool,
    pub sender: SenderDto,
}

impl From<&MessageWithSender> for MessageDto {
    fn from(detailed: &MessageWithSender) -> Self {
        let message = &detailed.message;
        Self {
            id: message.id.into(),
            chat_id: message.chat_id.into(),
            content: message.content.as_str().to_owned(),
            created_at: message.created_at,
            edited_at: message.edited_at,
            is_edited: message.is_edited,
            sender: SenderDto::from(&detailed.sender),
        }
    }
}
