//! 聊天实体

use serde::{Deserialize, Serialize};

use super::chat_member::ChatMember;
use crate::errors::DomainError;
use crate::value_objects::{ChatId, Timestamp, UserId};

/// 聊天：名称非空，创建者自动成为第一个成员。
///
/// 消息不随聊天加载，通过 `MessageRepository` 按聊天分页读取；
/// 删除聊天时成员和消息级联删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: Timestamp,
    pub created_by: UserId,
    pub members: Vec<ChatMember>,
}

impl Chat {
    pub const MAX_NAME_LEN: usize = 100;
    pub const MAX_DESCRIPTION_LEN: usize = 500;

    pub fn new(
        id: ChatId,
        name: impl Into<String>,
        description: Option<String>,
        created_by: UserId,
        is_default: bool,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name.into())?;
        let description = Self::validate_description(description)?;
        Ok(Self {
            id,
            name,
            description,
            is_default,
            created_at,
            created_by,
            members: Vec::new(),
        })
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.iter().any(|member| member.user_id == user_id)
    }

    pub fn member(&self, user_id: UserId) -> Option<&ChatMember> {
        self.members.iter().find(|member| member.user_id == user_id)
    }

    /// 重复添加同一用户是错误，而不是空操作。
    pub fn add_member(
        &mut self,
        user_id: UserId,
        is_admin: bool,
        now: Timestamp,
    ) -> Result<&ChatMember, DomainError> {
        if self.is_member(user_id) {
            return Err(DomainError::UserAlreadyMember);
        }
        self.members
            .push(ChatMember::new(self.id, user_id, is_admin, now));
        Ok(&self.members[self.members.len() - 1])
    }

    pub fn remove_member(&mut self, user_id: UserId) -> Result<ChatMember, DomainError> {
        let position = self
            .members
            .iter()
            .position(|member| member.user_id == user_id)
            .ok_or(DomainError::UserNotMember)?;
        Ok(self.members.remove(position))
    }

    fn validate_name(name: String) -> Result<String, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument(
                "name",
                "Chat name cannot be empty",
            ));
        }
        if trimmed.chars().count() > Self::MAX_NAME_LEN {
            return Err(DomainError::invalid_argument("name", "too long"));
        }
        Ok(trimmed.to_owned())
    }

    fn validate_description(description: Option<String>) -> Result<Option<String>, DomainError> {
        match description {
            Some(text) if text.chars().count() > Self::MAX_DESCRIPTION_LEN => Err(
                DomainError::invalid_argument("description", "too long"),
            ),
            other => Ok(other),
        }
    }
}

/// 聊天列表读模型，附带创建者姓名。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: ChatId,
    pub name: String,
    pub created_by: UserId,
    pub created_by_name: String,
    pub created_at: Timestamp,
}
