//! 命令定义

use domain::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dtos::{ChatDto, ChatMemberDto, MessageDto, UserDto};
use super::Command;
use crate::identity::IdentityClaims;

/// 显式注册用户
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserCommand {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl Command for CreateUserCommand {
    type Result = UserDto;
}

/// 按身份声明幂等地查找或创建用户
#[derive(Debug, Clone)]
pub struct ResolveUserCommand {
    pub claims: IdentityClaims,
    /// 同时记录最近登录时间
    pub record_login: bool,
}

impl Command for ResolveUserCommand {
    type Result = User;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatCommand {
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_by_id: Uuid,
}

impl Command for CreateChatCommand {
    type Result = ChatDto;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddChatMemberCommand {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Command for AddChatMemberCommand {
    type Result = ChatMemberDto;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveChatMemberCommand {
    pub chat_id: Uuid,
    pub user_id: Uuid,
}

impl Command for RemoveChatMemberCommand {
    type Result = ();
}

/// 持久化并广播一条消息
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub chat_id: Uuid,
    pub content: String,
    pub sender: IdentityClaims,
}

impl Command for SendMessageCommand {
    type Result = MessageDto;
}

/// 编辑消息，只有发送者本人可以编辑
#[derive(Debug, Clone)]
pub struct EditMessageCommand {
    pub message_id: Uuid,
    pub content: String,
    pub editor: IdentityClaims,
}

impl Command for EditMessageCommand {
    type Result = MessageDto;
}
