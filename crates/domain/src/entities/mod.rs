//! 领域实体定义

pub mod chat;
pub mod chat_member;
pub mod message;
pub mod user;

pub use chat::{Chat, ChatSummary};
pub use chat_member::ChatMember;
pub use message::{Message, MessageWithSender, SenderProfile};
pub use user::User;
