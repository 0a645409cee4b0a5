//! 仓储抽象
//!
//! 每个方法返回 `'static` 的装箱 future，实现方在内部克隆连接池或存储句柄，
//! 每次调用独立获取工作单元。

use futures::future::BoxFuture;

use crate::entities::{Chat, ChatMember, ChatSummary, Message, MessageWithSender, User};
use crate::errors::RepositoryError;
use crate::value_objects::{ChatId, MessageId, UserEmail, UserId};

pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type RepositoryFuture<T> = BoxFuture<'static, RepositoryResult<T>>;

#[cfg_attr(feature = "testing", mockall::automock)]
pub trait UserRepository: Send + Sync {
    fn find_by_id(&self, id: UserId) -> RepositoryFuture<Option<User>>;
    fn find_by_email(&self, email: UserEmail) -> RepositoryFuture<Option<User>>;
    fn list_all(&self) -> RepositoryFuture<Vec<User>>;
    /// 邮箱重复时返回 `RepositoryError::Conflict`。
    fn create(&self, user: User) -> RepositoryFuture<User>;
    /// 按邮箱原子地查找或插入。已存在时返回库中记录，候选值被丢弃。
    fn upsert_by_email(&self, candidate: User) -> RepositoryFuture<User>;
    fn update(&self, user: User) -> RepositoryFuture<User>;
    /// 仍被聊天或消息引用时返回 `RepositoryError::Conflict`。
    fn delete(&self, id: UserId) -> RepositoryFuture<()>;
    fn exists(&self, id: UserId) -> RepositoryFuture<bool>;
    fn exists_by_email(&self, email: UserEmail) -> RepositoryFuture<bool>;
}

#[cfg_attr(feature = "testing", mockall::automock)]
pub trait ChatRepository: Send + Sync {
    /// 返回的聊天包含成员列表，按加入时间排序。
    fn find_by_id(&self, id: ChatId) -> RepositoryFuture<Option<Chat>>;
    fn list_all(&self) -> RepositoryFuture<Vec<Chat>>;
    fn list_summaries(&self) -> RepositoryFuture<Vec<ChatSummary>>;
    fn list_by_user(&self, user_id: UserId) -> RepositoryFuture<Vec<Chat>>;
    fn find_default(&self) -> RepositoryFuture<Option<Chat>>;
    /// 聊天与其成员一起写入。已存在默认聊天时再创建默认聊天返回 `Conflict`。
    fn create(&self, chat: Chat) -> RepositoryFuture<Chat>;
    fn update(&self, chat: Chat) -> RepositoryFuture<Chat>;
    /// 级联删除成员和消息。
    fn delete(&self, id: ChatId) -> RepositoryFuture<()>;
    fn exists(&self, id: ChatId) -> RepositoryFuture<bool>;
    fn is_member(&self, chat_id: ChatId, user_id: UserId) -> RepositoryFuture<bool>;
    fn add_member(&self, member: ChatMember) -> RepositoryFuture<ChatMember>;
    fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> RepositoryFuture<()>;
}

#[cfg_attr(feature = "testing", mockall::automock)]
pub trait MessageRepository: Send + Sync {
    fn find_by_id(&self, id: MessageId) -> RepositoryFuture<Option<Message>>;
    fn find_detailed(&self, id: MessageId) -> RepositoryFuture<Option<MessageWithSender>>;
    /// 取最新的 `skip..skip+take` 条消息，页内按创建时间升序返回。
    fn list_by_chat(
        &self,
        chat_id: ChatId,
        skip: u32,
        take: u32,
    ) -> RepositoryFuture<Vec<MessageWithSender>>;
    fn list_by_sender(&self, sender_id: UserId) -> RepositoryFuture<Vec<Message>>;
    fn create(&self, message: Message) -> RepositoryFuture<Message>;
    fn update(&self, message: Message) -> RepositoryFuture<Message>;
    fn delete(&self, id: MessageId) -> RepositoryFuture<()>;
    fn exists(&self, id: MessageId) -> RepositoryFuture<bool>;
    fn count_by_chat(&self, chat_id: ChatId) -> RepositoryFuture<u64>;
}
