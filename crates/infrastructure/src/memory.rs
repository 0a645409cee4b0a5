//! 内存存储
//!
//! 三个仓储共享同一份状态，约束与 PostgreSQL 版本一致：邮箱唯一、
//! 单一默认聊天、外键存在性、删除聊天级联删除成员和消息。

use std::collections::HashMap;
use std::sync::Arc;

use domain::{
    Chat, ChatId, ChatMember, ChatRepository, ChatSummary, Message, MessageId, MessageRepository,
    MessageWithSender, RepositoryError, RepositoryFuture, SenderProfile, User, UserEmail, UserId,
    UserRepository,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    /// 聊天本身，`members` 字段始终为空，成员单独存放
    chats: HashMap<ChatId, Chat>,
    members: HashMap<(ChatId, UserId), ChatMember>,
    messages: HashMap<MessageId, Message>,
}

impl MemoryState {
    fn email_taken(&self, email: &UserEmail, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|user| &user.email == email && Some(user.id) != except)
    }

    fn default_taken(&self, except: Option<ChatId>) -> bool {
        self.chats
            .values()
            .any(|chat| chat.is_default && Some(chat.id) != except)
    }

    fn user_referenced(&self, id: UserId) -> bool {
        self.chats.values().any(|chat| chat.created_by == id)
            || self.members.keys().any(|(_, user_id)| *user_id == id)
            || self.messages.values().any(|message| message.sender_id == id)
    }

    fn chat_members(&self, chat_id: ChatId) -> Vec<ChatMember> {
        let mut members: Vec<ChatMember> = self
            .members
            .values()
            .filter(|member| member.chat_id == chat_id)
            .cloned()
            .collect();
        members.sort_by_key(|member| (member.joined_at, member.user_id.0));
        members
    }

    fn with_members(&self, chat: &Chat) -> Chat {
        let mut chat = chat.clone();
        chat.members = self.chat_members(chat.id);
        chat
    }

    fn sorted_chats<'a>(&self, chats: impl Iterator<Item = &'a Chat>) -> Vec<Chat> {
        let mut chats: Vec<Chat> = chats.map(|chat| self.with_members(chat)).collect();
        chats.sort_by_key(|chat| (chat.created_at, chat.id.0));
        chats
    }

    fn detailed(&self, message: &Message) -> Option<MessageWithSender> {
        let sender = self.users.get(&message.sender_id)?;
        Some(MessageWithSender {
            message: message.clone(),
            sender: SenderProfile {
                id: sender.id,
                first_name: sender.first_name.to_string(),
                last_name: sender.last_name.to_string(),
            },
        })
    }
}

type SharedState = Arc<RwLock<MemoryState>>;

#[derive(Clone)]
pub struct InMemoryUserRepository {
    state: SharedState,
}

impl UserRepository for InMemoryUserRepository {
    fn find_by_id(&self, id: UserId) -> RepositoryFuture<Option<User>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.users.get(&id).cloned())
        })
    }

    fn find_by_email(&self, email: UserEmail) -> RepositoryFuture<Option<User>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.users.values().find(|user| user.email == email).cloned())
        })
    }

    fn list_all(&self) -> RepositoryFuture<Vec<User>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            let mut users: Vec<User> = state.users.values().cloned().collect();
            users.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.email.as_str().cmp(b.email.as_str()))
            });
            Ok(users)
        })
    }

    fn create(&self, user: User) -> RepositoryFuture<User> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            if state.users.contains_key(&user.id) || state.email_taken(&user.email, None) {
                return Err(RepositoryError::Conflict);
            }
            state.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    fn upsert_by_email(&self, candidate: User) -> RepositoryFuture<User> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            if let Some(existing) = state
                .users
                .values()
                .find(|user| user.email == candidate.email)
            {
                return Ok(existing.clone());
            }
            if state.users.contains_key(&candidate.id) {
                return Err(RepositoryError::Conflict);
            }
            state.users.insert(candidate.id, candidate.clone());
            Ok(candidate)
        })
    }

    fn update(&self, user: User) -> RepositoryFuture<User> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            let created_at = match state.users.get(&user.id) {
                Some(existing) => existing.created_at,
                None => return Err(RepositoryError::NotFound),
            };
            if state.email_taken(&user.email, Some(user.id)) {
                return Err(RepositoryError::Conflict);
            }
            let mut user = user;
            user.created_at = created_at;
            state.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    fn delete(&self, id: UserId) -> RepositoryFuture<()> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            if !state.users.contains_key(&id) {
                return Err(RepositoryError::NotFound);
            }
            if state.user_referenced(id) {
                return Err(RepositoryError::Conflict);
            }
            state.users.remove(&id);
            Ok(())
        })
    }

    fn exists(&self, id: UserId) -> RepositoryFuture<bool> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.users.contains_key(&id))
        })
    }

    fn exists_by_email(&self, email: UserEmail) -> RepositoryFuture<bool> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.email_taken(&email, None))
        })
    }
}

#[derive(Clone)]
pub struct InMemoryChatRepository {
    state: SharedState,
}

impl ChatRepository for InMemoryChatRepository {
    fn find_by_id(&self, id: ChatId) -> RepositoryFuture<Option<Chat>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.chats.get(&id).map(|chat| state.with_members(chat)))
        })
    }

    fn list_all(&self) -> RepositoryFuture<Vec<Chat>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.sorted_chats(state.chats.values()))
        })
    }

    fn list_summaries(&self) -> RepositoryFuture<Vec<ChatSummary>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            let summaries = state
                .sorted_chats(state.chats.values())
                .into_iter()
                .filter_map(|chat| {
                    let creator = state.users.get(&chat.created_by)?;
                    Some(ChatSummary {
                        id: chat.id,
                        name: chat.name,
                        created_by: chat.created_by,
                        created_by_name: creator.full_name(),
                        created_at: chat.created_at,
                    })
                })
                .collect();
            Ok(summaries)
        })
    }

    fn list_by_user(&self, user_id: UserId) -> RepositoryFuture<Vec<Chat>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            let joined = state
                .chats
                .values()
                .filter(|chat| state.members.contains_key(&(chat.id, user_id)));
            Ok(state.sorted_chats(joined))
        })
    }

    fn find_default(&self) -> RepositoryFuture<Option<Chat>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state
                .chats
                .values()
                .find(|chat| chat.is_default)
                .map(|chat| state.with_members(chat)))
        })
    }

    fn create(&self, chat: Chat) -> RepositoryFuture<Chat> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            if state.chats.contains_key(&chat.id) {
                return Err(RepositoryError::Conflict);
            }
            if chat.is_default && state.default_taken(None) {
                return Err(RepositoryError::Conflict);
            }
            let creator_known = state.users.contains_key(&chat.created_by);
            let members_known = chat
                .members
                .iter()
                .all(|member| state.users.contains_key(&member.user_id));
            if !creator_known || !members_known {
                return Err(RepositoryError::NotFound);
            }

            for member in &chat.members {
                state
                    .members
                    .insert((chat.id, member.user_id), member.clone());
            }
            let mut stored = chat.clone();
            stored.members.clear();
            state.chats.insert(chat.id, stored);
            Ok(chat)
        })
    }

    fn update(&self, chat: Chat) -> RepositoryFuture<Chat> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            if chat.is_default && state.default_taken(Some(chat.id)) {
                return Err(RepositoryError::Conflict);
            }
            let stored = state
                .chats
                .get_mut(&chat.id)
                .ok_or(RepositoryError::NotFound)?;
            stored.name = chat.name;
            stored.description = chat.description;
            stored.is_default = chat.is_default;
            let stored = stored.clone();
            Ok(state.with_members(&stored))
        })
    }

    fn delete(&self, id: ChatId) -> RepositoryFuture<()> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            if state.chats.remove(&id).is_none() {
                return Err(RepositoryError::NotFound);
            }
            state.members.retain(|(chat_id, _), _| *chat_id != id);
            state.messages.retain(|_, message| message.chat_id != id);
            Ok(())
        })
    }

    fn exists(&self, id: ChatId) -> RepositoryFuture<bool> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.chats.contains_key(&id))
        })
    }

    fn is_member(&self, chat_id: ChatId, user_id: UserId) -> RepositoryFuture<bool> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.members.contains_key(&(chat_id, user_id)))
        })
    }

    fn add_member(&self, member: ChatMember) -> RepositoryFuture<ChatMember> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            if !state.chats.contains_key(&member.chat_id) || !state.users.contains_key(&member.user_id)
            {
                return Err(RepositoryError::NotFound);
            }
            let key = (member.chat_id, member.user_id);
            if state.members.contains_key(&key) {
                return Err(RepositoryError::Conflict);
            }
            state.members.insert(key, member.clone());
            Ok(member)
        })
    }

    fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> RepositoryFuture<()> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            state
                .members
                .remove(&(chat_id, user_id))
                .map(|_| ())
                .ok_or(RepositoryError::NotFound)
        })
    }
}

#[derive(Clone)]
pub struct InMemoryMessageRepository {
    state: SharedState,
}

impl MessageRepository for InMemoryMessageRepository {
    fn find_by_id(&self, id: MessageId) -> RepositoryFuture<Option<Message>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.messages.get(&id).cloned())
        })
    }

    fn find_detailed(&self, id: MessageId) -> RepositoryFuture<Option<MessageWithSender>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state
                .messages
                .get(&id)
                .and_then(|message| state.detailed(message)))
        })
    }

    fn list_by_chat(
        &self,
        chat_id: ChatId,
        skip: u32,
        take: u32,
    ) -> RepositoryFuture<Vec<MessageWithSender>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            let mut messages: Vec<&Message> = state
                .messages
                .values()
                .filter(|message| message.chat_id == chat_id)
                .collect();
            messages.sort_by_key(|message| std::cmp::Reverse((message.created_at, message.id.0)));

            let mut page: Vec<MessageWithSender> = messages
                .into_iter()
                .skip(skip as usize)
                .take(take as usize)
                .filter_map(|message| state.detailed(message))
                .collect();
            page.reverse();
            Ok(page)
        })
    }

    fn list_by_sender(&self, sender_id: UserId) -> RepositoryFuture<Vec<Message>> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            let mut messages: Vec<Message> = state
                .messages
                .values()
                .filter(|message| message.sender_id == sender_id)
                .cloned()
                .collect();
            messages.sort_by_key(|message| (message.created_at, message.id.0));
            Ok(messages)
        })
    }

    fn create(&self, message: Message) -> RepositoryFuture<Message> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            if !state.chats.contains_key(&message.chat_id)
                || !state.users.contains_key(&message.sender_id)
            {
                return Err(RepositoryError::NotFound);
            }
            if state.messages.contains_key(&message.id) {
                return Err(RepositoryError::Conflict);
            }
            state.messages.insert(message.id, message.clone());
            Ok(message)
        })
    }

    fn update(&self, message: Message) -> RepositoryFuture<Message> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            let stored = state
                .messages
                .get_mut(&message.id)
                .ok_or(RepositoryError::NotFound)?;
            stored.content = message.content;
            stored.edited_at = message.edited_at;
            stored.is_edited = message.is_edited;
            Ok(stored.clone())
        })
    }

    fn delete(&self, id: MessageId) -> RepositoryFuture<()> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            state
                .messages
                .remove(&id)
                .map(|_| ())
                .ok_or(RepositoryError::NotFound)
        })
    }

    fn exists(&self, id: MessageId) -> RepositoryFuture<bool> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state.messages.contains_key(&id))
        })
    }

    fn count_by_chat(&self, chat_id: ChatId) -> RepositoryFuture<u64> {
        let state = self.state.clone();
        Box::pin(async move {
            let state = state.read().await;
            Ok(state
                .messages
                .values()
                .filter(|message| message.chat_id == chat_id)
                .count() as u64)
        })
    }
}

/// 内存存储，结构与 `PgStorage` 对应
pub struct InMemoryStorage {
    pub user_repository: Arc<InMemoryUserRepository>,
    pub chat_repository: Arc<InMemoryChatRepository>,
    pub message_repository: Arc<InMemoryMessageRepository>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        let state: SharedState = Arc::new(RwLock::new(MemoryState::default()));
        Self {
            user_repository: Arc::new(InMemoryUserRepository {
                state: state.clone(),
            }),
            chat_repository: Arc::new(InMemoryChatRepository {
                state: state.clone(),
            }),
            message_repository: Arc::new(InMemoryMessageRepository { state }),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}
