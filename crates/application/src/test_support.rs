//! 单元测试共用的替身

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain::{
    ChatId, Message, MessageWithSender, PasswordHash, PersonName, RepositoryFuture,
    RepositoryResult, SenderProfile, Timestamp, User, UserEmail, UserId,
};

use crate::broadcaster::{BroadcastError, ChatEvent, MessageBroadcaster};
use crate::clock::Clock;
use crate::password::{PasswordHasher, PasswordHasherError};

pub fn ready<T: Send + 'static>(value: RepositoryResult<T>) -> RepositoryFuture<T> {
    Box::pin(futures::future::ready(value))
}

pub fn sample_user(email: &str) -> User {
    let local = email.split('@').next().unwrap_or("member");
    User::register(
        UserId::generate(),
        UserEmail::parse(email).unwrap(),
        PersonName::parse("first_name", local).unwrap(),
        PersonName::parse("last_name", "Family").unwrap(),
        None,
        FixedClock::default().0,
    )
}

pub fn with_sender(message: Message, sender: &User) -> MessageWithSender {
    MessageWithSender {
        message,
        sender: SenderProfile {
            id: sender.id,
            first_name: sender.first_name.to_string(),
            last_name: sender.last_name.to_string(),
        },
    }
}

pub struct FixedClock(pub Timestamp);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// 以 `hashed:` 前缀代替真实哈希
pub struct FakeHasher;

#[async_trait]
impl PasswordHasher for FakeHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        PasswordHash::new(format!("hashed:{plaintext}"))
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        Ok(hashed.as_str() == format!("hashed:{plaintext}"))
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(ChatId, ChatEvent)>>,
    evictions: Mutex<Vec<(ChatId, UserId)>>,
    failure: Mutex<Option<BroadcastError>>,
}

impl RecordingBroadcaster {
    pub fn failing(error: BroadcastError) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            evictions: Mutex::new(Vec::new()),
            failure: Mutex::new(Some(error)),
        }
    }

    pub fn events(&self) -> Vec<(ChatId, ChatEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn evictions(&self) -> Vec<(ChatId, UserId)> {
        self.evictions.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBroadcaster for RecordingBroadcaster {
    async fn publish(&self, chat_id: ChatId, event: ChatEvent) -> Result<usize, BroadcastError> {
        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error);
        }
        self.events.lock().unwrap().push((chat_id, event));
        Ok(1)
    }

    async fn evict_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<usize, BroadcastError> {
        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error);
        }
        self.evictions.lock().unwrap().push((chat_id, user_id));
        Ok(1)
    }
}
