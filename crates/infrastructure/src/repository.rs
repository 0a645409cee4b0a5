//! PostgreSQL 仓储实现
//!
//! 运行期构造的 `query_as` 查询，每次调用克隆连接池并独立获取连接。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::{
    Chat, ChatId, ChatMember, ChatRepository, ChatSummary, Message, MessageContent, MessageId,
    MessageRepository, MessageWithSender, PasswordHash, PersonName, RepositoryError,
    RepositoryFuture, SenderProfile, User, UserEmail, UserId, UserRepository,
};
use sqlx::{error::ErrorKind, postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.kind() {
            ErrorKind::UniqueViolation => return RepositoryError::Conflict,
            ErrorKind::ForeignKeyViolation => return RepositoryError::NotFound,
            _ => {}
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, password_hash, created_at, last_login_at, is_active, device_token";

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
    is_active: bool,
    device_token: Option<String>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let email = UserEmail::parse(value.email).map_err(|err| invalid_data(err.to_string()))?;
        let first_name = PersonName::parse("first_name", value.first_name)
            .map_err(|err| invalid_data(err.to_string()))?;
        let last_name = PersonName::parse("last_name", value.last_name)
            .map_err(|err| invalid_data(err.to_string()))?;
        let password = match value.password_hash {
            Some(hash) => Some(PasswordHash::new(hash).map_err(|err| invalid_data(err.to_string()))?),
            None => None,
        };

        Ok(User {
            id: UserId::from(value.id),
            email,
            first_name,
            last_name,
            password,
            created_at: value.created_at,
            last_login_at: value.last_login_at,
            is_active: value.is_active,
            device_token: value.device_token,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatRecord {
    id: Uuid,
    name: String,
    description: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
    created_by: Uuid,
}

impl ChatRecord {
    fn into_chat(self, members: Vec<ChatMember>) -> Chat {
        Chat {
            id: ChatId::from(self.id),
            name: self.name,
            description: self.description,
            is_default: self.is_default,
            created_at: self.created_at,
            created_by: UserId::from(self.created_by),
            members,
        }
    }
}

#[derive(Debug, FromRow)]
struct ChatSummaryRecord {
    id: Uuid,
    name: String,
    created_by: Uuid,
    created_by_name: String,
    created_at: DateTime<Utc>,
}

impl From<ChatSummaryRecord> for ChatSummary {
    fn from(value: ChatSummaryRecord) -> Self {
        ChatSummary {
            id: ChatId::from(value.id),
            name: value.name,
            created_by: UserId::from(value.created_by),
            created_by_name: value.created_by_name,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MemberRecord {
    chat_id: Uuid,
    user_id: Uuid,
    joined_at: DateTime<Utc>,
    is_admin: bool,
}

impl From<MemberRecord> for ChatMember {
    fn from(value: MemberRecord) -> Self {
        ChatMember::new(
            ChatId::from(value.chat_id),
            UserId::from(value.user_id),
            value.is_admin,
            value.joined_at,
        )
    }
}

const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, content, created_at, edited_at, is_edited";

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_id: Uuid,
    sender_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
    is_edited: bool,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Message {
            id: MessageId::from(value.id),
            chat_id: ChatId::from(value.chat_id),
            sender_id: UserId::from(value.sender_id),
            content,
            created_at: value.created_at,
            edited_at: value.edited_at,
            is_edited: value.is_edited,
        })
    }
}

const DETAILED_MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.chat_id, m.sender_id, m.content, m.created_at, m.edited_at, m.is_edited,
           u.first_name AS sender_first_name, u.last_name AS sender_last_name
    FROM messages m
    JOIN users u ON u.id = m.sender_id
"#;

#[derive(Debug, FromRow)]
struct DetailedMessageRecord {
    #[sqlx(flatten)]
    message: MessageRecord,
    sender_first_name: String,
    sender_last_name: String,
}

impl TryFrom<DetailedMessageRecord> for MessageWithSender {
    type Error = RepositoryError;

    fn try_from(value: DetailedMessageRecord) -> Result<Self, Self::Error> {
        let message = Message::try_from(value.message)?;
        let sender = SenderProfile {
            id: message.sender_id,
            first_name: value.sender_first_name,
            last_name: value.sender_last_name,
        };
        Ok(MessageWithSender { message, sender })
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for PgUserRepository {
    fn find_by_id(&self, id: UserId) -> RepositoryFuture<Option<User>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, UserRecord>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(Uuid::from(id))
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            record.map(User::try_from).transpose()
        })
    }

    fn find_by_email(&self, email: UserEmail) -> RepositoryFuture<Option<User>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, UserRecord>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
            ))
            .bind(email.as_str())
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            record.map(User::try_from).transpose()
        })
    }

    fn list_all(&self) -> RepositoryFuture<Vec<User>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let records = sqlx::query_as::<_, UserRecord>(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, email"
            ))
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            records.into_iter().map(User::try_from).collect()
        })
    }

    fn create(&self, user: User) -> RepositoryFuture<User> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, UserRecord>(&format!(
                r#"
                INSERT INTO users ({USER_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(Uuid::from(user.id))
            .bind(user.email.as_str())
            .bind(user.first_name.as_str())
            .bind(user.last_name.as_str())
            .bind(user.password.as_ref().map(PasswordHash::as_str))
            .bind(user.created_at)
            .bind(user.last_login_at)
            .bind(user.is_active)
            .bind(user.device_token.as_deref())
            .fetch_one(&pool)
            .await
            .map_err(map_sqlx_err)?;

            User::try_from(record)
        })
    }

    fn upsert_by_email(&self, candidate: User) -> RepositoryFuture<User> {
        let pool = self.pool.clone();
        Box::pin(async move {
            // 冲突时做一次空更新，使 RETURNING 总能返回已存在的行
            let record = sqlx::query_as::<_, UserRecord>(&format!(
                r#"
                INSERT INTO users ({USER_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(Uuid::from(candidate.id))
            .bind(candidate.email.as_str())
            .bind(candidate.first_name.as_str())
            .bind(candidate.last_name.as_str())
            .bind(candidate.password.as_ref().map(PasswordHash::as_str))
            .bind(candidate.created_at)
            .bind(candidate.last_login_at)
            .bind(candidate.is_active)
            .bind(candidate.device_token.as_deref())
            .fetch_one(&pool)
            .await
            .map_err(map_sqlx_err)?;

            User::try_from(record)
        })
    }

    fn update(&self, user: User) -> RepositoryFuture<User> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, UserRecord>(&format!(
                r#"
                UPDATE users
                SET email = $2, first_name = $3, last_name = $4, password_hash = $5,
                    last_login_at = $6, is_active = $7, device_token = $8
                WHERE id = $1
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(Uuid::from(user.id))
            .bind(user.email.as_str())
            .bind(user.first_name.as_str())
            .bind(user.last_name.as_str())
            .bind(user.password.as_ref().map(PasswordHash::as_str))
            .bind(user.last_login_at)
            .bind(user.is_active)
            .bind(user.device_token.as_deref())
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;

            User::try_from(record)
        })
    }

    fn delete(&self, id: UserId) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(Uuid::from(id))
                .execute(&pool)
                .await
                .map_err(|err| match map_sqlx_err(err) {
                    // 仍被聊天或消息引用
                    RepositoryError::NotFound => RepositoryError::Conflict,
                    other => other,
                })?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        })
    }

    fn exists(&self, id: UserId) -> RepositoryFuture<bool> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(Uuid::from(id))
                .fetch_one(&pool)
                .await
                .map_err(map_sqlx_err)
        })
    }

    fn exists_by_email(&self, email: UserEmail) -> RepositoryFuture<bool> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&pool)
                .await
                .map_err(map_sqlx_err)
        })
    }
}

#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CHAT_COLUMNS: &str = "id, name, description, is_default, created_at, created_by";

/// 批量加载成员并挂到对应的聊天上
async fn attach_members(pool: &PgPool, records: Vec<ChatRecord>) -> Result<Vec<Chat>, RepositoryError> {
    let ids: Vec<Uuid> = records.iter().map(|record| record.id).collect();
    let members = sqlx::query_as::<_, MemberRecord>(
        r#"
        SELECT chat_id, user_id, joined_at, is_admin
        FROM chat_members
        WHERE chat_id = ANY($1)
        ORDER BY joined_at, user_id
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_err)?;

    let mut by_chat: HashMap<Uuid, Vec<ChatMember>> = HashMap::new();
    for member in members {
        by_chat
            .entry(member.chat_id)
            .or_default()
            .push(ChatMember::from(member));
    }

    Ok(records
        .into_iter()
        .map(|record| {
            let members = by_chat.remove(&record.id).unwrap_or_default();
            record.into_chat(members)
        })
        .collect())
}

impl ChatRepository for PgChatRepository {
    fn find_by_id(&self, id: ChatId) -> RepositoryFuture<Option<Chat>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, ChatRecord>(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"
            ))
            .bind(Uuid::from(id))
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            match record {
                Some(record) => Ok(attach_members(&pool, vec![record]).await?.pop()),
                None => Ok(None),
            }
        })
    }

    fn list_all(&self) -> RepositoryFuture<Vec<Chat>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let records = sqlx::query_as::<_, ChatRecord>(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats ORDER BY created_at, id"
            ))
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            attach_members(&pool, records).await
        })
    }

    fn list_summaries(&self) -> RepositoryFuture<Vec<ChatSummary>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let records = sqlx::query_as::<_, ChatSummaryRecord>(
                r#"
                SELECT c.id, c.name, c.created_by,
                       u.first_name || ' ' || u.last_name AS created_by_name,
                       c.created_at
                FROM chats c
                JOIN users u ON u.id = c.created_by
                ORDER BY c.created_at, c.id
                "#,
            )
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            Ok(records.into_iter().map(ChatSummary::from).collect())
        })
    }

    fn list_by_user(&self, user_id: UserId) -> RepositoryFuture<Vec<Chat>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let records = sqlx::query_as::<_, ChatRecord>(
                r#"
                SELECT c.id, c.name, c.description, c.is_default, c.created_at, c.created_by
                FROM chats c
                JOIN chat_members cm ON cm.chat_id = c.id
                WHERE cm.user_id = $1
                ORDER BY c.created_at, c.id
                "#,
            )
            .bind(Uuid::from(user_id))
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            attach_members(&pool, records).await
        })
    }

    fn find_default(&self) -> RepositoryFuture<Option<Chat>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, ChatRecord>(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE is_default LIMIT 1"
            ))
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            match record {
                Some(record) => Ok(attach_members(&pool, vec![record]).await?.pop()),
                None => Ok(None),
            }
        })
    }

    fn create(&self, chat: Chat) -> RepositoryFuture<Chat> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let mut tx = pool.begin().await.map_err(map_sqlx_err)?;

            sqlx::query(&format!(
                "INSERT INTO chats ({CHAT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
            ))
            .bind(Uuid::from(chat.id))
            .bind(&chat.name)
            .bind(chat.description.as_deref())
            .bind(chat.is_default)
            .bind(chat.created_at)
            .bind(Uuid::from(chat.created_by))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

            for member in &chat.members {
                sqlx::query(
                    r#"
                    INSERT INTO chat_members (chat_id, user_id, joined_at, is_admin)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(Uuid::from(member.chat_id))
                .bind(Uuid::from(member.user_id))
                .bind(member.joined_at)
                .bind(member.is_admin)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
            }

            tx.commit().await.map_err(map_sqlx_err)?;
            Ok(chat)
        })
    }

    fn update(&self, chat: Chat) -> RepositoryFuture<Chat> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, ChatRecord>(&format!(
                r#"
                UPDATE chats SET name = $2, description = $3, is_default = $4
                WHERE id = $1
                RETURNING {CHAT_COLUMNS}
                "#
            ))
            .bind(Uuid::from(chat.id))
            .bind(&chat.name)
            .bind(chat.description.as_deref())
            .bind(chat.is_default)
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;

            attach_members(&pool, vec![record])
                .await?
                .pop()
                .ok_or(RepositoryError::NotFound)
        })
    }

    fn delete(&self, id: ChatId) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM chats WHERE id = $1")
                .bind(Uuid::from(id))
                .execute(&pool)
                .await
                .map_err(map_sqlx_err)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        })
    }

    fn exists(&self, id: ChatId) -> RepositoryFuture<bool> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM chats WHERE id = $1)")
                .bind(Uuid::from(id))
                .fetch_one(&pool)
                .await
                .map_err(map_sqlx_err)
        })
    }

    fn is_member(&self, chat_id: ChatId, user_id: UserId) -> RepositoryFuture<bool> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM chat_members WHERE chat_id = $1 AND user_id = $2)",
            )
            .bind(Uuid::from(chat_id))
            .bind(Uuid::from(user_id))
            .fetch_one(&pool)
            .await
            .map_err(map_sqlx_err)
        })
    }

    fn add_member(&self, member: ChatMember) -> RepositoryFuture<ChatMember> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, MemberRecord>(
                r#"
                INSERT INTO chat_members (chat_id, user_id, joined_at, is_admin)
                VALUES ($1, $2, $3, $4)
                RETURNING chat_id, user_id, joined_at, is_admin
                "#,
            )
            .bind(Uuid::from(member.chat_id))
            .bind(Uuid::from(member.user_id))
            .bind(member.joined_at)
            .bind(member.is_admin)
            .fetch_one(&pool)
            .await
            .map_err(map_sqlx_err)?;

            Ok(ChatMember::from(record))
        })
    }

    fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result =
                sqlx::query("DELETE FROM chat_members WHERE chat_id = $1 AND user_id = $2")
                    .bind(Uuid::from(chat_id))
                    .bind(Uuid::from(user_id))
                    .execute(&pool)
                    .await
                    .map_err(map_sqlx_err)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        })
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MessageRepository for PgMessageRepository {
    fn find_by_id(&self, id: MessageId) -> RepositoryFuture<Option<Message>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, MessageRecord>(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
            ))
            .bind(Uuid::from(id))
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            record.map(Message::try_from).transpose()
        })
    }

    fn find_detailed(&self, id: MessageId) -> RepositoryFuture<Option<MessageWithSender>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, DetailedMessageRecord>(&format!(
                "{DETAILED_MESSAGE_SELECT} WHERE m.id = $1"
            ))
            .bind(Uuid::from(id))
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            record.map(MessageWithSender::try_from).transpose()
        })
    }

    fn list_by_chat(
        &self,
        chat_id: ChatId,
        skip: u32,
        take: u32,
    ) -> RepositoryFuture<Vec<MessageWithSender>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            // 先按时间倒序取最新的一页，再在页内恢复为时间正序
            let records = sqlx::query_as::<_, DetailedMessageRecord>(&format!(
                r#"
                SELECT * FROM (
                    {DETAILED_MESSAGE_SELECT}
                    WHERE m.chat_id = $1
                    ORDER BY m.created_at DESC, m.id DESC
                    OFFSET $2 LIMIT $3
                ) page
                ORDER BY page.created_at, page.id
                "#
            ))
            .bind(Uuid::from(chat_id))
            .bind(i64::from(skip))
            .bind(i64::from(take))
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            records.into_iter().map(MessageWithSender::try_from).collect()
        })
    }

    fn list_by_sender(&self, sender_id: UserId) -> RepositoryFuture<Vec<Message>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let records = sqlx::query_as::<_, MessageRecord>(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE sender_id = $1 ORDER BY created_at, id"
            ))
            .bind(Uuid::from(sender_id))
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            records.into_iter().map(Message::try_from).collect()
        })
    }

    fn create(&self, message: Message) -> RepositoryFuture<Message> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, MessageRecord>(&format!(
                r#"
                INSERT INTO messages ({MESSAGE_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING {MESSAGE_COLUMNS}
                "#
            ))
            .bind(Uuid::from(message.id))
            .bind(Uuid::from(message.chat_id))
            .bind(Uuid::from(message.sender_id))
            .bind(message.content.as_str())
            .bind(message.created_at)
            .bind(message.edited_at)
            .bind(message.is_edited)
            .fetch_one(&pool)
            .await
            .map_err(map_sqlx_err)?;

            Message::try_from(record)
        })
    }

    fn update(&self, message: Message) -> RepositoryFuture<Message> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, MessageRecord>(&format!(
                r#"
                UPDATE messages SET content = $2, edited_at = $3, is_edited = $4
                WHERE id = $1
                RETURNING {MESSAGE_COLUMNS}
                "#
            ))
            .bind(Uuid::from(message.id))
            .bind(message.content.as_str())
            .bind(message.edited_at)
            .bind(message.is_edited)
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;

            Message::try_from(record)
        })
    }

    fn delete(&self, id: MessageId) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM messages WHERE id = $1")
                .bind(Uuid::from(id))
                .execute(&pool)
                .await
                .map_err(map_sqlx_err)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        })
    }

    fn exists(&self, id: MessageId) -> RepositoryFuture<bool> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM messages WHERE id = $1)")
                .bind(Uuid::from(id))
                .fetch_one(&pool)
                .await
                .map_err(map_sqlx_err)
        })
    }

    fn count_by_chat(&self, chat_id: ChatId) -> RepositoryFuture<u64> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let count =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE chat_id = $1")
                    .bind(Uuid::from(chat_id))
                    .fetch_one(&pool)
                    .await
                    .map_err(map_sqlx_err)?;

            u64::try_from(count).map_err(|err| invalid_data(err.to_string()))
        })
    }
}

/// 三个仓储共享同一个连接池
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub chat_repository: Arc<PgChatRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            chat_repository: Arc::new(PgChatRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}
