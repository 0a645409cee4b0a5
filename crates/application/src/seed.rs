//! 启动数据初始化
//!
//! 没有任何用户时写入配置中的默认家庭成员；没有默认聊天时以第一个用户为创建者
//! 建立默认聊天，并把全部用户加为成员。重复执行是安全的。

use std::sync::Arc;

use config::{SeedConfig, SeedMember};
use domain::{
    Chat, ChatId, ChatRepository, PersonName, RepositoryError, User, UserEmail, UserId,
    UserRepository,
};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::ApplicationResult;
use crate::password::PasswordHasher;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub default_chat_created: bool,
}

pub struct DatabaseSeeder {
    user_repository: Arc<dyn UserRepository>,
    chat_repository: Arc<dyn ChatRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl DatabaseSeeder {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        chat_repository: Arc<dyn ChatRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            chat_repository,
            password_hasher,
            clock,
        }
    }

    pub async fn seed(&self, config: &SeedConfig) -> ApplicationResult<SeedReport> {
        let mut report = SeedReport::default();
        if !config.enabled {
            debug!("seeding disabled");
            return Ok(report);
        }

        if self.user_repository.list_all().await?.is_empty() {
            info!(count = config.members.len(), "seeding default users");
            for member in &config.members {
                if self.seed_member(member).await? {
                    report.users_created += 1;
                }
            }
        }

        if self.chat_repository.find_default().await?.is_none() {
            report.default_chat_created = self.seed_default_chat(config).await?;
        }

        info!(
            users_created = report.users_created,
            default_chat_created = report.default_chat_created,
            "database seeding completed"
        );
        Ok(report)
    }

    async fn seed_member(&self, member: &SeedMember) -> ApplicationResult<bool> {
        let password = self.password_hasher.hash(&member.password).await?;
        let user = User::register(
            UserId::generate(),
            UserEmail::parse(member.email.as_str())?,
            PersonName::parse("first_name", member.first_name.as_str())?,
            PersonName::parse("last_name", member.last_name.as_str())?,
            Some(password),
            self.clock.now(),
        );

        match self.user_repository.create(user).await {
            Ok(created) => {
                debug!(user_id = %created.id, email = %created.email, "seeded user");
                Ok(true)
            }
            Err(RepositoryError::Conflict) => {
                debug!(email = %member.email, "seed user already exists");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn seed_default_chat(&self, config: &SeedConfig) -> ApplicationResult<bool> {
        let users = self.user_repository.list_all().await?;
        let Some(creator) = users.first() else {
            warn!("no users available, default chat not created");
            return Ok(false);
        };

        let now = self.clock.now();
        let description = Some(config.default_chat_description.clone())
            .filter(|description| !description.is_empty());
        let mut chat = Chat::new(
            ChatId::generate(),
            config.default_chat_name.as_str(),
            description,
            creator.id,
            true,
            now,
        )?;
        for user in &users {
            chat.add_member(user.id, user.id == creator.id, now)?;
        }

        info!(members = users.len(), "creating default chat");
        match self.chat_repository.create(chat).await {
            Ok(_) => Ok(true),
            Err(RepositoryError::Conflict) => {
                debug!("default chat created concurrently");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}
