//! 用户命令处理器
//!
//! 处理显式注册和按身份声明的隐式 upsert。

use std::sync::Arc;

use async_trait::async_trait;
use domain::{PersonName, RepositoryError, User, UserEmail, UserId, UserRepository};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::cqrs::{dtos::UserDto, CommandHandler, CreateUserCommand, ResolveUserCommand};
use crate::error::{ApplicationError, ApplicationResult};
use crate::password::PasswordHasher;

pub struct UserCommandHandler {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl UserCommandHandler {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            clock,
        }
    }
}

fn duplicate_email(email: &UserEmail) -> ApplicationError {
    ApplicationError::conflict(format!("User with email {email} already exists."))
}

#[async_trait]
impl CommandHandler<CreateUserCommand> for UserCommandHandler {
    async fn handle(&self, command: CreateUserCommand) -> ApplicationResult<UserDto> {
        let email = UserEmail::parse(command.email)?;
        let first_name = PersonName::parse("first_name", command.first_name)?;
        let last_name = PersonName::parse("last_name", command.last_name)?;
        if command.password.is_empty() {
            return Err(ApplicationError::validation("Password cannot be empty"));
        }

        if self
            .user_repository
            .exists_by_email(email.clone())
            .await?
        {
            return Err(duplicate_email(&email));
        }

        let password = self.password_hasher.hash(&command.password).await?;
        let user = User::register(
            UserId::generate(),
            email.clone(),
            first_name,
            last_name,
            Some(password),
            self.clock.now(),
        );

        // 并发注册同一邮箱时由唯一约束兜底
        let created = self
            .user_repository
            .create(user)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => duplicate_email(&email),
                other => other.into(),
            })?;

        info!(user_id = %created.id, email = %created.email, "created user");
        Ok(UserDto::from(&created))
    }
}

#[async_trait]
impl CommandHandler<ResolveUserCommand> for UserCommandHandler {
    async fn handle(&self, command: ResolveUserCommand) -> ApplicationResult<User> {
        let email = command.claims.email()?;
        let now = self.clock.now();
        let candidate = User::register(
            UserId::generate(),
            email,
            command.claims.first_name(),
            command.claims.last_name(),
            None,
            now,
        );
        let candidate_id = candidate.id;

        let mut user = self.user_repository.upsert_by_email(candidate).await?;
        if user.id == candidate_id {
            info!(user_id = %user.id, email = %user.email, "created user from identity claims");
        } else {
            debug!(user_id = %user.id, "resolved existing user");
        }

        if command.record_login {
            user.record_login(now);
            user = self.user_repository.update(user).await?;
        }
        Ok(user)
    }
}
