use std::sync::Arc;
use std::time::Duration;

use application::{ApplicationDependencies, Clock};
use config::{AppConfig, StorageBackend};
use domain::{ChatRepository, MessageRepository, UserRepository};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::{
    hub::ChatHub,
    memory::InMemoryStorage,
    migrations::MIGRATOR,
    password::BcryptPasswordHasher,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 已装配的适配器集合，存储后端由配置决定
#[derive(Clone)]
pub struct Infrastructure {
    pub user_repository: Arc<dyn UserRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub password_hasher: Arc<BcryptPasswordHasher>,
    pub hub: Arc<ChatHub>,
    /// 仅 PostgreSQL 后端存在
    pub pool: Option<PgPool>,
}

impl Infrastructure {
    pub async fn connect(config: &AppConfig) -> Result<Self, InfrastructureError> {
        match config.storage {
            StorageBackend::Postgres => {
                let pool = create_pg_pool(
                    &config.database.url,
                    config.database.max_connections,
                    Duration::from_secs(config.database.acquire_timeout_seconds),
                )
                .await?;
                MIGRATOR.run(&pool).await?;
                info!("database migrations applied");

                Ok(Self::with_postgres(
                    PgStorage::new(pool),
                    config.security.bcrypt_cost,
                ))
            }
            StorageBackend::Memory => {
                info!("using in-memory storage");
                Ok(Self::in_memory(config.security.bcrypt_cost))
            }
        }
    }

    pub fn with_postgres(storage: PgStorage, bcrypt_cost: u32) -> Self {
        Self {
            user_repository: storage.user_repository,
            chat_repository: storage.chat_repository,
            message_repository: storage.message_repository,
            password_hasher: Arc::new(BcryptPasswordHasher::new(bcrypt_cost)),
            hub: Arc::new(ChatHub::new()),
            pool: Some(storage.pool),
        }
    }

    pub fn in_memory(bcrypt_cost: u32) -> Self {
        let storage = InMemoryStorage::new();
        Self {
            user_repository: storage.user_repository,
            chat_repository: storage.chat_repository,
            message_repository: storage.message_repository,
            password_hasher: Arc::new(BcryptPasswordHasher::new(bcrypt_cost)),
            hub: Arc::new(ChatHub::new()),
            pool: None,
        }
    }

    /// 推送中心同时作为应用层的广播器
    pub fn application_dependencies(&self, clock: Arc<dyn Clock>) -> ApplicationDependencies {
        ApplicationDependencies {
            user_repository: self.user_repository.clone(),
            chat_repository: self.chat_repository.clone(),
            message_repository: self.message_repository.clone(),
            password_hasher: self.password_hasher.clone(),
            clock,
            broadcaster: self.hub.clone(),
        }
    }
}
