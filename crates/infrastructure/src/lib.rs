//! 基础设施层实现。
//!
//! 提供 PostgreSQL 与内存两套仓储、密码哈希和实时推送中心，
//! 实现应用/领域层定义的接口。

pub mod builder;
pub mod hub;
pub mod memory;
pub mod migrations;
pub mod password;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureError};
pub use hub::{ChatHub, ConnectionId};
pub use memory::{
    InMemoryChatRepository, InMemoryMessageRepository, InMemoryStorage, InMemoryUserRepository,
};
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use repository::{
    create_pg_pool, PgChatRepository, PgMessageRepository, PgStorage, PgUserRepository,
};
