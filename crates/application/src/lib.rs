//! 应用层实现。
//!
//! 围绕领域模型的命令与查询处理器，处理输入校验、身份解析，
//! 以及对外部适配器（密码哈希、实时推送）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod cqrs;
pub mod error;
pub mod identity;
pub mod password;
pub mod seed;

#[cfg(test)]
mod test_support;

pub use broadcaster::{BroadcastError, ChatEvent, MessageBroadcaster};
pub use clock::{Clock, SystemClock};
pub use cqrs::*;
pub use error::{ApplicationError, ApplicationResult};
pub use identity::IdentityClaims;
pub use password::{PasswordHasher, PasswordHasherError};
pub use seed::{DatabaseSeeder, SeedReport};
