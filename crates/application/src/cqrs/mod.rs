//! CQRS（命令查询职责分离）核心接口
//!
//! 每个用例是一个命令或查询对象，由对应的处理器执行。
//! HTTP 与实时通道都是薄适配层，把请求翻译成同一个命令对象。

pub mod application;
pub mod commands;
pub mod dtos;
pub mod handlers;
pub mod queries;

pub use application::{ApplicationDependencies, ChatApplication};
pub use commands::*;
pub use dtos::*;
pub use handlers::*;
pub use queries::*;

use async_trait::async_trait;

use crate::error::ApplicationResult;

/// 命令特征 - 所有命令必须实现此特征
pub trait Command: Send + Sync + 'static {
    /// 命令执行的返回类型
    type Result;
}

/// 查询特征 - 所有查询必须实现此特征
pub trait Query: Send + Sync + 'static {
    /// 查询的返回类型
    type Result;
}

/// 命令处理器接口
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: C) -> ApplicationResult<C::Result>;
}

/// 查询处理器接口
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: Q) -> ApplicationResult<Q::Result>;
}
