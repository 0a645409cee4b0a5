//! 家庭聊天核心领域模型
//!
//! 包含用户、聊天、成员和消息实体，值对象，以及仓储抽象。

pub mod entities;
pub mod errors;
pub mod repository;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use repository::*;
pub use value_objects::*;
