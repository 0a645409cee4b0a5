//! 用户实体定义

use serde::{Deserialize, Serialize};

use crate::value_objects::{PasswordHash, PersonName, Timestamp, UserEmail, UserId};

/// 用户实体
///
/// 邮箱全局唯一且统一小写；通过显式注册或首次携带身份声明发消息时创建。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: UserEmail,
    pub first_name: PersonName,
    pub last_name: PersonName,
    #[serde(skip_serializing)] // 密码哈希不暴露给客户端
    pub password: Option<PasswordHash>,
    pub created_at: Timestamp,
    pub last_login_at: Option<Timestamp>,
    pub is_active: bool,
    /// 推送通知用的设备令牌
    pub device_token: Option<String>,
}

impl User {
    pub fn register(
        id: UserId,
        email: UserEmail,
        first_name: PersonName,
        last_name: PersonName,
        password: Option<PasswordHash>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            email,
            first_name,
            last_name,
            password,
            created_at: now,
            last_login_at: None,
            is_active: true,
            device_token: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn record_login(&mut self, now: Timestamp) {
        self.last_login_at = Some(now);
    }

    pub fn update_device_token(&mut self, device_token: Option<String>) {
        self.device_token = device_token;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
