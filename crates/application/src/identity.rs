//! 调用方身份声明
//!
//! 令牌的签发与校验在边界层完成，这里只消费解析后的声明。

use domain::{PersonName, UserEmail};
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

pub const FALLBACK_FIRST_NAME: &str = "Unknown";
pub const FALLBACK_LAST_NAME: &str = "User";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl IdentityClaims {
    pub fn new(
        email: Option<String>,
        given_name: Option<String>,
        family_name: Option<String>,
    ) -> Self {
        Self {
            email,
            given_name,
            family_name,
        }
    }

    /// 缺少邮箱或邮箱无法解析都视为未认证。
    pub fn email(&self) -> Result<UserEmail, ApplicationError> {
        self.email
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .and_then(|value| UserEmail::parse(value).ok())
            .ok_or_else(|| ApplicationError::authentication("User email not found in claims"))
    }

    pub fn first_name(&self) -> PersonName {
        name_or_fallback("first_name", self.given_name.as_deref(), FALLBACK_FIRST_NAME)
    }

    pub fn last_name(&self) -> PersonName {
        name_or_fallback("last_name", self.family_name.as_deref(), FALLBACK_LAST_NAME)
    }
}

fn name_or_fallback(field: &'static str, claim: Option<&str>, fallback: &'static str) -> PersonName {
    claim
        .and_then(|value| PersonName::parse(field, value).ok())
        .unwrap_or_else(|| PersonName::placeholder(fallback))
}
