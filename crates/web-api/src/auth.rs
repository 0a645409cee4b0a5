//! JWT 认证
//!
//! 令牌由外部身份提供方签发（HS256，校验 issuer 与 audience），
//! 这里只负责校验并把声明转换成应用层的 `IdentityClaims`。

use application::IdentityClaims;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use config::JwtConfig;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// WebSocket 握手无法携带请求头时使用的查询参数
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// 部分身份提供方把邮箱放在 `emails` 中，可能是单个值也可能是数组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// JWT Claims 结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// `email` 优先，否则取 `emails` 的第一个
    pub fn identity(&self) -> IdentityClaims {
        let email = self
            .email
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| match &self.emails {
                Some(OneOrMany::One(value)) => Some(value.clone()),
                Some(OneOrMany::Many(values)) => values.first().cloned(),
                None => None,
            });

        IdentityClaims::new(email, self.given_name.clone(), self.family_name.clone())
    }
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// 按当前配置签发令牌，供本地开发和测试使用
    pub fn issue_token(&self, identity: &IdentityClaims) -> Result<String, ApiError> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            sub: identity
                .email
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            email: identity.email.clone(),
            emails: None,
            given_name: identity.given_name.clone(),
            family_name: identity.family_name.clone(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| ApiError::internal_server_error(format!("Token generation failed: {}", err)))
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| ApiError::unauthorized(format!("Invalid token: {}", err)))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))
}

/// 校验 Bearer 令牌并把身份声明放进请求扩展
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let claims = state.jwt_service.verify_token(token)?;
    request.extensions_mut().insert(claims.identity());

    Ok(next.run(request).await)
}
