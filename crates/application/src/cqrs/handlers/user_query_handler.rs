//! 用户查询处理器

use std::sync::Arc;

use async_trait::async_trait;
use domain::{UserId, UserRepository};

use super::chat_command_handler::user_not_found;
use crate::cqrs::{dtos::UserDetailsDto, GetUserDetailsQuery, QueryHandler};
use crate::error::ApplicationResult;

pub struct UserQueryHandler {
    user_repository: Arc<dyn UserRepository>,
}

impl UserQueryHandler {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }
}

#[async_trait]
impl QueryHandler<GetUserDetailsQuery> for UserQueryHandler {
    async fn handle(&self, query: GetUserDetailsQuery) -> ApplicationResult<UserDetailsDto> {
        let user_id = UserId::from(query.user_id);
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| user_not_found(user_id))?;
        Ok(UserDetailsDto::from(&user))
    }
}
