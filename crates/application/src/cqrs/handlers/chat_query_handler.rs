//! 聊天查询处理器

use std::sync::Arc;

use async_trait::async_trait;
use domain::{ChatId, ChatRepository, UserId};

use super::chat_command_handler::chat_not_found;
use crate::cqrs::{
    dtos::ChatSummaryDto, AuthorizeChatSubscriptionQuery, GetChatsQuery, QueryHandler,
};
use crate::error::{ApplicationError, ApplicationResult};

pub struct ChatQueryHandler {
    chat_repository: Arc<dyn ChatRepository>,
}

impl ChatQueryHandler {
    pub fn new(chat_repository: Arc<dyn ChatRepository>) -> Self {
        Self { chat_repository }
    }
}

#[async_trait]
impl QueryHandler<GetChatsQuery> for ChatQueryHandler {
    async fn handle(&self, _query: GetChatsQuery) -> ApplicationResult<Vec<ChatSummaryDto>> {
        let summaries = self.chat_repository.list_summaries().await?;
        Ok(summaries.into_iter().map(ChatSummaryDto::from).collect())
    }
}

/// 只有持久化的聊天成员才能订阅该聊天的推送。
#[async_trait]
impl QueryHandler<AuthorizeChatSubscriptionQuery> for ChatQueryHandler {
    async fn handle(&self, query: AuthorizeChatSubscriptionQuery) -> ApplicationResult<()> {
        let chat_id = ChatId::from(query.chat_id);
        let user_id = UserId::from(query.user_id);

        if !self.chat_repository.exists(chat_id).await? {
            return Err(chat_not_found(chat_id));
        }
        if !self.chat_repository.is_member(chat_id, user_id).await? {
            return Err(ApplicationError::forbidden(
                "User is not a member of this chat",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ready;
    use chrono::Utc;
    use domain::{ChatSummary, MockChatRepository};
    use uuid::Uuid;

    #[tokio::test]
    async fn chats_carry_creator_full_name() {
        let mut repo = MockChatRepository::new();
        repo.expect_list_summaries().returning(|| {
            ready(Ok(vec![ChatSummary {
                id: ChatId::generate(),
                name: "Family Chat".into(),
                created_by: UserId::generate(),
                created_by_name: "Mom Family".into(),
                created_at: Utc::now(),
            }]))
        });

        let chats = ChatQueryHandler::new(Arc::new(repo))
            .handle(GetChatsQuery)
            .await
            .unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].created_by, "Mom Family");
    }

    #[tokio::test]
    async fn non_member_cannot_subscribe() {
        let mut repo = MockChatRepository::new();
        repo.expect_exists().returning(|_| ready(Ok(true)));
        repo.expect_is_member().returning(|_, _| ready(Ok(false)));

        let err = ChatQueryHandler::new(Arc::new(repo))
            .handle(AuthorizeChatSubscriptionQuery {
                chat_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden(_)));
    }

    #[tokio::test]
    async fn subscribing_to_unknown_chat_is_not_found() {
        let mut repo = MockChatRepository::new();
        repo.expect_exists().returning(|_| ready(Ok(false)));
        repo.expect_is_member().times(0);

        let err = ChatQueryHandler::new(Arc::new(repo))
            .handle(AuthorizeChatSubscriptionQuery {
                chat_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }
}
