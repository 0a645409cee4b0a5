//! 聊天命令处理器
//!
//! 创建聊天以及成员的增删。

use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    Chat, ChatId, ChatMember, ChatRepository, DomainError, RepositoryError, UserId, UserRepository,
};
use tracing::{info, warn};

use crate::broadcaster::MessageBroadcaster;
use crate::clock::Clock;
use crate::cqrs::{
    dtos::{ChatDto, ChatMemberDto},
    AddChatMemberCommand, CommandHandler, CreateChatCommand, RemoveChatMemberCommand,
};
use crate::error::{ApplicationError, ApplicationResult};

pub struct ChatCommandHandler {
    user_repository: Arc<dyn UserRepository>,
    chat_repository: Arc<dyn ChatRepository>,
    broadcaster: Arc<dyn MessageBroadcaster>,
    clock: Arc<dyn Clock>,
}

impl ChatCommandHandler {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        chat_repository: Arc<dyn ChatRepository>,
        broadcaster: Arc<dyn MessageBroadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            chat_repository,
            broadcaster,
            clock,
        }
    }

    async fn ensure_chat_exists(&self, chat_id: ChatId) -> ApplicationResult<()> {
        if self.chat_repository.exists(chat_id).await? {
            Ok(())
        } else {
            Err(chat_not_found(chat_id))
        }
    }
}

pub(crate) fn chat_not_found(chat_id: ChatId) -> ApplicationError {
    ApplicationError::not_found(format!("Chat with ID {chat_id} not found"))
}

pub(crate) fn user_not_found(user_id: UserId) -> ApplicationError {
    ApplicationError::not_found(format!("User with ID {user_id} not found"))
}

#[async_trait]
impl CommandHandler<CreateChatCommand> for ChatCommandHandler {
    async fn handle(&self, command: CreateChatCommand) -> ApplicationResult<ChatDto> {
        let creator_id = UserId::from(command.created_by_id);
        let creator = self
            .user_repository
            .find_by_id(creator_id)
            .await?
            .ok_or_else(|| user_not_found(creator_id))?;

        let now = self.clock.now();
        let mut chat = Chat::new(
            ChatId::generate(),
            command.name,
            command.description,
            creator.id,
            command.is_default,
            now,
        )?;
        chat.add_member(creator.id, true, now)?;

        let created = self
            .chat_repository
            .create(chat)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => DomainError::DefaultChatAlreadyExists.into(),
                other => ApplicationError::from(other),
            })?;

        info!(chat_id = %created.id, user_id = %creator.id, "created chat");
        Ok(ChatDto::from(&created))
    }
}

#[async_trait]
impl CommandHandler<AddChatMemberCommand> for ChatCommandHandler {
    async fn handle(&self, command: AddChatMemberCommand) -> ApplicationResult<ChatMemberDto> {
        let chat_id = ChatId::from(command.chat_id);
        let user_id = UserId::from(command.user_id);

        self.ensure_chat_exists(chat_id).await?;
        if !self.user_repository.exists(user_id).await? {
            return Err(user_not_found(user_id));
        }

        let member = ChatMember::new(chat_id, user_id, command.is_admin, self.clock.now());
        let added = self
            .chat_repository
            .add_member(member)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => DomainError::UserAlreadyMember.into(),
                other => ApplicationError::from(other),
            })?;

        info!(chat_id = %chat_id, user_id = %user_id, is_admin = added.is_admin, "added chat member");
        Ok(ChatMemberDto::from(&added))
    }
}

#[async_trait]
impl CommandHandler<RemoveChatMemberCommand> for ChatCommandHandler {
    async fn handle(&self, command: RemoveChatMemberCommand) -> ApplicationResult<()> {
        let chat_id = ChatId::from(command.chat_id);
        let user_id = UserId::from(command.user_id);

        self.ensure_chat_exists(chat_id).await?;
        self.chat_repository
            .remove_member(chat_id, user_id)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => DomainError::UserNotMember.into(),
                other => ApplicationError::from(other),
            })?;

        // 成员关系已删除，在线连接也要离开分组
        match self.broadcaster.evict_member(chat_id, user_id).await {
            Ok(evicted) => {
                info!(chat_id = %chat_id, user_id = %user_id, evicted, "removed chat member")
            }
            Err(err) => warn!(
                chat_id = %chat_id,
                user_id = %user_id,
                error = %err,
                "removed chat member but failed to evict live connections"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::BroadcastError;
    use crate::test_support::{ready, sample_user, FixedClock, RecordingBroadcaster};
    use domain::{MockChatRepository, MockUserRepository};
    use uuid::Uuid;

    fn handler(users: MockUserRepository, chats: MockChatRepository) -> ChatCommandHandler {
        handler_with(users, chats, Arc::new(RecordingBroadcaster::default()))
    }

    fn handler_with(
        users: MockUserRepository,
        chats: MockChatRepository,
        broadcaster: Arc<RecordingBroadcaster>,
    ) -> ChatCommandHandler {
        ChatCommandHandler::new(
            Arc::new(users),
            Arc::new(chats),
            broadcaster,
            Arc::new(FixedClock::default()),
        )
    }

    fn create_command(creator: UserId) -> CreateChatCommand {
        CreateChatCommand {
            name: "Weekend plans".into(),
            description: Some("Who brings what".into()),
            is_default: false,
            created_by_id: creator.into(),
        }
    }

    #[tokio::test]
    async fn create_chat_adds_creator_as_only_admin_member() {
        let creator = sample_user("mom@family.com");
        let creator_id = creator.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| ready(Ok(Some(creator.clone()))));
        let mut chats = MockChatRepository::new();
        chats
            .expect_create()
            .withf(move |chat| {
                chat.members.len() == 1
                    && chat.members[0].user_id == creator_id
                    && chat.members[0].is_admin
            })
            .times(1)
            .returning(|chat| ready(Ok(chat)));

        let dto = handler(users, chats)
            .handle(create_command(creator_id))
            .await
            .unwrap();
        assert_eq!(dto.name, "Weekend plans");
        assert_eq!(dto.created_by_id, Uuid::from(creator_id));
        assert!(!dto.is_default);
    }

    #[tokio::test]
    async fn create_chat_with_unknown_creator_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| ready(Ok(None)));
        let mut chats = MockChatRepository::new();
        chats.expect_create().times(0);

        let err = handler(users, chats)
            .handle(create_command(UserId::generate()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_default_chat_is_a_conflict() {
        let creator = sample_user("dad@family.com");
        let creator_id = creator.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| ready(Ok(Some(creator.clone()))));
        let mut chats = MockChatRepository::new();
        chats
            .expect_create()
            .returning(|_| ready(Err(RepositoryError::Conflict)));

        let mut command = create_command(creator_id);
        command.is_default = true;
        let err = handler(users, chats).handle(command).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Conflict(_)));
    }

    #[tokio::test]
    async fn adding_existing_member_is_a_conflict() {
        let mut users = MockUserRepository::new();
        users.expect_exists().returning(|_| ready(Ok(true)));
        let mut chats = MockChatRepository::new();
        chats.expect_exists().returning(|_| ready(Ok(true)));
        chats
            .expect_add_member()
            .returning(|_| ready(Err(RepositoryError::Conflict)));

        let err = handler(users, chats)
            .handle(AddChatMemberCommand {
                chat_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                is_admin: false,
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, ApplicationError::Conflict(message) if message == "User is already a member of this chat")
        );
    }

    #[tokio::test]
    async fn adding_unknown_user_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_exists().returning(|_| ready(Ok(false)));
        let mut chats = MockChatRepository::new();
        chats.expect_exists().returning(|_| ready(Ok(true)));
        chats.expect_add_member().times(0);

        let err = handler(users, chats)
            .handle(AddChatMemberCommand {
                chat_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                is_admin: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn removing_non_member_is_not_found() {
        let users = MockUserRepository::new();
        let mut chats = MockChatRepository::new();
        chats.expect_exists().returning(|_| ready(Ok(true)));
        chats
            .expect_remove_member()
            .returning(|_, _| ready(Err(RepositoryError::NotFound)));

        let err = handler(users, chats)
            .handle(RemoveChatMemberCommand {
                chat_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, ApplicationError::NotFound(message) if message == "User is not a member of this chat")
        );
    }

    #[tokio::test]
    async fn removing_member_evicts_live_connections() {
        let mut chats = MockChatRepository::new();
        chats.expect_exists().returning(|_| ready(Ok(true)));
        chats
            .expect_remove_member()
            .times(1)
            .returning(|_, _| ready(Ok(())));
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let chat_id = ChatId::generate();
        let user_id = UserId::generate();

        handler_with(MockUserRepository::new(), chats, broadcaster.clone())
            .handle(RemoveChatMemberCommand {
                chat_id: chat_id.into(),
                user_id: user_id.into(),
            })
            .await
            .unwrap();

        assert_eq!(broadcaster.evictions(), vec![(chat_id, user_id)]);
    }

    #[tokio::test]
    async fn failed_eviction_does_not_undo_removal() {
        let mut chats = MockChatRepository::new();
        chats.expect_exists().returning(|_| ready(Ok(true)));
        chats
            .expect_remove_member()
            .times(1)
            .returning(|_, _| ready(Ok(())));
        let broadcaster = Arc::new(RecordingBroadcaster::failing(BroadcastError::failed(
            "hub unavailable",
        )));

        let result = handler_with(MockUserRepository::new(), chats, broadcaster)
            .handle(RemoveChatMemberCommand {
                chat_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
            })
            .await;
        assert!(result.is_ok());
    }
}
