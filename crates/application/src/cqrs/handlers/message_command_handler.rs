//! 消息命令处理器
//!
//! `SendMessageCommand` 是持久化并广播消息的唯一实现，
//! HTTP 端点和实时通道都只是把请求翻译成这个命令。

use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    ChatId, ChatRepository, DomainError, Message, MessageContent, MessageId, MessageRepository,
    MessageWithSender, RepositoryError, User, UserId, UserRepository,
};
use tracing::{debug, info, warn};

use super::chat_command_handler::chat_not_found;
use crate::broadcaster::{ChatEvent, MessageBroadcaster};
use crate::clock::Clock;
use crate::cqrs::{dtos::MessageDto, CommandHandler, EditMessageCommand, SendMessageCommand};
use crate::error::{ApplicationError, ApplicationResult};

const EMPTY_CONTENT: &str = "Message content cannot be empty";

pub struct MessageCommandHandler {
    user_repository: Arc<dyn UserRepository>,
    chat_repository: Arc<dyn ChatRepository>,
    message_repository: Arc<dyn MessageRepository>,
    broadcaster: Arc<dyn MessageBroadcaster>,
    clock: Arc<dyn Clock>,
}

impl MessageCommandHandler {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        chat_repository: Arc<dyn ChatRepository>,
        message_repository: Arc<dyn MessageRepository>,
        broadcaster: Arc<dyn MessageBroadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            chat_repository,
            message_repository,
            broadcaster,
            clock,
        }
    }

    async fn load_detailed(&self, message_id: MessageId) -> ApplicationResult<MessageWithSender> {
        self.message_repository
            .find_detailed(message_id)
            .await?
            .ok_or_else(|| DomainError::MessageNotFound.into())
    }

    /// 推送失败只记录日志，消息已经持久化，请求照常成功。
    async fn publish(&self, chat_id: ChatId, event: ChatEvent) {
        match self.broadcaster.publish(chat_id, event).await {
            Ok(delivered) => debug!(chat_id = %chat_id, delivered, "published chat event"),
            Err(err) => warn!(chat_id = %chat_id, error = %err, "message persisted but broadcast failed"),
        }
    }
}

fn parse_content(content: String) -> ApplicationResult<MessageContent> {
    MessageContent::new(content).map_err(|_| ApplicationError::validation(EMPTY_CONTENT))
}

#[async_trait]
impl CommandHandler<SendMessageCommand> for MessageCommandHandler {
    async fn handle(&self, command: SendMessageCommand) -> ApplicationResult<MessageDto> {
        let content = parse_content(command.content)?;

        let chat_id = ChatId::from(command.chat_id);
        if !self.chat_repository.exists(chat_id).await? {
            return Err(chat_not_found(chat_id));
        }

        let email = command.sender.email()?;
        let now = self.clock.now();
        let candidate = User::register(
            UserId::generate(),
            email,
            command.sender.first_name(),
            command.sender.last_name(),
            None,
            now,
        );
        let sender = self.user_repository.upsert_by_email(candidate).await?;

        let message = Message::new(MessageId::generate(), chat_id, sender.id, content, now);
        let stored = self
            .message_repository
            .create(message)
            .await
            .map_err(|err| match err {
                // 聊天在校验之后被删除
                RepositoryError::NotFound => chat_not_found(chat_id),
                other => other.into(),
            })?;

        let detailed = self.load_detailed(stored.id).await?;
        let dto = MessageDto::from(&detailed);
        info!(
            chat_id = %chat_id,
            user_id = %sender.id,
            message_id = %stored.id,
            "message stored"
        );

        self.publish(
            chat_id,
            ChatEvent::ReceiveMessage {
                message: dto.clone(),
            },
        )
        .await;
        Ok(dto)
    }
}

#[async_trait]
impl CommandHandler<EditMessageCommand> for MessageCommandHandler {
    async fn handle(&self, command: EditMessageCommand) -> ApplicationResult<MessageDto> {
        let content = parse_content(command.content)?;
        let message_id = MessageId::from(command.message_id);
        let mut message = self
            .message_repository
            .find_by_id(message_id)
            .await?
            .ok_or(DomainError::MessageNotFound)?;

        let email = command.editor.email()?;
        let editor = self.user_repository.find_by_email(email).await?;
        if editor.map(|user| user.id) != Some(message.sender_id) {
            return Err(ApplicationError::forbidden(
                "Only the sender can edit this message",
            ));
        }

        message.edit(content, self.clock.now());
        let updated = self.message_repository.update(message).await?;
        let dto = MessageDto::from(&self.load_detailed(updated.id).await?);
        info!(chat_id = %updated.chat_id, message_id = %updated.id, "message edited");

        self.publish(
            updated.chat_id,
            ChatEvent::MessageEdited {
                message: dto.clone(),
            },
        )
        .await;
        Ok(dto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::BroadcastError;
    use crate::identity::IdentityClaims;
    use crate::test_support::{ready, sample_user, with_sender, FixedClock, RecordingBroadcaster};
    use domain::{MockChatRepository, MockMessageRepository, MockUserRepository};
    use uuid::Uuid;

    struct Mocks {
        users: MockUserRepository,
        chats: MockChatRepository,
        messages: MockMessageRepository,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                users: MockUserRepository::new(),
                chats: MockChatRepository::new(),
                messages: MockMessageRepository::new(),
            }
        }

        fn into_handler(self, broadcaster: Arc<dyn MessageBroadcaster>) -> MessageCommandHandler {
            MessageCommandHandler::new(
                Arc::new(self.users),
                Arc::new(self.chats),
                Arc::new(self.messages),
                broadcaster,
                Arc::new(FixedClock::default()),
            )
        }
    }

    fn claims(email: &str) -> IdentityClaims {
        IdentityClaims::new(Some(email.into()), Some("Sister".into()), Some("Family".into()))
    }

    /// 消息仓储：create 原样返回并记住消息，find_detailed 带上发送者资料
    fn stored_messages(mocks: &mut Mocks, sender: User) {
        let store = Arc::new(std::sync::Mutex::new(None::<Message>));
        let write = store.clone();
        mocks.messages.expect_create().times(1).returning(move |message| {
            *write.lock().unwrap() = Some(message.clone());
            ready(Ok(message))
        });
        mocks.messages.expect_find_detailed().returning(move |_| {
            let message = store.lock().unwrap().clone();
            ready(Ok(message.map(|message| with_sender(message, &sender))))
        });
    }

    #[tokio::test]
    async fn whitespace_content_is_rejected_before_any_lookup() {
        let mut mocks = Mocks::new();
        mocks.chats.expect_exists().times(0);
        mocks.messages.expect_create().times(0);
        let broadcaster = Arc::new(RecordingBroadcaster::default());

        let err = mocks
            .into_handler(broadcaster.clone())
            .handle(SendMessageCommand {
                chat_id: Uuid::new_v4(),
                content: "  \n ".into(),
                sender: claims("sister@family.com"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::Validation(message) if message == EMPTY_CONTENT));
        assert!(broadcaster.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_chat_is_not_found_and_nothing_is_stored() {
        let mut mocks = Mocks::new();
        mocks.chats.expect_exists().returning(|_| ready(Ok(false)));
        mocks.users.expect_upsert_by_email().times(0);
        mocks.messages.expect_create().times(0);
        let broadcaster = Arc::new(RecordingBroadcaster::default());

        let err = mocks
            .into_handler(broadcaster.clone())
            .handle(SendMessageCommand {
                chat_id: Uuid::new_v4(),
                content: "hello".into(),
                sender: claims("sister@family.com"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::NotFound(_)));
        assert!(broadcaster.events().is_empty());
    }

    #[tokio::test]
    async fn missing_email_claim_is_unauthenticated() {
        let mut mocks = Mocks::new();
        mocks.chats.expect_exists().returning(|_| ready(Ok(true)));
        mocks.users.expect_upsert_by_email().times(0);

        let err = mocks
            .into_handler(Arc::new(RecordingBroadcaster::default()))
            .handle(SendMessageCommand {
                chat_id: Uuid::new_v4(),
                content: "hello".into(),
                sender: IdentityClaims::default(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::Authentication(_)));
    }

    #[tokio::test]
    async fn send_persists_and_broadcasts_denormalized_message() {
        let sender = sample_user("sister@family.com");
        let chat_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks.chats.expect_exists().returning(|_| ready(Ok(true)));
        let resolved = sender.clone();
        mocks
            .users
            .expect_upsert_by_email()
            .withf(|candidate| candidate.email.as_str() == "sister@family.com")
            .times(1)
            .returning(move |_| ready(Ok(resolved.clone())));
        stored_messages(&mut mocks, sender.clone());
        let broadcaster = Arc::new(RecordingBroadcaster::default());

        let dto = mocks
            .into_handler(broadcaster.clone())
            .handle(SendMessageCommand {
                chat_id,
                content: "Dinner at 7".into(),
                sender: claims("Sister@Family.com"),
            })
            .await
            .unwrap();

        assert_eq!(dto.chat_id, chat_id);
        assert_eq!(dto.content, "Dinner at 7");
        assert!(!dto.is_edited);
        assert!(dto.edited_at.is_none());
        assert_eq!(dto.sender.id, Uuid::from(sender.id));

        let events = broadcaster.events();
        assert_eq!(events.len(), 1);
        let (published_to, event) = &events[0];
        assert_eq!(Uuid::from(*published_to), chat_id);
        assert_eq!(event, &ChatEvent::ReceiveMessage { message: dto });
    }

    #[tokio::test]
    async fn broadcast_failure_does_not_fail_the_send() {
        let sender = sample_user("brother@family.com");
        let mut mocks = Mocks::new();
        mocks.chats.expect_exists().returning(|_| ready(Ok(true)));
        let resolved = sender.clone();
        mocks
            .users
            .expect_upsert_by_email()
            .returning(move |_| ready(Ok(resolved.clone())));
        stored_messages(&mut mocks, sender);
        let broadcaster = Arc::new(RecordingBroadcaster::failing(BroadcastError::failed("hub down")));

        let result = mocks
            .into_handler(broadcaster)
            .handle(SendMessageCommand {
                chat_id: Uuid::new_v4(),
                content: "still saved".into(),
                sender: claims("brother@family.com"),
            })
            .await;

        assert!(result.is_ok());
    }

    fn existing_message(sender: &User) -> Message {
        Message::new(
            MessageId::generate(),
            ChatId::generate(),
            sender.id,
            MessageContent::new("first draft").unwrap(),
            FixedClock::default().0,
        )
    }

    #[tokio::test]
    async fn only_sender_can_edit() {
        let sender = sample_user("mom@family.com");
        let other = sample_user("dad@family.com");
        let message = existing_message(&sender);
        let mut mocks = Mocks::new();
        mocks
            .messages
            .expect_find_by_id()
            .returning(move |_| ready(Ok(Some(message.clone()))));
        mocks
            .users
            .expect_find_by_email()
            .returning(move |_| ready(Ok(Some(other.clone()))));
        mocks.messages.expect_update().times(0);

        let err = mocks
            .into_handler(Arc::new(RecordingBroadcaster::default()))
            .handle(EditMessageCommand {
                message_id: Uuid::new_v4(),
                content: "rewritten".into(),
                editor: claims("dad@family.com"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden(_)));
    }

    #[tokio::test]
    async fn edit_marks_message_and_broadcasts_edit_event() {
        let sender = sample_user("mom@family.com");
        let message = existing_message(&sender);
        let created_at = message.created_at;
        let mut mocks = Mocks::new();
        mocks
            .messages
            .expect_find_by_id()
            .returning(move |_| ready(Ok(Some(message.clone()))));
        let editor = sender.clone();
        mocks
            .users
            .expect_find_by_email()
            .returning(move |_| ready(Ok(Some(editor.clone()))));
        let updated = Arc::new(std::sync::Mutex::new(None::<Message>));
        let write = updated.clone();
        mocks.messages.expect_update().times(1).returning(move |message| {
            *write.lock().unwrap() = Some(message.clone());
            ready(Ok(message))
        });
        mocks.messages.expect_find_detailed().returning(move |_| {
            let message = updated.lock().unwrap().clone();
            ready(Ok(message.map(|message| with_sender(message, &sender))))
        });
        let broadcaster = Arc::new(RecordingBroadcaster::default());

        let dto = mocks
            .into_handler(broadcaster.clone())
            .handle(EditMessageCommand {
                message_id: Uuid::new_v4(),
                content: "final".into(),
                editor: claims("mom@family.com"),
            })
            .await
            .unwrap();

        assert!(dto.is_edited);
        assert_eq!(dto.content, "final");
        assert!(dto.edited_at.unwrap() > created_at);
        assert!(matches!(
            broadcaster.events().as_slice(),
            [(_, ChatEvent::MessageEdited { .. })]
        ));
    }
}
