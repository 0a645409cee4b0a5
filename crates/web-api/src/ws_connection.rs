//! 实时推送的 WebSocket 适配层
//!
//! 每个连接在推送中心注册一个事件接收端，客户端通过 JSON 文本帧
//! 加入/离开聊天分组，或者直接发送消息（与 HTTP 接口共用同一个发送命令）。

use application::{
    AuthorizeChatSubscriptionQuery, ChatEvent, CommandHandler, IdentityClaims, QueryHandler,
    ResolveUserCommand, SendMessageCommand,
};
use axum::{
    body::Bytes,
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use domain::{ChatId, UserId};
use futures_util::{SinkExt, StreamExt};
use infrastructure::ConnectionId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{auth::bearer_token, error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct HubQuery {
    access_token: Option<String>,
}

/// 客户端发往服务端的帧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    JoinChat { chat_id: Uuid },
    LeaveChat { chat_id: Uuid },
    SendMessage { chat_id: Uuid, content: String },
}

/// 只回给当前连接的控制帧；分组事件直接序列化 `ChatEvent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Joined { chat_id: Uuid },
    Left { chat_id: Uuid },
    MessageAccepted { message_id: Uuid },
    Error { code: String, message: String },
}

impl ServerFrame {
    fn error(err: ApiError) -> Self {
        ServerFrame::Error {
            code: err.code().to_owned(),
            message: err.message().to_owned(),
        }
    }
}

/// 握手阶段完成认证并解析用户，失败时直接返回 HTTP 错误
pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<HubQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = match query.access_token.filter(|token| !token.is_empty()) {
        Some(token) => token,
        None => bearer_token(&headers)?.to_owned(),
    };
    let identity = state.jwt_service.verify_token(&token)?.identity();

    let user = state
        .application
        .users
        .handle(ResolveUserCommand {
            claims: identity.clone(),
            record_login: true,
        })
        .await?;

    Ok(ws.on_upgrade(move |socket| async move {
        let connection = HubConnection::open(state, identity, user.id).await;
        connection.run(socket).await;
    }))
}

/// WebSocket 写操作命令
#[derive(Debug)]
enum WsCommand {
    SendText(String),
    SendPong(Bytes),
}

/// 单个 WebSocket 连接
pub struct HubConnection {
    state: AppState,
    identity: IdentityClaims,
    user_id: UserId,
    connection_id: ConnectionId,
    events: mpsc::UnboundedReceiver<ChatEvent>,
}

impl HubConnection {
    async fn open(state: AppState, identity: IdentityClaims, user_id: UserId) -> Self {
        let (connection_id, events) = state.hub.connect(user_id).await;
        tracing::info!(%connection_id, %user_id, "hub connection established");

        Self {
            state,
            identity,
            user_id,
            connection_id,
            events,
        }
    }

    async fn run(self, socket: WebSocket) {
        let HubConnection {
            state,
            identity,
            user_id,
            connection_id,
            mut events,
        } = self;
        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：所有对 sender 的写操作都在这里
        let mut send_task = tokio::spawn(async move {
            loop {
                let outgoing = tokio::select! {
                    Some(cmd) = cmd_rx.recv() => match cmd {
                        WsCommand::SendText(text) => WsMessage::Text(text.into()),
                        WsCommand::SendPong(data) => WsMessage::Pong(data),
                    },
                    Some(event) = events.recv() => match serde_json::to_string(&event) {
                        Ok(json) => WsMessage::Text(json.into()),
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize hub event");
                            continue;
                        }
                    },
                    else => break,
                };

                if sender.send(outgoing).await.is_err() {
                    tracing::debug!("websocket sink closed");
                    break;
                }
            }
        });

        let session = Session {
            state: state.clone(),
            identity,
            user_id,
            connection_id,
            cmd_tx,
        };
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(message)) = incoming.next().await {
                if session.handle_incoming(message).await.is_err() {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        state.hub.disconnect(connection_id).await;
        tracing::info!(%connection_id, %user_id, "hub connection closed");
    }
}

/// 接收任务持有的连接上下文
struct Session {
    state: AppState,
    identity: IdentityClaims,
    user_id: UserId,
    connection_id: ConnectionId,
    cmd_tx: mpsc::Sender<WsCommand>,
}

impl Session {
    /// 返回 Err 表示连接应当结束
    async fn handle_incoming(&self, message: WsMessage) -> Result<(), ()> {
        match message {
            WsMessage::Close(_) => return Err(()),
            WsMessage::Ping(data) => {
                self.cmd_tx
                    .send(WsCommand::SendPong(data))
                    .await
                    .map_err(|_| ())?;
            }
            WsMessage::Pong(_) => {}
            WsMessage::Text(text) => {
                let reply = match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(frame) => self.dispatch(frame).await,
                    Err(err) => ServerFrame::error(ApiError::bad_request(format!(
                        "Invalid frame: {err}"
                    ))),
                };
                self.reply(reply).await?;
            }
            WsMessage::Binary(_) => {
                self.reply(ServerFrame::error(ApiError::bad_request(
                    "Binary frames are not supported",
                )))
                .await?;
            }
        }
        Ok(())
    }

    async fn dispatch(&self, frame: ClientFrame) -> ServerFrame {
        match frame {
            ClientFrame::JoinChat { chat_id } => self.join(chat_id).await,
            ClientFrame::LeaveChat { chat_id } => {
                self.state
                    .hub
                    .leave(self.connection_id, ChatId::from(chat_id))
                    .await;
                tracing::info!(connection_id = %self.connection_id, %chat_id, "left chat group");
                ServerFrame::Left { chat_id }
            }
            ClientFrame::SendMessage { chat_id, content } => {
                self.send_message(chat_id, content).await
            }
        }
    }

    /// 只有聊天成员才能订阅
    async fn join(&self, chat_id: Uuid) -> ServerFrame {
        let authorized = self
            .state
            .application
            .chat_queries
            .handle(AuthorizeChatSubscriptionQuery {
                chat_id,
                user_id: self.user_id.into(),
            })
            .await;

        if let Err(err) = authorized {
            tracing::warn!(
                connection_id = %self.connection_id,
                user_id = %self.user_id,
                %chat_id,
                error = %err,
                "join rejected"
            );
            return ServerFrame::error(ApiError::from(err));
        }

        if !self
            .state
            .hub
            .join(self.connection_id, ChatId::from(chat_id))
            .await
        {
            return ServerFrame::error(ApiError::internal_server_error(
                "Connection is no longer registered",
            ));
        }

        tracing::info!(connection_id = %self.connection_id, %chat_id, "joined chat group");
        ServerFrame::Joined { chat_id }
    }

    async fn send_message(&self, chat_id: Uuid, content: String) -> ServerFrame {
        let result = self
            .state
            .application
            .messages
            .handle(SendMessageCommand {
                chat_id,
                content,
                sender: self.identity.clone(),
            })
            .await;

        match result {
            Ok(message) => ServerFrame::MessageAccepted {
                message_id: message.id,
            },
            Err(err) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    %chat_id,
                    error = %err,
                    "direct message rejected"
                );
                ServerFrame::error(ApiError::from(err))
            }
        }
    }

    async fn reply(&self, frame: ServerFrame) -> Result<(), ()> {
        let json = serde_json::to_string(&frame).map_err(|err| {
            tracing::warn!(error = %err, "failed to serialize server frame");
        })?;
        self.cmd_tx
            .send(WsCommand::SendText(json))
            .await
            .map_err(|_| ())
    }
}
