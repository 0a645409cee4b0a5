#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use application::{ChatApplication, IdentityClaims, SystemClock};
use domain::UserRepository;
use futures_util::{SinkExt, StreamExt};
use infrastructure::Infrastructure;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState, JwtConfig, JwtService};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret-at-least-32-bytes".to_string(),
        issuer: "family-chat".to_string(),
        audience: "family-chat-clients".to_string(),
        expiration_hours: 1,
    }
}

/// 使用内存存储启动真实路由，监听随机端口
pub struct TestServer {
    pub base_http: String,
    pub base_ws: String,
    pub client: Client,
    pub jwt: Arc<JwtService>,
    /// 与路由共享的用户存储，用于直接检查持久化结果
    pub users: Arc<dyn UserRepository>,
    _shutdown: oneshot::Sender<()>,
}

pub async fn spawn_server() -> TestServer {
    let infrastructure = Infrastructure::in_memory(4);
    let application =
        ChatApplication::new(infrastructure.application_dependencies(Arc::new(SystemClock)));
    let jwt = Arc::new(JwtService::new(test_jwt_config()));
    let users = infrastructure.user_repository.clone();
    let state = AppState::new(application, infrastructure.hub.clone(), jwt.clone());
    let router = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        base_http: format!("http://{addr}"),
        base_ws: format!("ws://{addr}"),
        client: Client::new(),
        jwt,
        users,
        _shutdown: shutdown_tx,
    }
}

impl TestServer {
    pub fn token(&self, email: &str, first_name: &str, last_name: &str) -> String {
        self.jwt
            .issue_token(&IdentityClaims::new(
                Some(email.to_string()),
                Some(first_name.to_string()),
                Some(last_name.to_string()),
            ))
            .expect("issue token")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_http, path)
    }

    pub async fn create_user(&self, email: &str, first_name: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/users"))
            .json(&json!({
                "email": email,
                "firstName": first_name,
                "lastName": "Family",
                "password": "secret-password"
            }))
            .send()
            .await
            .expect("create user");
        assert_eq!(response.status(), 201);
        response.json().await.expect("user json")
    }

    pub async fn create_chat(&self, token: &str, name: &str, creator_id: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/chats"))
            .bearer_auth(token)
            .json(&json!({
                "name": name,
                "description": "test chat",
                "isDefault": false,
                "createdById": creator_id
            }))
            .send()
            .await
            .expect("create chat");
        assert_eq!(response.status(), 200);
        response.json().await.expect("chat json")
    }

    pub async fn post_message(&self, token: &str, chat_id: &str, content: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/messages/chat/{chat_id}")))
            .bearer_auth(token)
            .json(&content)
            .send()
            .await
            .expect("post message")
    }

    pub async fn connect_ws(&self, token: &str) -> WsStream {
        let url = format!(
            "{}/hubs/chat?{}={}",
            self.base_ws,
            web_api::ACCESS_TOKEN_PARAM,
            token
        );
        let (stream, _) = connect_async(url).await.expect("websocket connect");
        stream
    }
}

pub async fn send_frame(ws: &mut WsStream, frame: Value) {
    ws.send(TungsteniteMessage::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// 等待下一个文本帧，超时即失败
pub async fn next_frame(ws: &mut WsStream) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .expect("frame");
        if let TungsteniteMessage::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

pub async fn assert_silent(ws: &mut WsStream) {
    let result = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "unexpected frame: {:?}", result);
}
