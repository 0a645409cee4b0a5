mod support;

use serde_json::{json, Value};
use tokio_tungstenite::connect_async;

use support::{assert_silent, next_frame, send_frame, spawn_server};

#[tokio::test]
async fn posted_message_reaches_joined_connections_only() {
    let server = spawn_server().await;
    let mom = server.create_user("mom@family.com", "Mom").await;
    let mom_token = server.token("mom@family.com", "Mom", "Family");
    let brother_token = server.token("brother@family.com", "Brother", "Family");
    let chat = server
        .create_chat(&mom_token, "Family Chat", mom["id"].as_str().expect("id"))
        .await;
    let chat_id = chat["id"].as_str().expect("chat id");

    let mut joined = server.connect_ws(&mom_token).await;
    let mut bystander = server.connect_ws(&brother_token).await;

    send_frame(&mut joined, json!({ "type": "joinChat", "chatId": chat_id })).await;
    let ack = next_frame(&mut joined).await;
    assert_eq!(ack, json!({ "type": "joined", "chatId": chat_id }));

    let response = server.post_message(&mom_token, chat_id, "hello family").await;
    assert_eq!(response.status(), 201);
    let posted: Value = response.json().await.expect("message json");

    let event = next_frame(&mut joined).await;
    assert_eq!(event["type"], "receiveMessage");
    assert_eq!(event["message"]["chatId"], chat_id);
    assert_eq!(event["message"]["content"], "hello family");
    assert_eq!(event["message"]["id"], posted["id"]);
    assert_eq!(event["message"]["sender"]["firstName"], "Mom");

    assert_silent(&mut joined).await;
    assert_silent(&mut bystander).await;
}

#[tokio::test]
async fn non_members_cannot_join() {
    let server = spawn_server().await;
    let mom = server.create_user("mom@family.com", "Mom").await;
    let mom_token = server.token("mom@family.com", "Mom", "Family");
    let chat = server
        .create_chat(&mom_token, "Family Chat", mom["id"].as_str().expect("id"))
        .await;
    let chat_id = chat["id"].as_str().expect("chat id");

    let outsider_token = server.token("neighbor@example.com", "Ned", "Neighbor");
    let mut outsider = server.connect_ws(&outsider_token).await;

    send_frame(&mut outsider, json!({ "type": "joinChat", "chatId": chat_id })).await;
    let reply = next_frame(&mut outsider).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "FORBIDDEN");

    let unknown = uuid::Uuid::new_v4();
    send_frame(&mut outsider, json!({ "type": "joinChat", "chatId": unknown })).await;
    let reply = next_frame(&mut outsider).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "NOT_FOUND");

    let response = server.post_message(&mom_token, chat_id, "private").await;
    assert_eq!(response.status(), 201);
    assert_silent(&mut outsider).await;
}

#[tokio::test]
async fn direct_relay_persists_and_acknowledges() {
    let server = spawn_server().await;
    let mom = server.create_user("mom@family.com", "Mom").await;
    let mom_token = server.token("mom@family.com", "Mom", "Family");
    let chat = server
        .create_chat(&mom_token, "Family Chat", mom["id"].as_str().expect("id"))
        .await;
    let chat_id = chat["id"].as_str().expect("chat id");

    let mut connection = server.connect_ws(&mom_token).await;
    send_frame(&mut connection, json!({ "type": "joinChat", "chatId": chat_id })).await;
    assert_eq!(next_frame(&mut connection).await["type"], "joined");

    send_frame(
        &mut connection,
        json!({ "type": "sendMessage", "chatId": chat_id, "content": "via hub" }),
    )
    .await;

    // 分组事件与确认帧的先后顺序不固定
    let first = next_frame(&mut connection).await;
    let second = next_frame(&mut connection).await;
    let (event, accepted) = if first["type"] == "receiveMessage" {
        (first, second)
    } else {
        (second, first)
    };
    assert_eq!(event["type"], "receiveMessage");
    assert_eq!(event["message"]["content"], "via hub");
    assert_eq!(accepted["type"], "messageAccepted");
    assert_eq!(accepted["messageId"], event["message"]["id"]);

    let history: Vec<Value> = server
        .client
        .get(server.url(&format!("/api/messages/chat/{chat_id}")))
        .bearer_auth(&mom_token)
        .send()
        .await
        .expect("history")
        .json()
        .await
        .expect("history json");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["content"], "via hub");

    send_frame(
        &mut connection,
        json!({ "type": "sendMessage", "chatId": chat_id, "content": "  " }),
    )
    .await;
    let rejected = next_frame(&mut connection).await;
    assert_eq!(rejected["type"], "error");
    assert_eq!(rejected["code"], "VALIDATION_ERROR");
    assert_silent(&mut connection).await;
}

#[tokio::test]
async fn left_connections_stop_receiving() {
    let server = spawn_server().await;
    let mom = server.create_user("mom@family.com", "Mom").await;
    let mom_token = server.token("mom@family.com", "Mom", "Family");
    let chat = server
        .create_chat(&mom_token, "Family Chat", mom["id"].as_str().expect("id"))
        .await;
    let chat_id = chat["id"].as_str().expect("chat id");

    let mut connection = server.connect_ws(&mom_token).await;
    send_frame(&mut connection, json!({ "type": "joinChat", "chatId": chat_id })).await;
    assert_eq!(next_frame(&mut connection).await["type"], "joined");
    send_frame(&mut connection, json!({ "type": "leaveChat", "chatId": chat_id })).await;
    assert_eq!(next_frame(&mut connection).await["type"], "left");

    let response = server.post_message(&mom_token, chat_id, "anyone?").await;
    assert_eq!(response.status(), 201);
    assert_silent(&mut connection).await;
}

#[tokio::test]
async fn removed_member_stops_receiving_on_open_connection() {
    let server = spawn_server().await;
    let mom = server.create_user("mom@family.com", "Mom").await;
    let dad = server.create_user("dad@family.com", "Dad").await;
    let mom_token = server.token("mom@family.com", "Mom", "Family");
    let dad_token = server.token("dad@family.com", "Dad", "Family");
    let chat = server
        .create_chat(&mom_token, "Family Chat", mom["id"].as_str().expect("id"))
        .await;
    let chat_id = chat["id"].as_str().expect("chat id");
    let dad_id = dad["id"].as_str().expect("dad id");

    let response = server
        .client
        .post(server.url(&format!("/api/chats/{chat_id}/members")))
        .bearer_auth(&mom_token)
        .json(&json!({ "userId": dad_id }))
        .send()
        .await
        .expect("add member");
    assert_eq!(response.status(), 201);

    let mut dad_connection = server.connect_ws(&dad_token).await;
    send_frame(&mut dad_connection, json!({ "type": "joinChat", "chatId": chat_id })).await;
    assert_eq!(next_frame(&mut dad_connection).await["type"], "joined");

    let response = server.post_message(&mom_token, chat_id, "dinner at six").await;
    assert_eq!(response.status(), 201);
    assert_eq!(next_frame(&mut dad_connection).await["type"], "receiveMessage");

    let response = server
        .client
        .delete(server.url(&format!("/api/chats/{chat_id}/members/{dad_id}")))
        .bearer_auth(&mom_token)
        .send()
        .await
        .expect("remove member");
    assert_eq!(response.status(), 204);

    let response = server.post_message(&mom_token, chat_id, "surprise party plans").await;
    assert_eq!(response.status(), 201);
    assert_silent(&mut dad_connection).await;

    send_frame(&mut dad_connection, json!({ "type": "joinChat", "chatId": chat_id })).await;
    let reply = next_frame(&mut dad_connection).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "FORBIDDEN");
}

#[tokio::test]
async fn malformed_frames_get_an_error_reply() {
    let server = spawn_server().await;
    let token = server.token("mom@family.com", "Mom", "Family");
    let mut connection = server.connect_ws(&token).await;

    send_frame(&mut connection, json!({ "type": "shout" })).await;
    let reply = next_frame(&mut connection).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn handshake_without_token_is_rejected() {
    let server = spawn_server().await;
    let result = connect_async(format!("{}/hubs/chat", server.base_ws)).await;
    assert!(result.is_err());
}
