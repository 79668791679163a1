//! Chat API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{token_for, TestApp, ALICE, BOB, CAROL};

fn member<'a>(room: &'a Value, user_id: i64) -> &'a Value {
    room["members"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["user_id"] == user_id.to_string())
        .unwrap()
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/v1/chats").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer("not-a-jwt")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_start_one_to_one_chat_is_idempotent() {
    let app = TestApp::new().await;

    let first = app
        .server
        .post("/api/v1/chats/start")
        .authorization_bearer(token_for(ALICE))
        .json(&json!({ "users": [BOB.to_string()], "message": "hello bob" }))
        .await;
    first.assert_status(StatusCode::CREATED);
    let first: Value = first.json();
    assert_eq!(first["created"], true);
    assert_eq!(first["message"]["message"], "hello bob");
    assert_eq!(member(&first["room"], BOB)["unread_count"], 1);
    assert_eq!(member(&first["room"], ALICE)["unread_count"], 0);

    // Either side resolves to the same room
    let second = app
        .server
        .post("/api/v1/chats/start")
        .authorization_bearer(token_for(BOB))
        .json(&json!({ "users": [ALICE.to_string()] }))
        .await;
    second.assert_status(StatusCode::OK);
    let second: Value = second.json();
    assert_eq!(second["created"], false);
    assert_eq!(second["room"]["id"], first["room"]["id"]);
}

#[tokio::test]
async fn test_start_chat_with_unknown_user_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .server
        .post("/api/v1/chats/start")
        .authorization_bearer(token_for(ALICE))
        .json(&json!({ "users": ["999"] }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_one_to_one_with_two_participants_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .server
        .post("/api/v1/chats/start")
        .authorization_bearer(token_for(ALICE))
        .json(&json!({ "users": [BOB.to_string(), CAROL.to_string()] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_group_chat_always_creates_a_room() {
    let app = TestApp::new().await;
    let body = json!({ "users": [BOB.to_string(), CAROL.to_string()], "reference": "GROUP" });

    let first = app.start_chat(ALICE, body.clone()).await;
    let second = app.start_chat(ALICE, body).await;

    assert_eq!(first["room"]["reference"], "GROUP");
    assert_eq!(first["room"]["members"].as_array().unwrap().len(), 3);
    assert_ne!(first["room"]["id"], second["room"]["id"]);
}

#[tokio::test]
async fn test_send_and_list_messages() {
    let app = TestApp::new().await;
    let started = app.start_chat(ALICE, json!({ "users": [BOB.to_string()] })).await;
    let room_id = started["room"]["id"].as_str().unwrap().to_string();

    let sent = app.send(ALICE, &room_id, "first").await;
    assert_eq!(sent["from"], ALICE.to_string());
    assert_eq!(sent["to"], json!([BOB.to_string()]));
    assert_eq!(sent["room_id"], room_id);
    app.send(BOB, &room_id, "second").await;

    let list: Value = app
        .server
        .get(&format!("/api/v1/chats/messages/{}", room_id))
        .authorization_bearer(token_for(ALICE))
        .await
        .json();
    assert_eq!(list["total_count"], 2);
    assert_eq!(list["messages"].as_array().unwrap().len(), 2);

    let rooms: Value = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer(token_for(BOB))
        .await
        .json();
    assert_eq!(rooms["total_count"], 1);
    assert_eq!(rooms["rooms"][0]["last_message"]["message"], "second");
}

#[tokio::test]
async fn test_non_member_cannot_send() {
    let app = TestApp::new().await;
    let started = app.start_chat(ALICE, json!({ "users": [BOB.to_string()] })).await;
    let room_id = started["room"]["id"].as_str().unwrap();

    let response = app
        .server
        .post("/api/v1/chats/messages")
        .authorization_bearer(token_for(CAROL))
        .json(&json!({ "room_id": room_id, "message": "sneaky" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_messages_of_missing_room_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .server
        .get("/api/v1/chats/messages/12345")
        .authorization_bearer(token_for(ALICE))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_join_marks_room_read() {
    let app = TestApp::new().await;
    let started = app
        .start_chat(ALICE, json!({ "users": [BOB.to_string()], "message": "one" }))
        .await;
    let room_id = started["room"]["id"].as_str().unwrap().to_string();
    app.send(ALICE, &room_id, "two").await;

    let read = app
        .server
        .patch("/api/v1/chats/join")
        .authorization_bearer(token_for(BOB))
        .json(&json!({ "room_id": room_id }))
        .await;
    read.assert_status_ok();
    assert_eq!(read.json::<Value>()["read_count"], 2);

    let rooms: Value = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer(token_for(BOB))
        .await
        .json();
    assert_eq!(member(&rooms["rooms"][0], BOB)["unread_count"], 0);

    let messages: Value = app
        .server
        .get(&format!("/api/v1/chats/messages/{}", room_id))
        .authorization_bearer(token_for(ALICE))
        .await
        .json();
    for message in messages["messages"].as_array().unwrap() {
        assert_eq!(message["read_by"], json!([BOB.to_string()]));
    }
}

#[tokio::test]
async fn test_leave_and_end_are_not_implemented() {
    let app = TestApp::new().await;
    let started = app.start_chat(ALICE, json!({ "users": [BOB.to_string()] })).await;
    let room_id = started["room"]["id"].as_str().unwrap();

    for path in ["/api/v1/chats/leave", "/api/v1/chats/end"] {
        let response = app
            .server
            .patch(path)
            .authorization_bearer(token_for(ALICE))
            .json(&json!({ "room_id": room_id }))
            .await;
        response.assert_status(StatusCode::NOT_IMPLEMENTED);
    }
}

#[tokio::test]
async fn test_delete_hides_message_for_caller_only() {
    let app = TestApp::new().await;
    let started = app
        .start_chat(ALICE, json!({ "users": [BOB.to_string()], "message": "oops" }))
        .await;
    let room_id = started["room"]["id"].as_str().unwrap().to_string();
    let message_id = started["message"]["id"].as_str().unwrap().to_string();

    app.server
        .delete(&format!("/api/v1/chats/messages/{}", message_id))
        .authorization_bearer(token_for(ALICE))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let alice: Value = app
        .server
        .get(&format!("/api/v1/chats/messages/{}", room_id))
        .authorization_bearer(token_for(ALICE))
        .await
        .json();
    assert_eq!(alice["total_count"], 0);

    let bob: Value = app
        .server
        .get(&format!("/api/v1/chats/messages/{}", room_id))
        .authorization_bearer(token_for(BOB))
        .await
        .json();
    assert_eq!(bob["total_count"], 1);

    app.server
        .delete(&format!("/api/v1/chats/messages/{}", message_id))
        .authorization_bearer(token_for(CAROL))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_forward_copies_message_into_other_room() {
    let app = TestApp::new().await;
    let source = app
        .start_chat(ALICE, json!({ "users": [BOB.to_string()], "message": "pass it on" }))
        .await;
    let target = app.start_chat(ALICE, json!({ "users": [CAROL.to_string()] })).await;
    let message_id = source["message"]["id"].as_str().unwrap();
    let target_id = target["room"]["id"].as_str().unwrap();

    let response = app
        .server
        .post(&format!("/api/v1/chats/messages/{}/forward", message_id))
        .authorization_bearer(token_for(ALICE))
        .json(&json!({ "room_id": target_id }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let forwarded: Value = response.json();
    assert_eq!(forwarded["is_forwarded"], true);
    assert_eq!(forwarded["room_id"], target_id);
    assert_eq!(forwarded["message"], "pass it on");
    assert_eq!(forwarded["to"], json!([CAROL.to_string()]));
}

#[tokio::test]
async fn test_reply_must_stay_in_room() {
    let app = TestApp::new().await;
    let first = app
        .start_chat(ALICE, json!({ "users": [BOB.to_string()], "message": "question" }))
        .await;
    let other = app.start_chat(ALICE, json!({ "users": [CAROL.to_string()] })).await;
    let parent_id = first["message"]["id"].as_str().unwrap();

    let reply = app
        .server
        .post("/api/v1/chats/messages")
        .authorization_bearer(token_for(BOB))
        .json(&json!({ "room_id": first["room"]["id"], "message": "answer", "reply_to": parent_id }))
        .await;
    reply.assert_status(StatusCode::CREATED);
    assert_eq!(reply.json::<Value>()["reply_to"], parent_id);

    let misplaced = app
        .server
        .post("/api/v1/chats/messages")
        .authorization_bearer(token_for(ALICE))
        .json(&json!({ "room_id": other["room"]["id"], "message": "wrong room", "reply_to": parent_id }))
        .await;
    misplaced.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_room_search_filters_by_member_name() {
    let app = TestApp::new().await;
    app.start_chat(ALICE, json!({ "users": [BOB.to_string()] })).await;
    app.start_chat(ALICE, json!({ "users": [CAROL.to_string()] })).await;

    let rooms: Value = app
        .server
        .get("/api/v1/chats")
        .add_query_param("search", "carol")
        .authorization_bearer(token_for(ALICE))
        .await
        .json();
    assert_eq!(rooms["total_count"], 1);
    assert!(rooms["rooms"][0]["members"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["user_id"] == CAROL.to_string()));
}
