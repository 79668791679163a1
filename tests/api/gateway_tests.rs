//! WebSocket Gateway Tests
//!
//! Drive `/gateway` over a real socket and assert on the frames each side sees.

use std::time::Duration;

use serde_json::{json, Value};

use crate::common::{next_frame, token_for, TestApp, ALICE, BOB};

async fn room_with(app: &TestApp, user_id: i64, other: i64) -> String {
    let started = app.start_chat(user_id, json!({ "users": [other.to_string()] })).await;
    started["room"]["id"].as_str().unwrap().to_string()
}

async fn event_subscribers(app: &TestApp) -> Value {
    let health: Value = app.server.get("/health/ready").await.json();
    health["gateway"]["event_subscribers"].clone()
}

async fn member_online(app: &TestApp, viewer: i64, member: i64) -> Value {
    let rooms: Value = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer(token_for(viewer))
        .await
        .json();
    rooms["rooms"][0]["members"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["user_id"] == member.to_string())
        .unwrap()["online"]
        .clone()
}

#[tokio::test]
async fn test_join_handshake() {
    let app = TestApp::with_http_transport().await;
    let mut socket = app.server.get_websocket("/gateway").await.into_websocket().await;

    let hello = next_frame(&mut socket, "hello").await;
    assert_eq!(hello["s"], 1);
    assert!(hello["d"]["heartbeat_interval"].as_u64().unwrap() > 0);

    socket
        .send_json(&json!({ "t": "join", "d": { "token": token_for(ALICE) } }))
        .await;
    let ready = next_frame(&mut socket, "ready").await;
    assert_eq!(ready["d"]["user_id"], ALICE.to_string());
    assert!(ready["d"]["connection_id"].as_str().is_some());
    assert_eq!(ready["s"], 2);
}

#[tokio::test]
async fn test_join_with_bad_token_is_refused() {
    let app = TestApp::with_http_transport().await;
    let mut socket = app.server.get_websocket("/gateway").await.into_websocket().await;
    next_frame(&mut socket, "hello").await;

    socket
        .send_json(&json!({ "t": "join", "d": { "token": "forged" } }))
        .await;
    let refused = next_frame(&mut socket, "invalid-session").await;
    assert_eq!(refused["d"]["reason"], "unauthorized");
}

#[tokio::test]
async fn test_socket_is_subscribed_before_join() {
    let app = TestApp::with_http_transport().await;
    assert_eq!(event_subscribers(&app).await, 0);

    let mut socket = app.server.get_websocket("/gateway").await.into_websocket().await;
    next_frame(&mut socket, "hello").await;

    // Events published between presence registration and the session loop
    // must already be queued for this socket.
    assert_eq!(event_subscribers(&app).await, 1);
}

#[tokio::test]
async fn test_heartbeat_is_acknowledged() {
    let app = TestApp::with_http_transport().await;
    let mut socket = app.connect(ALICE).await;

    socket.send_json(&json!({ "t": "heartbeat" })).await;
    next_frame(&mut socket, "heartbeat-ack").await;
}

#[tokio::test]
async fn test_chat_message_reaches_recipient_and_other_tabs() {
    let app = TestApp::with_http_transport().await;
    let room_id = room_with(&app, ALICE, BOB).await;

    let mut alice = app.connect(ALICE).await;
    let mut alice_tab = app.connect(ALICE).await;
    let mut bob = app.connect(BOB).await;

    alice
        .send_json(&json!({ "t": "chat-message", "d": { "room_id": room_id, "message": "hi bob" } }))
        .await;

    let received = next_frame(&mut bob, "chat-message").await;
    assert_eq!(received["d"]["message"], "hi bob");
    assert_eq!(received["d"]["from"], ALICE.to_string());
    // Bob was connected, so the message was delivered but not read.
    assert_eq!(received["d"]["delivered_to"], json!([BOB.to_string()]));
    assert_eq!(received["d"]["read_by"], json!([]));

    let echoed = next_frame(&mut alice_tab, "chat-message").await;
    assert_eq!(echoed["d"]["id"], received["d"]["id"]);
    let own = next_frame(&mut alice, "chat-message").await;
    assert_eq!(own["d"]["id"], received["d"]["id"]);
}

#[tokio::test]
async fn test_viewing_room_reads_and_notifies_peer() {
    let app = TestApp::with_http_transport().await;
    let started = app
        .start_chat(ALICE, json!({ "users": [BOB.to_string()], "message": "while you were out" }))
        .await;
    let room_id = started["room"]["id"].as_str().unwrap().to_string();

    let mut alice = app.connect(ALICE).await;
    let mut bob = app.connect(BOB).await;

    // Bob's connect reconciles the pending message.
    let delivered = next_frame(&mut alice, "chat-delivered").await;
    assert_eq!(delivered["d"], json!({ "room_id": room_id, "user_id": BOB.to_string() }));

    bob.send_json(&json!({ "t": "join-room", "d": { "room_id": room_id } }))
        .await;
    let joined = next_frame(&mut bob, "room-joined").await;
    assert_eq!(joined["d"]["read_count"], 1);

    let read = next_frame(&mut alice, "chat-read").await;
    assert_eq!(read["d"], json!({ "room_id": room_id, "user_id": BOB.to_string() }));

    // While Bob views the room, new messages arrive already read.
    alice
        .send_json(&json!({ "t": "chat-message", "d": { "room_id": room_id, "message": "seen?" } }))
        .await;
    let live = next_frame(&mut bob, "chat-message").await;
    assert_eq!(live["d"]["read_by"], json!([BOB.to_string()]));
}

#[tokio::test]
async fn test_socket_errors_stay_on_the_acting_connection() {
    let app = TestApp::with_http_transport().await;
    let mut alice = app.connect(ALICE).await;

    alice
        .send_json(&json!({ "t": "chat-message", "d": { "room_id": "424242", "message": "nobody" } }))
        .await;
    let error = next_frame(&mut alice, "error").await;
    assert_eq!(error["d"]["code"], 10001);
}

#[tokio::test]
async fn test_closing_last_socket_goes_offline() {
    let app = TestApp::with_http_transport().await;
    room_with(&app, ALICE, BOB).await;

    let bob = app.connect(BOB).await;
    assert_eq!(member_online(&app, ALICE, BOB).await, true);

    bob.close().await;

    let mut online = Value::Null;
    for _ in 0..50 {
        online = member_online(&app, ALICE, BOB).await;
        if online == false {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(online, false);
}
