//! Notification API Tests

use axum::http::StatusCode;
use chat_core::domain::UserProfile;
use serde_json::{json, Value};

use crate::common::{token_for, TestApp, ALICE, BOB, CAROL};

#[tokio::test]
async fn test_message_creates_notification_for_recipient() {
    let app = TestApp::new().await;
    let started = app
        .start_chat(ALICE, json!({ "users": [BOB.to_string()], "message": "ping" }))
        .await;

    let list = app.wait_for_notifications(BOB, 1).await;
    let notification = &list["notifications"][0];
    assert_eq!(notification["title"], "Alice Archer");
    assert_eq!(notification["message"], "ping");
    assert_eq!(notification["sender_id"], ALICE.to_string());
    assert_eq!(notification["payload"]["room_id"], started["room"]["id"]);
    assert_eq!(notification["seen"], false);
    assert_eq!(list["unread_count"], 1);

    // The sender is never notified about their own message
    let own: Value = app
        .server
        .get("/api/v1/notifications")
        .authorization_bearer(token_for(ALICE))
        .await
        .json();
    assert_eq!(own["total_count"], 0);
}

#[tokio::test]
async fn test_disabled_preference_suppresses_notifications() {
    let app = TestApp::new().await;
    app.users.upsert(UserProfile {
        in_app_notifications: false,
        ..UserProfile::new(CAROL, "Carol", "Cooper")
    });

    app.start_chat(
        ALICE,
        json!({ "users": [BOB.to_string(), CAROL.to_string()], "reference": "GROUP", "message": "team" }),
    )
    .await;
    app.start_chat(ALICE, json!({ "users": [BOB.to_string()], "message": "direct" }))
        .await;

    // Events are dispatched in order, so the group message is settled once
    // Bob has both notifications.
    let bob = app.wait_for_notifications(BOB, 2).await;
    assert_eq!(bob["total_count"], 2);

    let carol: Value = app
        .server
        .get("/api/v1/notifications")
        .authorization_bearer(token_for(CAROL))
        .await
        .json();
    assert_eq!(carol["total_count"], 0);
}

#[tokio::test]
async fn test_mark_seen_single_then_all() {
    let app = TestApp::new().await;
    let started = app
        .start_chat(ALICE, json!({ "users": [BOB.to_string()], "message": "one" }))
        .await;
    let room_id = started["room"]["id"].as_str().unwrap().to_string();
    app.send(ALICE, &room_id, "two").await;
    app.send(ALICE, &room_id, "three").await;

    let list = app.wait_for_notifications(BOB, 3).await;
    let first_id = list["notifications"][0]["id"].as_str().unwrap();

    let single = app
        .server
        .patch("/api/v1/notifications/seen")
        .authorization_bearer(token_for(BOB))
        .json(&json!({ "notification_id": first_id }))
        .await;
    single.assert_status_ok();
    assert_eq!(single.json::<Value>()["unseen_count"], 2);

    let all = app
        .server
        .patch("/api/v1/notifications/seen")
        .authorization_bearer(token_for(BOB))
        .await;
    all.assert_status_ok();
    assert_eq!(all.json::<Value>()["unseen_count"], 0);
}

#[tokio::test]
async fn test_mark_seen_rejects_malformed_id() {
    let app = TestApp::new().await;

    let response = app
        .server
        .patch("/api/v1/notifications/seen")
        .authorization_bearer(token_for(BOB))
        .json(&json!({ "notification_id": "abc" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
