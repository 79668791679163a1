//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;
use std::time::Duration;

use axum_test::{TestServer, TestWebSocket};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use chat_core::config::Settings;
use chat_core::domain::UserProfile;
use chat_core::infrastructure::memory::InMemoryUserRepository;
use chat_core::infrastructure::Storage;
use chat_core::presentation::middleware::Claims;
use chat_core::startup::{build_router, AppState};

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const CAROL: i64 = 3;

/// Test application over in-memory storage
pub struct TestApp {
    pub server: TestServer,
    pub users: Arc<InMemoryUserRepository>,
    _dispatcher: JoinHandle<()>,
}

impl TestApp {
    /// Create a new test application with three seeded users
    pub async fn new() -> Self {
        Self::build(false)
    }

    /// Same application served over a real socket, needed for `/gateway`
    pub async fn with_http_transport() -> Self {
        Self::build(true)
    }

    fn build(http_transport: bool) -> Self {
        let settings = Settings::from_overrides(&[("jwt.secret", SECRET), ("storage.backend", "memory")])
            .expect("test settings");

        let users = Arc::new(InMemoryUserRepository::new());
        users.upsert(UserProfile::new(ALICE, "Alice", "Archer"));
        users.upsert(UserProfile::new(BOB, "Bob", "Baker"));
        users.upsert(UserProfile::new(CAROL, "Carol", "Cooper"));

        let (state, dispatcher) = AppState::new(settings, Storage::in_memory_with(users.clone()));
        let router = build_router(state);
        let server = if http_transport {
            TestServer::builder().http_transport().build(router)
        } else {
            TestServer::new(router)
        }
        .expect("test server");

        Self {
            server,
            users,
            _dispatcher: dispatcher,
        }
    }

    /// Start a chat as `user_id` and return the response body
    pub async fn start_chat(&self, user_id: i64, body: Value) -> Value {
        self.server
            .post("/api/v1/chats/start")
            .authorization_bearer(token_for(user_id))
            .json(&body)
            .await
            .json::<Value>()
    }

    /// Send a message over HTTP and return the created message
    pub async fn send(&self, user_id: i64, room_id: &str, text: &str) -> Value {
        self.server
            .post("/api/v1/chats/messages")
            .authorization_bearer(token_for(user_id))
            .json(&serde_json::json!({ "room_id": room_id, "message": text }))
            .await
            .json::<Value>()
    }

    /// Poll the notification list until `count` entries exist or give up
    pub async fn wait_for_notifications(&self, user_id: i64, count: usize) -> Value {
        let mut body = Value::Null;
        for _ in 0..50 {
            body = self
                .server
                .get("/api/v1/notifications")
                .authorization_bearer(token_for(user_id))
                .await
                .json::<Value>();
            if body["notifications"].as_array().map_or(0, Vec::len) >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        body
    }
}

impl TestApp {
    /// Open a socket and complete the `join` handshake as `user_id`
    pub async fn connect(&self, user_id: i64) -> TestWebSocket {
        let mut socket = self.server.get_websocket("/gateway").await.into_websocket().await;
        next_frame(&mut socket, "hello").await;
        socket
            .send_json(&json!({ "t": "join", "d": { "token": token_for(user_id) } }))
            .await;
        next_frame(&mut socket, "ready").await;
        socket
    }
}

/// Next frame named `name`, skipping any other frames in between
pub async fn next_frame(socket: &mut TestWebSocket, name: &str) -> Value {
    let wait = async {
        loop {
            let frame: Value = socket.receive_json().await;
            if frame["t"] == name {
                return frame;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("no {} frame within 5s", name))
}

/// Signed bearer token for a user
pub fn token_for(user_id: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).expect("token")
}
