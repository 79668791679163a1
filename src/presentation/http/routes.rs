//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket gateway endpoint; authenticates with the `join` frame
        .route("/gateway", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes (all protected)
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/chats", chat_routes())
        .nest("/notifications", notification_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Chat routes
fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::chat::list_rooms))
        .route("/start", post(handlers::chat::start_chat))
        .route("/messages", post(handlers::chat::send_message))
        .route("/messages/{id}", get(handlers::chat::list_messages))
        .route("/messages/{id}", delete(handlers::chat::delete_message))
        .route("/messages/{id}/forward", post(handlers::chat::forward_message))
        .route("/join", patch(handlers::chat::join_room))
        .route("/leave", patch(handlers::chat::leave_room))
        .route("/end", patch(handlers::chat::end_room))
}

/// Notification routes
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::notification::list_notifications))
        .route("/seen", patch(handlers::notification::mark_seen))
}
