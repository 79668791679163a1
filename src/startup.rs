//! Application Startup
//!
//! Wires storage, services and the gateway together and serves the router.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::application::dispatcher::NotificationDispatcher;
use crate::application::events::EventBus;
use crate::application::services::{
    ChatPolicy, ChatService, ChatServiceImpl, NotificationService, NotificationServiceImpl, PresenceService,
    PresenceServiceImpl,
};
use crate::config::Settings;
use crate::infrastructure::{Backends, Storage};
use crate::presentation::http::{handlers, routes};
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::Gateway;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<dyn ChatService>,
    pub presence: Arc<dyn PresenceService>,
    pub notifications: Arc<dyn NotificationService>,
    pub gateway: Arc<Gateway>,
    pub events: EventBus,
    /// External connections, `None` for in-memory storage
    pub backends: Option<Backends>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Build services over the given storage and start the notification
    /// dispatcher. Must be called inside a Tokio runtime.
    pub fn new(settings: Settings, storage: Storage) -> (Self, JoinHandle<()>) {
        let events = EventBus::new(settings.chat.event_bus_capacity);
        let gateway = Arc::new(Gateway::new(settings.websocket.heartbeat_interval_ms));
        let id_generator = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id as u64,
            settings.snowflake.epoch,
        ));

        let policy = ChatPolicy {
            max_message_length: settings.chat.max_message_length,
            max_group_size: settings.chat.max_group_size,
        };
        let chat = Arc::new(ChatServiceImpl::new(
            storage.rooms.clone(),
            storage.messages.clone(),
            storage.users.clone(),
            storage.presence.clone(),
            gateway.clone(),
            events.clone(),
            id_generator.clone(),
            policy,
        ));
        let presence = Arc::new(PresenceServiceImpl::new(
            storage.presence.clone(),
            gateway.clone(),
            storage.messages.clone(),
            storage.rooms.clone(),
            events.clone(),
        ));
        let notifications: Arc<dyn NotificationService> = Arc::new(NotificationServiceImpl::new(
            storage.notifications.clone(),
            storage.users.clone(),
            events.clone(),
            id_generator,
        ));

        let dispatcher = NotificationDispatcher::new(notifications.clone(), storage.users.clone()).spawn(&events);

        let state = Self {
            chat,
            presence,
            notifications,
            gateway,
            events,
            backends: storage.backends,
            settings: Arc::new(settings),
        };
        (state, dispatcher)
    }
}

/// Router with tracing and CORS layers applied
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    dispatcher: JoinHandle<()>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        handlers::health::init_server_start();

        let storage = Storage::connect(&settings).await?;
        tracing::info!(backend = ?settings.storage.backend, "Storage ready");

        let addr = settings.server.socket_addr()?;
        let (state, dispatcher) = AppState::new(settings, storage);
        let router = build_router(state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            dispatcher,
        })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        self.dispatcher.abort();
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
