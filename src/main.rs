//! # Chat Core
//!
//! Entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Storage backend (PostgreSQL + Redis, or in-memory)
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use chat_core::config::Settings;
use chat_core::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    chat_core::telemetry::init_tracing();

    info!("Starting Chat Core...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        backend = ?settings.storage.backend,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
