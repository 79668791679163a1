//! Health Check Handlers
//!
//! - `GET /health` and `GET /health/live`: the process is up
//! - `GET /health/ready`: storage answers, with per-backend probe results

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

use crate::config::StorageBackend;
use crate::infrastructure::{cache, database};
use crate::startup::AppState;

/// Slower probes than this report `degraded`
const DEGRADED_AFTER_MS: u64 = 100;

static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Pin the uptime origin; call once during startup
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Result of pinging one backend
#[derive(Debug, Serialize)]
pub struct Probe {
    pub status: HealthStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StorageReport {
    pub backend: StorageBackend,
    /// Absent for the in-memory backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<Probe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Probe>,
}

#[derive(Debug, Serialize)]
pub struct GatewayReport {
    pub sessions: usize,
    pub event_subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub storage: StorageReport,
    pub gateway: GatewayReport,
}

pub async fn health_check() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// 200 while records can be stored, 503 once the database is unreachable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let (database, presence) = match &state.backends {
        Some(backends) => {
            let (db, redis) = tokio::join!(probe(database::ping(&backends.db)), probe(cache::ping(&backends.redis)));
            (Some(db), Some(redis))
        }
        None => (None, None),
    };

    let status = overall_status(database.as_ref(), presence.as_ref());
    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        storage: StorageReport {
            backend: state.settings.storage.backend,
            database,
            presence,
        },
        gateway: GatewayReport {
            sessions: state.gateway.session_count(),
            event_subscribers: state.events.subscriber_count(),
        },
    };

    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(response))
}

async fn probe<E: std::fmt::Display>(ping: impl Future<Output = Result<(), E>>) -> Probe {
    let start = Instant::now();
    let result = ping.await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) if latency_ms < DEGRADED_AFTER_MS => Probe {
            status: HealthStatus::Healthy,
            latency_ms,
            error: None,
        },
        Ok(()) => Probe {
            status: HealthStatus::Degraded,
            latency_ms,
            error: None,
        },
        Err(e) => Probe {
            status: HealthStatus::Unhealthy,
            latency_ms,
            error: Some(e.to_string()),
        },
    }
}

/// Losing the database stops the service; losing presence only degrades it
/// (messages are still stored, just never marked delivered).
fn overall_status(database: Option<&Probe>, presence: Option<&Probe>) -> HealthStatus {
    let db = database.map_or(HealthStatus::Healthy, |p| p.status);
    let presence = presence.map_or(HealthStatus::Healthy, |p| p.status.min(HealthStatus::Degraded));
    db.max(presence)
}
