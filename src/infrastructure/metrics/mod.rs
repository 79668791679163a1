//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket connection gauges
//! - Messages persisted
//! - Fan-out events published and delivered to sockets
//! - Notification dispatch outcomes

use once_cell::sync::Lazy;
use prometheus::{Encoder, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("websocket_connections_active", "Number of active WebSocket connections").namespace("chat_core"),
        &["state"], // "connected", "identified"
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Messages persisted
pub static MESSAGES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(Opts::new("messages_sent_total", "Total number of chat messages persisted").namespace("chat_core"))
        .expect("Failed to create MESSAGES_SENT_TOTAL metric")
});

/// Events published on the event bus, by event name
pub static EVENTS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_published_total", "Total number of chat events published").namespace("chat_core"),
        &["event"],
    )
    .expect("Failed to create EVENTS_PUBLISHED_TOTAL metric")
});

/// Frames pushed to sockets, by event name
pub static SOCKET_EVENTS_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("socket_events_sent_total", "Total number of events pushed to sockets").namespace("chat_core"),
        &["event"],
    )
    .expect("Failed to create SOCKET_EVENTS_SENT_TOTAL metric")
});

/// Notification dispatch outcomes
pub static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("notifications_total", "Notification dispatch outcomes").namespace("chat_core"),
        &["outcome"], // "created", "suppressed", "failed"
    )
    .expect("Failed to create NOTIFICATIONS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_SENT_TOTAL.clone()))
        .expect("Failed to register MESSAGES_SENT_TOTAL");
    registry
        .register(Box::new(EVENTS_PUBLISHED_TOTAL.clone()))
        .expect("Failed to register EVENTS_PUBLISHED_TOTAL");
    registry
        .register(Box::new(SOCKET_EVENTS_SENT_TOTAL.clone()))
        .expect("Failed to register SOCKET_EVENTS_SENT_TOTAL");
    registry
        .register(Box::new(NOTIFICATIONS_TOTAL.clone()))
        .expect("Failed to register NOTIFICATIONS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to update WebSocket connection count
pub fn set_websocket_connections(connected: usize, identified: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE
        .with_label_values(&["connected"])
        .set(connected as f64);
    WEBSOCKET_CONNECTIONS_ACTIVE
        .with_label_values(&["identified"])
        .set(identified as f64);
}

pub fn record_message_sent() {
    MESSAGES_SENT_TOTAL.inc();
}

pub fn record_event_published(event: &str) {
    EVENTS_PUBLISHED_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_socket_event(event: &str) {
    SOCKET_EVENTS_SENT_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_notification(outcome: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
}
