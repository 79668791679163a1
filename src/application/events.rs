//! Event Bus
//!
//! In-process publish/subscribe channel for [`ChatEvent`]s. Services publish
//! after their state change is persisted; socket sessions and the
//! notification dispatcher subscribe independently.
//!
//! A single broadcast channel keeps every subscriber's view in publish order,
//! so events of one room are never reordered by the fan-out step. Broadcast
//! receivers that fall behind skip events; consumers that must see every
//! event (notification persistence) take a durable feed instead.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::domain::ChatEvent;
use crate::infrastructure::metrics;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<ChatEvent>>,
    durable: Arc<Mutex<Vec<mpsc::UnboundedSender<Arc<ChatEvent>>>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            durable: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Lossy subscription: a receiver that lags skips events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChatEvent>> {
        self.tx.subscribe()
    }

    /// Lossless subscription. Every event published after this call is
    /// queued until the receiver takes it; dropping the receiver unsubscribes.
    pub fn subscribe_durable(&self) -> mpsc::UnboundedReceiver<Arc<ChatEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.durable.lock().push(tx);
        rx
    }

    /// Publish an event. Never fails: with no subscribers the event is dropped.
    pub fn publish(&self, event: ChatEvent) {
        let name = event.name();
        metrics::record_event_published(name);
        let event = Arc::new(event);

        self.durable.lock().retain(|tx| tx.send(event.clone()).is_ok());

        match self.tx.send(event) {
            Ok(receivers) => tracing::trace!(event = name, receivers, "Event published"),
            Err(_) => tracing::debug!(event = name, "Event dropped, no subscribers"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
