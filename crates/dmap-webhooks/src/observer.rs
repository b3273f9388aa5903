//! Pluggable handling of received events.

use crate::error::WebhookError;
use crate::events::InboundEvent;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receives every event decoded by the listener.
///
/// Called on the request task; implementations must not block.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: InboundEvent);

    /// Called when a request body could not be decoded. The request is still
    /// acknowledged.
    fn on_decode_failure(&self, path: &str, error: &WebhookError) {
        let _ = (path, error);
    }
}

/// Logs each received message
#[derive(Debug, Clone, Default)]
pub struct LoggingObserver;

impl EventObserver for LoggingObserver {
    fn on_event(&self, event: InboundEvent) {
        let kind = event
            .event
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".to_string());

        match &event.source_endpoint_id {
            Some(source) => info!(
                path = %event.path,
                event = %kind,
                source = %source,
                "Webhook {} received message: {}",
                event.path,
                event.text()
            ),
            None => info!(
                path = %event.path,
                event = %kind,
                "Webhook {} received message: {}",
                event.path,
                event.text()
            ),
        }
    }
}

/// Forwards events to an async consumer over a bounded channel.
///
/// Events are dropped with a warning when the channel is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::Sender<InboundEvent>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<InboundEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventObserver for ChannelObserver {
    fn on_event(&self, event: InboundEvent) {
        let path = event.path.clone();
        if let Err(e) = self.sender.try_send(event) {
            warn!(path = %path, "Dropping inbound event: {}", e);
        }
    }
}
