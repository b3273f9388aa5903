//! Inbound webhook listener.
//!
//! Serves one POST route per subscription until the shutdown token is
//! cancelled. Requests already being handled when the token fires are allowed
//! to finish.

use crate::error::WebhookError;
use crate::events::WebhookSubscription;
use crate::handlers::{
    configure_routes, AckStyle, ListenerRoute, ListenerState, DEFAULT_MAX_BODY_BYTES,
};
use crate::observer::EventObserver;
use axum::Router;
use dmap_core::WebhookEventType;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// HTTP server receiving pushed event envelopes
pub struct InboundListener {
    routes: Vec<ListenerRoute>,
    observer: Arc<dyn EventObserver>,
    ack: AckStyle,
    max_body_bytes: usize,
}

impl InboundListener {
    pub fn new(observer: Arc<dyn EventObserver>) -> Self {
        Self {
            routes: Vec::new(),
            observer,
            ack: AckStyle::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// One route per subscription's listen path
    pub fn for_subscriptions(
        subscriptions: &[WebhookSubscription],
        observer: Arc<dyn EventObserver>,
    ) -> Self {
        subscriptions
            .iter()
            .fold(Self::new(observer), |listener, sub| {
                listener.route(sub.listen_path(), sub.event())
            })
    }

    /// Add a callback path. A path that is already served, or that contains
    /// router pattern characters, is ignored.
    pub fn route(mut self, path: impl AsRef<str>, event: Option<WebhookEventType>) -> Self {
        let route = ListenerRoute::new(path, event);
        if route.path.contains([':', '*', '{', '}']) {
            warn!(path = %route.path, "Webhook path with pattern characters ignored");
            return self;
        }
        if self.routes.iter().any(|r| r.path == route.path) {
            warn!(path = %route.path, "Duplicate webhook path ignored");
            return self;
        }
        self.routes.push(route);
        self
    }

    pub fn with_ack_style(mut self, ack: AckStyle) -> Self {
        self.ack = ack;
        self
    }

    /// Bodies larger than this are acknowledged and reported as decode failures
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn routes(&self) -> &[ListenerRoute] {
        &self.routes
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(ListenerState {
            observer: self.observer.clone(),
            ack: self.ack,
            max_body_bytes: self.max_body_bytes,
        });
        configure_routes(&self.routes, state).layer(TraceLayer::new_for_http())
    }

    /// Bind the listening socket
    pub async fn bind(addr: &str) -> Result<TcpListener, WebhookError> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| WebhookError::Bind {
                addr: addr.to_string(),
                source,
            })
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), WebhookError> {
        let addr = listener.local_addr()?;
        let app = self.router();

        info!(
            "Webhook listener running on http://{} ({} route(s))",
            addr,
            self.routes.len()
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Webhook listener shutting down");
            })
            .await?;

        info!("Webhook listener stopped");
        Ok(())
    }
}
