//! HTTP handlers for inbound webhook deliveries.

use crate::error::WebhookError;
use crate::events::{normalize_path, InboundEvent};
use crate::observer::EventObserver;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use dmap_core::{EventEnvelope, WebhookEventType};
use std::sync::Arc;
use tracing::{debug, warn};

/// One callback path served by the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerRoute {
    pub path: String,
    pub event: Option<WebhookEventType>,
}

impl ListenerRoute {
    pub fn new(path: impl AsRef<str>, event: Option<WebhookEventType>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            event,
        }
    }
}

/// How a received request is acknowledged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckStyle {
    /// `200` with `{"status":"success"}`
    #[default]
    Json,
    /// `200` with an empty body
    Empty,
}

/// Largest envelope read from a request body
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared state for webhook handlers
pub(crate) struct ListenerState {
    pub observer: Arc<dyn EventObserver>,
    pub ack: AckStyle,
    pub max_body_bytes: usize,
}

/// Build a router with one POST handler per route
pub(crate) fn configure_routes(routes: &[ListenerRoute], state: Arc<ListenerState>) -> Router {
    let mut router = Router::new();
    for route in routes {
        let route = Arc::new(route.clone());
        let path = route.path.clone();
        router = router.route(
            &path,
            post(
                move |State(state): State<Arc<ListenerState>>, body: Body| async move {
                    receive_event(state, &route, body).await
                },
            ),
        );
    }
    router.with_state(state)
}

/// Decode an event envelope and hand it to the observer.
///
/// Malformed and oversized bodies are logged and still acknowledged: senders
/// have no retry contract for this direction.
async fn receive_event(state: Arc<ListenerState>, route: &ListenerRoute, body: Body) -> Response {
    let decoded = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => decode_event(route, &bytes),
        Err(e) => Err(WebhookError::DecodeFailed(format!(
            "body not readable within {} bytes: {}",
            state.max_body_bytes, e
        ))),
    };

    match decoded {
        Ok(event) => {
            debug!(
                path = %route.path,
                "Received {} byte message",
                event.message.len()
            );
            state.observer.on_event(event);
        }
        Err(e) => {
            warn!(path = %route.path, "Failed to decode inbound event: {}", e);
            state.observer.on_decode_failure(&route.path, &e);
        }
    }

    match state.ack {
        AckStyle::Json => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "success" })),
        )
            .into_response(),
        AckStyle::Empty => StatusCode::OK.into_response(),
    }
}

fn decode_event(route: &ListenerRoute, body: &[u8]) -> Result<InboundEvent, WebhookError> {
    let envelope = EventEnvelope::from_json(body)?;
    let message = envelope.message()?;
    Ok(InboundEvent {
        path: route.path.clone(),
        event: route.event,
        source_endpoint_id: envelope.source_endpoint_id,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<InboundEvent>>,
        failures: Mutex<Vec<String>>,
    }

    impl EventObserver for RecordingObserver {
        fn on_event(&self, event: InboundEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn on_decode_failure(&self, path: &str, _error: &WebhookError) {
            self.failures.lock().unwrap().push(path.to_string());
        }
    }

    fn app(observer: Arc<RecordingObserver>, ack: AckStyle) -> Router {
        app_with_limit(observer, ack, DEFAULT_MAX_BODY_BYTES)
    }

    fn app_with_limit(
        observer: Arc<RecordingObserver>,
        ack: AckStyle,
        max_body_bytes: usize,
    ) -> Router {
        let routes = vec![
            ListenerRoute::new("/webhook1", Some(WebhookEventType::ControllerData)),
            ListenerRoute::new("/webhook3", Some(WebhookEventType::EndpointData)),
        ];
        let state = ListenerState {
            observer,
            ack,
            max_body_bytes,
        };
        configure_routes(&routes, Arc::new(state))
    }

    fn post_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_decodes_blob_and_tags_route() -> Result<(), Box<dyn std::error::Error>> {
        let observer = Arc::new(RecordingObserver::default());

        let response = app(observer.clone(), AckStyle::Json)
            .oneshot(post_request("/webhook3", r#"{"blob":"aGVsbG8="}"#))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await?.to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["status"], "success");

        let events = observer.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text(), "hello");
        assert_eq!(events[0].path, "/webhook3");
        assert_eq!(events[0].event, Some(WebhookEventType::EndpointData));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_acknowledged() -> Result<(), Box<dyn std::error::Error>> {
        let observer = Arc::new(RecordingObserver::default());

        for body in [r#"{"blob":"%%%"}"#, r#"{"data":"aGVsbG8="}"#, "not json", ""] {
            let response = app(observer.clone(), AckStyle::Json)
                .oneshot(post_request("/webhook1", body))
                .await?;
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert!(observer.events.lock().unwrap().is_empty());
        assert_eq!(observer.failures.lock().unwrap().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_large_envelope_is_decoded() -> Result<(), Box<dyn std::error::Error>> {
        let observer = Arc::new(RecordingObserver::default());
        // 3 MiB of base64, above axum's implicit 2 MiB extractor limit
        let blob = "A".repeat(3 * 1024 * 1024);
        let body = format!(r#"{{"blob":"{}"}}"#, blob);

        let response = app(observer.clone(), AckStyle::Json)
            .oneshot(post_request("/webhook1", &body))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let events = observer.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message.len(), blob.len() / 4 * 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_body_is_acknowledged() -> Result<(), Box<dyn std::error::Error>> {
        let observer = Arc::new(RecordingObserver::default());
        let body = format!(r#"{{"blob":"{}"}}"#, "A".repeat(4096));

        let response = app_with_limit(observer.clone(), AckStyle::Empty, 1024)
            .oneshot(post_request("/webhook3", &body))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(observer.events.lock().unwrap().is_empty());
        assert_eq!(*observer.failures.lock().unwrap(), vec!["/webhook3".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_ack_style() -> Result<(), Box<dyn std::error::Error>> {
        let observer = Arc::new(RecordingObserver::default());

        let response = app(observer.clone(), AckStyle::Empty)
            .oneshot(post_request(
                "/webhook1",
                r#"{"sourceEndpointID":"ep-1","blob":"aGk="}"#,
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await?.to_bytes();
        assert!(body.is_empty());

        let events = observer.events.lock().unwrap();
        assert_eq!(events[0].source_endpoint_id.as_deref(), Some("ep-1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let observer = Arc::new(RecordingObserver::default());

        let response = app(observer.clone(), AckStyle::Json)
            .oneshot(post_request("/webhook9", r#"{"blob":"aGk="}"#))
            .await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(observer.events.lock().unwrap().is_empty());
        Ok(())
    }
}
