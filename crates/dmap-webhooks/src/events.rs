//! Webhook subscriptions and the events delivered to them.

use crate::error::WebhookError;
use dmap_client::RegisterWebhookRequest;
use dmap_core::{display_message, WebhookEventType};
use std::fmt;
use url::Url;

/// Where the controller should deliver events for a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookTarget {
    /// Callback path on the module's advertised address
    Path(String),
    /// Full callback URL registered on behalf of a module
    Url {
        url: String,
        module_id: Option<String>,
    },
}

/// A declared webhook subscription.
///
/// The identifier is only set after the controller accepted the registration;
/// until then the subscription cannot be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscription {
    target: WebhookTarget,
    event: Option<WebhookEventType>,
    listen_path: String,
    id: Option<String>,
}

impl WebhookSubscription {
    /// Subscribe a callback path to an event kind
    pub fn path(path: impl AsRef<str>, event: WebhookEventType) -> Self {
        let path = normalize_path(path.as_ref());
        Self {
            target: WebhookTarget::Path(path.clone()),
            event: Some(event),
            listen_path: path,
            id: None,
        }
    }

    /// Subscribe a full callback URL, optionally owned by a module
    pub fn callback_url(
        url: impl AsRef<str>,
        module_id: Option<String>,
    ) -> Result<Self, WebhookError> {
        let parsed = Url::parse(url.as_ref())
            .map_err(|e| WebhookError::InvalidSubscription(format!("{}: {}", url.as_ref(), e)))?;

        Ok(Self {
            listen_path: normalize_path(parsed.path()),
            target: WebhookTarget::Url {
                url: parsed.to_string(),
                module_id,
            },
            event: None,
            id: None,
        })
    }

    pub fn target(&self) -> &WebhookTarget {
        &self.target
    }

    pub fn event(&self) -> Option<WebhookEventType> {
        self.event
    }

    /// Path the local listener must serve for this subscription
    pub fn listen_path(&self) -> &str {
        &self.listen_path
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    pub(crate) fn mark_registered(&mut self, id: String) {
        self.id = Some(id);
    }

    pub(crate) fn clear_registration(&mut self) {
        self.id = None;
    }

    /// Body sent to `POST /webhook` for this subscription
    pub fn registration_request(&self) -> RegisterWebhookRequest {
        match (&self.target, self.event) {
            (WebhookTarget::Path(path), Some(event)) => {
                RegisterWebhookRequest::for_path(path.clone(), event)
            }
            (WebhookTarget::Path(path), None) => RegisterWebhookRequest {
                url_path: Some(path.clone()),
                ..Default::default()
            },
            (WebhookTarget::Url { url, module_id }, event) => RegisterWebhookRequest {
                event,
                ..RegisterWebhookRequest::for_url(url.clone(), module_id.clone())
            },
        }
    }
}

impl fmt::Display for WebhookSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            WebhookTarget::Path(path) => write!(f, "{}", path)?,
            WebhookTarget::Url { url, .. } => write!(f, "{}", url)?,
        }
        if let Some(event) = self.event {
            write!(f, " for event {}", event)?;
        }
        Ok(())
    }
}

/// A decoded event received by the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub path: String,
    pub event: Option<WebhookEventType>,
    pub source_endpoint_id: Option<String>,
    pub message: Vec<u8>,
}

impl InboundEvent {
    /// Message as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        display_message(&self.message)
    }
}

pub(crate) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
