//! Request and response bodies of the controller API.

use dmap_core::{encode_blob, WebhookEventType};
use serde::{Deserialize, Serialize};

/// Body of `POST /webhook`.
///
/// Modules register a callback path plus event kind; external handlers
/// register a full callback URL on behalf of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWebhookRequest {
    #[serde(rename = "moduleID", skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(rename = "urlPath", skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<WebhookEventType>,
}

impl RegisterWebhookRequest {
    pub fn for_path(url_path: impl Into<String>, event: WebhookEventType) -> Self {
        Self {
            url_path: Some(url_path.into()),
            event: Some(event),
            ..Default::default()
        }
    }

    pub fn for_url(url: impl Into<String>, module_id: Option<String>) -> Self {
        Self {
            module_id,
            url: Some(url.into()),
            ..Default::default()
        }
    }
}

/// Body of a `201` registration response
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterWebhookResponse {
    #[serde(rename = "ID", alias = "id", default)]
    pub id: Option<String>,
}

/// A peer endpoint returned by `GET /endpoint`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
}

/// Body of `POST /controller/push`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerPushRequest {
    #[serde(rename = "receiverId")]
    pub receiver_id: String,
    pub blob: String,
}

impl ControllerPushRequest {
    pub fn new(receiver_id: impl Into<String>, message: &[u8]) -> Self {
        Self {
            receiver_id: receiver_id.into(),
            blob: encode_blob(message),
        }
    }
}

/// Body of `POST /module/<module_id>/send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSendRequest {
    pub data: String,
}

impl ModuleSendRequest {
    pub fn new(message: &[u8]) -> Self {
        Self {
            data: encode_blob(message),
        }
    }
}
