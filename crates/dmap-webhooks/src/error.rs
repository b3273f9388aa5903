//! Webhook error types

use dmap_client::ControllerError;
use dmap_core::CoreError;
use thiserror::Error;

/// Errors raised by the listener and the registration lifecycle
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Failed to decode event: {0}")]
    DecodeFailed(String),

    #[error("Registration of {target} is required but failed: {source}")]
    RegistrationRequired {
        target: String,
        #[source]
        source: ControllerError,
    },

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Listener error: {0}")]
    Server(#[from] std::io::Error),
}

impl From<CoreError> for WebhookError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Decode(message) => WebhookError::DecodeFailed(message),
            other => WebhookError::DecodeFailed(other.to_string()),
        }
    }
}
