//! Controller client error types

use thiserror::Error;

/// Errors returned by controller API calls.
///
/// Transport failures (connection refused, timeout) carry `status: None` and
/// are otherwise indistinguishable from non-success responses.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Webhook registration failed ({}): {message}", status_label(.status))]
    RegistrationFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Webhook ID not found in the registration response")]
    MissingWebhookId,

    #[error("Webhook deletion failed ({}): {message}", status_label(.status))]
    DeletionFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Listing endpoints failed ({}): {message}", status_label(.status))]
    ListFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Push failed ({}): {message}", status_label(.status))]
    PushFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Sending to module failed ({}): {message}", status_label(.status))]
    SendFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ControllerError {
    /// HTTP status of the failed call, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RegistrationFailed { status, .. }
            | Self::DeletionFailed { status, .. }
            | Self::ListFailed { status, .. }
            | Self::PushFailed { status, .. }
            | Self::SendFailed { status, .. } => *status,
            Self::MissingWebhookId | Self::InvalidConfiguration(_) => None,
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no response".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status() {
        let err = ControllerError::PushFailed {
            status: Some(500),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Push failed (status 500): boom");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_display_transport_failure() {
        let err = ControllerError::ListFailed {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Listing endpoints failed (no response): connection refused"
        );
        assert_eq!(err.status(), None);
    }
}
