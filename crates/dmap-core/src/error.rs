//! Common error types used across dmap crates

use thiserror::Error;

/// Errors raised while building configuration or handling envelopes
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<url::ParseError> for CoreError {
    fn from(err: url::ParseError) -> Self {
        CoreError::InvalidConfiguration {
            message: format!("invalid URL: {}", err),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for CoreError {
    fn from(err: base64::DecodeError) -> Self {
        CoreError::Decode(format!("invalid base64: {}", err))
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
