//! Base64 event envelope exchanged between peers and the controller.

use crate::error::{CoreError, CoreResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Inbound webhook body: `{"blob": "<base64>", "sourceEndpointID": "..."}`.
///
/// Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub blob: String,
    #[serde(
        rename = "sourceEndpointID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_endpoint_id: Option<String>,
}

impl EventEnvelope {
    /// Wrap raw message bytes
    pub fn wrap(message: &[u8]) -> Self {
        Self {
            blob: encode_blob(message),
            source_endpoint_id: None,
        }
    }

    pub fn with_source(mut self, endpoint_id: impl Into<String>) -> Self {
        self.source_endpoint_id = Some(endpoint_id.into());
        self
    }

    /// Parse an envelope from a raw JSON request body
    pub fn from_json(body: &[u8]) -> CoreResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        match value.get("blob") {
            None => Err(CoreError::Decode("missing 'blob' field".to_string())),
            Some(serde_json::Value::String(_)) => Ok(serde_json::from_value(value)?),
            Some(_) => Err(CoreError::Decode("'blob' must be a string".to_string())),
        }
    }

    /// Decode the base64 blob into the original message bytes
    pub fn message(&self) -> CoreResult<Vec<u8>> {
        decode_blob(&self.blob)
    }
}

/// Base64-encode a message for transport
pub fn encode_blob(message: &[u8]) -> String {
    STANDARD.encode(message)
}

/// Decode a base64 transport blob
pub fn decode_blob(blob: &str) -> CoreResult<Vec<u8>> {
    Ok(STANDARD.decode(blob.trim())?)
}
