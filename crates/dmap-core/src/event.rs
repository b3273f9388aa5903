//! Event kinds a webhook subscription can be registered for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of event the controller delivers to a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventType {
    /// Data pushed by the controller itself
    ControllerData,
    /// Data pushed by a peer endpoint
    EndpointData,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ControllerData => "CONTROLLER_DATA",
            Self::EndpointData => "ENDPOINT_DATA",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WebhookEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CONTROLLER_DATA" => Ok(Self::ControllerData),
            "ENDPOINT_DATA" => Ok(Self::EndpointData),
            other => Err(format!(
                "invalid event '{}', expected CONTROLLER_DATA or ENDPOINT_DATA",
                other
            )),
        }
    }
}
