//! Controller API seam

use crate::error::ControllerError;
use crate::models::{Endpoint, RegisterWebhookRequest};
use async_trait::async_trait;

/// Operations a module performs against the controller.
///
/// Each method maps to exactly one HTTP call; none of them retries.
#[async_trait]
pub trait ControllerApi: Send + Sync {
    /// Register a webhook and return the identifier assigned by the controller
    async fn register_webhook(
        &self,
        request: &RegisterWebhookRequest,
    ) -> Result<String, ControllerError>;

    /// Delete a previously registered webhook
    async fn delete_webhook(&self, webhook_id: &str) -> Result<(), ControllerError>;

    /// List the endpoints currently reachable from this module
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, ControllerError>;

    /// Push raw bytes to a single endpoint
    async fn push_to_endpoint(
        &self,
        endpoint_id: &str,
        message: &[u8],
    ) -> Result<(), ControllerError>;

    /// Push a base64-wrapped message to the controller for `receiver_id`
    async fn push_to_controller(
        &self,
        receiver_id: &str,
        message: &[u8],
    ) -> Result<(), ControllerError>;

    /// Send a base64-wrapped message to a module through the controller
    async fn send_to_module(&self, module_id: &str, message: &[u8])
        -> Result<(), ControllerError>;
}
