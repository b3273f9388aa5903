//! Controller HTTP client implementation
//!
//! All requests share one `reqwest::Client` configured from the module's
//! [`ControllerConfig`]: basic authentication, bounded timeouts and the TLS
//! verification policy.

use async_trait::async_trait;
use dmap_core::{join_url, ControllerConfig, Credentials, TlsVerification};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use std::path::Path;
use tracing::debug;

use crate::error::ControllerError;
use crate::models::{
    ControllerPushRequest, Endpoint, ModuleSendRequest, RegisterWebhookRequest,
    RegisterWebhookResponse,
};
use crate::traits::ControllerApi;

/// Client for the controller REST API
#[derive(Debug, Clone)]
pub struct ControllerClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl ControllerClient {
    /// Build a client from the process-wide controller configuration
    pub fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str());

        builder = match &config.verification {
            TlsVerification::Disabled => builder.danger_accept_invalid_certs(true),
            TlsVerification::Enabled { ca_file: Some(path) } => {
                builder.add_root_certificate(load_certificate(path)?)
            }
            TlsVerification::Enabled { ca_file: None } => builder,
        };

        let client = builder.build().map_err(|e| {
            ControllerError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start an authenticated request against the controller API
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = join_url(&self.base_url, path);
        debug!("Controller API request: {} {}", method, url);

        let request = self.client.request(method, url);
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        }
    }
}

#[async_trait]
impl ControllerApi for ControllerClient {
    async fn register_webhook(
        &self,
        request: &RegisterWebhookRequest,
    ) -> Result<String, ControllerError> {
        let response = self
            .request(Method::POST, "/webhook")
            .json(request)
            .send()
            .await
            .map_err(|e| ControllerError::RegistrationFailed {
                status: None,
                message: e.to_string(),
            })?;

        if response.status() != StatusCode::CREATED {
            let (status, message) = failure_details(response).await;
            return Err(ControllerError::RegistrationFailed { status, message });
        }

        let body: RegisterWebhookResponse = response
            .json()
            .await
            .map_err(|_| ControllerError::MissingWebhookId)?;

        match body.id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(ControllerError::MissingWebhookId),
        }
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<(), ControllerError> {
        let response = self
            .request(Method::DELETE, "/webhook")
            .query(&[("id", webhook_id)])
            .send()
            .await
            .map_err(|e| ControllerError::DeletionFailed {
                status: None,
                message: e.to_string(),
            })?;

        if response.status() != StatusCode::NO_CONTENT {
            let (status, message) = failure_details(response).await;
            return Err(ControllerError::DeletionFailed { status, message });
        }
        Ok(())
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, ControllerError> {
        let response = self
            .request(Method::GET, "/endpoint")
            .send()
            .await
            .map_err(|e| ControllerError::ListFailed {
                status: None,
                message: e.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            let (status, message) = failure_details(response).await;
            return Err(ControllerError::ListFailed { status, message });
        }

        response
            .json::<Vec<Endpoint>>()
            .await
            .map_err(|e| ControllerError::ListFailed {
                status: Some(StatusCode::OK.as_u16()),
                message: format!("Failed to parse endpoint list: {}", e),
            })
    }

    async fn push_to_endpoint(
        &self,
        endpoint_id: &str,
        message: &[u8],
    ) -> Result<(), ControllerError> {
        let response = self
            .request(Method::POST, "/endpoint/push")
            .query(&[("id", endpoint_id)])
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(message.to_vec())
            .send()
            .await
            .map_err(|e| ControllerError::PushFailed {
                status: None,
                message: e.to_string(),
            })?;

        expect_ok(response)
            .await
            .map_err(|(status, message)| ControllerError::PushFailed { status, message })
    }

    async fn push_to_controller(
        &self,
        receiver_id: &str,
        message: &[u8],
    ) -> Result<(), ControllerError> {
        let response = self
            .request(Method::POST, "/controller/push")
            .json(&ControllerPushRequest::new(receiver_id, message))
            .send()
            .await
            .map_err(|e| ControllerError::PushFailed {
                status: None,
                message: e.to_string(),
            })?;

        expect_ok(response)
            .await
            .map_err(|(status, message)| ControllerError::PushFailed { status, message })
    }

    async fn send_to_module(
        &self,
        module_id: &str,
        message: &[u8],
    ) -> Result<(), ControllerError> {
        let path = format!("/module/{}/send", urlencoding::encode(module_id));
        let response = self
            .request(Method::POST, &path)
            .json(&ModuleSendRequest::new(message))
            .send()
            .await
            .map_err(|e| ControllerError::SendFailed {
                status: None,
                message: e.to_string(),
            })?;

        expect_ok(response)
            .await
            .map_err(|(status, message)| ControllerError::SendFailed { status, message })
    }
}

/// Read a certificate file as PEM, falling back to DER
fn load_certificate(path: &Path) -> Result<reqwest::Certificate, ControllerError> {
    let bytes = std::fs::read(path).map_err(|e| {
        ControllerError::InvalidConfiguration(format!(
            "Failed to read certificate {}: {}",
            path.display(),
            e
        ))
    })?;

    reqwest::Certificate::from_pem(&bytes)
        .or_else(|_| reqwest::Certificate::from_der(&bytes))
        .map_err(|e| ControllerError::InvalidConfiguration(format!("Invalid certificate: {}", e)))
}

async fn expect_ok(response: Response) -> Result<(), (Option<u16>, String)> {
    if response.status() == StatusCode::OK {
        return Ok(());
    }
    Err(failure_details(response).await)
}

async fn failure_details(response: Response) -> (Option<u16>, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        format!("unexpected status {}", status)
    } else {
        body
    };
    (Some(status.as_u16()), message)
}
