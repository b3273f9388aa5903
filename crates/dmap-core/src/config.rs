//! Controller connection configuration
//!
//! Built once at startup from the parsed command line and shared read-only by
//! every outbound call.

use crate::error::{CoreError, CoreResult};
use crate::utils::mask_sensitive;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Basic authentication credentials for the controller API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build credentials only when both halves are present
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) => Some(Self { username, password }),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &mask_sensitive(&self.password))
            .finish()
    }
}

/// TLS verification policy for controller calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Accept any certificate the controller presents (development posture)
    #[default]
    Disabled,
    /// Verify the controller, optionally trusting an extra CA file
    Enabled { ca_file: Option<PathBuf> },
}

impl TlsVerification {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

/// Immutable controller connection settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    base_url: String,
    pub credentials: Option<Credentials>,
    pub verification: TlsVerification,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl ControllerConfig {
    /// Create a configuration for the given API base URL.
    ///
    /// The URL must be absolute http(s); a trailing slash is dropped so paths
    /// can be appended uniformly.
    pub fn new(base_url: impl AsRef<str>) -> CoreResult<Self> {
        let raw = base_url.as_ref().trim();
        let parsed = Url::parse(raw)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::InvalidConfiguration {
                message: format!("unsupported URL scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            base_url: raw.trim_end_matches('/').to_string(),
            credentials: None,
            verification: TlsVerification::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("dmap-module/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_verification(mut self, verification: TlsVerification) -> Self {
        self.verification = verification;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
