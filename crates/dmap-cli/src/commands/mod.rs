pub mod external;
pub mod module;

pub use external::ExternalCommand;
pub use module::ModuleCommand;

use crate::runtime::orchestrator::DEFAULT_GRACE_PERIOD;
use crate::runtime::send_loop::DEFAULT_SEND_INTERVAL;
use anyhow::Context;
use clap::Args;
use dmap_core::{
    mask_sensitive, ControllerConfig, Credentials, TlsVerification, TrustMaterial,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
use std::time::Duration;
use tracing::info;

/// Timing options shared by both run modes
#[derive(Args, Debug, Clone)]
pub struct TimingArgs {
    /// Seconds between send cycles
    #[arg(
        long = "interval",
        env = "DMAP_SEND_INTERVAL",
        default_value_t = DEFAULT_SEND_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_secs: u64,

    /// Seconds to wait between the shutdown signal and exit
    #[arg(
        long = "grace-period",
        env = "DMAP_GRACE_PERIOD",
        default_value_t = DEFAULT_GRACE_PERIOD.as_secs()
    )]
    pub grace_period_secs: u64,

    /// Timeout in seconds for each controller API request
    #[arg(
        long = "request-timeout",
        env = "DMAP_REQUEST_TIMEOUT",
        default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs()
    )]
    pub request_timeout_secs: u64,

    /// Timeout in seconds for establishing a connection to the controller
    #[arg(
        long = "connect-timeout",
        env = "DMAP_CONNECT_TIMEOUT",
        default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs()
    )]
    pub connect_timeout_secs: u64,
}

impl TimingArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

/// Connection settings both run modes derive their controller config from
pub(crate) struct ConnectionSettings<'a> {
    pub api_url: &'a str,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_certificate: bool,
    pub trust: Option<&'a TrustMaterial>,
}

/// Build the process-wide controller configuration
pub(crate) fn controller_config(
    settings: ConnectionSettings<'_>,
    timing: &TimingArgs,
) -> anyhow::Result<ControllerConfig> {
    let verification = if settings.verify_certificate {
        TlsVerification::Enabled {
            ca_file: settings.trust.map(|t| t.path().to_path_buf()),
        }
    } else {
        TlsVerification::Disabled
    };

    let credentials = Credentials::from_parts(settings.username, settings.password);

    let config = ControllerConfig::new(settings.api_url)
        .with_context(|| format!("Invalid controller API URL '{}'", settings.api_url))?
        .with_credentials(credentials)
        .with_verification(verification)
        .with_request_timeout(Duration::from_secs(timing.request_timeout_secs))
        .with_connect_timeout(Duration::from_secs(timing.connect_timeout_secs));

    match &config.credentials {
        Some(creds) => info!(
            "Controller API {} as '{}' (password {})",
            config.base_url(),
            creds.username,
            mask_sensitive(&creds.password)
        ),
        None => info!("Controller API {} without authentication", config.base_url()),
    }
    if !config.verification.is_enabled() {
        info!("TLS certificate verification is disabled");
    }

    Ok(config)
}

/// Decode the base64 certificate handed to the process, if any
pub(crate) fn provision_trust(certificate: Option<&str>) -> anyhow::Result<Option<TrustMaterial>> {
    match certificate.map(str::trim).filter(|c| !c.is_empty()) {
        Some(encoded) => {
            let trust = TrustMaterial::provision(encoded).context("Invalid API certificate")?;
            Ok(Some(trust))
        }
        None => Ok(None),
    }
}
