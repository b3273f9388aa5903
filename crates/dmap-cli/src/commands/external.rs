//! `dmap-module external`: the single-webhook external handler

use super::{controller_config, provision_trust, ConnectionSettings, TimingArgs};
use crate::runtime::send_loop::DEFAULT_MODULE_MESSAGE;
use crate::runtime::{shutdown, ModuleSendCycle, Orchestrator, SendLoop};
use clap::builder::FalseyValueParser;
use clap::Args;
use dmap_client::{ControllerApi, ControllerClient};
use dmap_webhooks::{
    AckStyle, InboundListener, LoggingObserver, RegistrationLifecycle, RegistrationPolicy,
    WebhookSubscription,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const DEFAULT_API_URL: &str = "https://localhost:6969/api/v1";
pub const DEFAULT_WEBHOOK_PORT: u16 = 3358;

#[derive(Args, Debug)]
pub struct ExternalCommand {
    /// Module to exchange data with
    module_id: String,

    /// Base URL of the controller API
    #[arg(long, alias = "api_url", env = "DMAP_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Address the controller should call back on (IP or hostname)
    #[arg(long, alias = "advertised_address", env = "DMAP_ADVERTISED_ADDRESS")]
    advertised_address: String,

    /// Port the controller should call back on
    #[arg(
        long,
        alias = "advertised_port",
        env = "DMAP_ADVERTISED_PORT",
        default_value_t = DEFAULT_WEBHOOK_PORT
    )]
    advertised_port: u16,

    /// Address the webhook listener binds to (defaults to the advertised address)
    #[arg(long, env = "DMAP_LISTEN_HOST")]
    listen_host: Option<String>,

    /// Basic authentication username
    #[arg(long, env = "DMAP_API_USERNAME")]
    username: Option<String>,

    /// Basic authentication password
    #[arg(long, env = "DMAP_API_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Base64-encoded controller certificate
    #[arg(long, env = "DMAP_API_CERTIFICATE", hide_env_values = true)]
    certificate: Option<String>,

    /// Verify the controller certificate
    #[arg(
        long,
        env = "DMAP_VERIFY_CERTIFICATE",
        value_parser = FalseyValueParser::new()
    )]
    verify_certificate: bool,

    /// Message sent to the module every cycle
    #[arg(long, default_value = DEFAULT_MODULE_MESSAGE)]
    message: String,

    #[command(flatten)]
    timing: TimingArgs,
}

impl ExternalCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    fn callback_url(&self) -> String {
        format!(
            "http://{}:{}/webhook",
            self.advertised_address, self.advertised_port
        )
    }

    fn listen_addr(&self) -> String {
        let host = self
            .listen_host
            .as_deref()
            .unwrap_or(&self.advertised_address);
        format!("{}:{}", host, self.advertised_port)
    }

    async fn run(self) -> anyhow::Result<()> {
        let trust = provision_trust(self.certificate.as_deref())?;
        let config = controller_config(
            ConnectionSettings {
                api_url: &self.api_url,
                username: self.username.clone(),
                password: self.password.clone(),
                verify_certificate: self.verify_certificate,
                trust: trust.as_ref(),
            },
            &self.timing,
        )?;
        let api: Arc<dyn ControllerApi> = Arc::new(ControllerClient::new(&config)?);

        let subscription =
            WebhookSubscription::callback_url(self.callback_url(), Some(self.module_id.clone()))?;
        info!(
            module_id = %self.module_id,
            "Declared webhook {}",
            subscription
        );

        let socket = InboundListener::bind(&self.listen_addr()).await?;
        let listener = InboundListener::for_subscriptions(
            std::slice::from_ref(&subscription),
            Arc::new(LoggingObserver),
        )
        .with_ack_style(AckStyle::Empty);

        let registration = RegistrationLifecycle::new(
            api.clone(),
            vec![subscription],
            RegistrationPolicy::Required,
        );

        let cycle =
            ModuleSendCycle::new(api, self.module_id).with_message(self.message.into_bytes());

        let shutdown_token = CancellationToken::new();
        shutdown::cancel_on_signal(shutdown_token.clone());

        Orchestrator::new(
            registration,
            listener,
            socket,
            SendLoop::new(Arc::new(cycle), self.timing.interval()),
        )
        .with_trust(trust)
        .with_grace_period(self.timing.grace_period())
        .run(shutdown_token)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        external: ExternalCommand,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["test", "mod-1", "--advertised-address", "10.0.0.5"])
            .unwrap();
        let cmd = cli.external;

        assert_eq!(cmd.module_id, "mod-1");
        assert_eq!(cmd.api_url, DEFAULT_API_URL);
        assert_eq!(cmd.callback_url(), "http://10.0.0.5:3358/webhook");
        assert_eq!(cmd.listen_addr(), "10.0.0.5:3358");
        assert_eq!(cmd.message, DEFAULT_MODULE_MESSAGE);
    }

    #[test]
    fn test_underscore_aliases_and_listen_host() {
        let cli = TestCli::try_parse_from([
            "test",
            "mod-1",
            "--api_url",
            "https://controller:6969/api/v1",
            "--advertised_address",
            "module.local",
            "--advertised_port",
            "4000",
            "--listen-host",
            "0.0.0.0",
        ])
        .unwrap();
        let cmd = cli.external;

        assert_eq!(cmd.api_url, "https://controller:6969/api/v1");
        assert_eq!(cmd.callback_url(), "http://module.local:4000/webhook");
        assert_eq!(cmd.listen_addr(), "0.0.0.0:4000");
    }

    #[test]
    fn test_certificate_verification_env_values() {
        let args = ["test", "mod-1", "--advertised-address", "10.0.0.5"];
        for (value, expected) in [("1", true), ("yes", true), ("TRUE", true), ("0", false)] {
            std::env::set_var("DMAP_VERIFY_CERTIFICATE", value);
            let cli = TestCli::try_parse_from(args).unwrap();
            assert_eq!(cli.external.verify_certificate, expected, "value {}", value);
        }
        std::env::remove_var("DMAP_VERIFY_CERTIFICATE");
    }

    #[test]
    fn test_advertised_address_is_required() {
        assert!(TestCli::try_parse_from(["test", "mod-1"]).is_err());
    }
}
