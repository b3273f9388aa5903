//! `dmap-module module`: the many-webhook module

use super::{controller_config, provision_trust, ConnectionSettings, TimingArgs};
use crate::runtime::send_loop::{
    DEFAULT_CONTROLLER_MESSAGE, DEFAULT_ENDPOINT_MESSAGE, DEFAULT_RECEIVER_ID,
};
use crate::runtime::{shutdown, Orchestrator, SendLoop, StatusCycle};
use clap::builder::FalseyValueParser;
use clap::Args;
use dmap_client::{ControllerApi, ControllerClient};
use dmap_webhooks::{
    AckStyle, InboundListener, LoggingObserver, RegistrationLifecycle, RegistrationPolicy,
    WebhookEventType, WebhookSubscription,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A `PATH=EVENT` webhook declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookDeclaration {
    pub path: String,
    pub event: WebhookEventType,
}

impl std::str::FromStr for WebhookDeclaration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, event) = s
            .split_once('=')
            .ok_or_else(|| format!("expected PATH=EVENT, got '{}'", s))?;
        let path = path.trim();
        if path.is_empty() {
            return Err("webhook path must not be empty".to_string());
        }
        if path.contains([':', '*', '{', '}']) {
            return Err(format!(
                "webhook path '{}' must not contain ':', '*', '{{' or '}}'",
                path
            ));
        }
        Ok(Self {
            path: path.to_string(),
            event: event.parse()?,
        })
    }
}

fn default_webhooks() -> Vec<WebhookDeclaration> {
    [
        ("/webhook1", WebhookEventType::ControllerData),
        ("/webhook2", WebhookEventType::ControllerData),
        ("/webhook3", WebhookEventType::EndpointData),
        ("/webhook4", WebhookEventType::EndpointData),
    ]
    .into_iter()
    .map(|(path, event)| WebhookDeclaration {
        path: path.to_string(),
        event,
    })
    .collect()
}

#[derive(Args, Debug)]
pub struct ModuleCommand {
    /// Base URL of the controller API
    #[arg(long, env = "MODULE_API_BASE_URL")]
    api_url: String,

    /// Basic authentication username
    #[arg(long, env = "MODULE_API_BASEAUTH_USER")]
    username: Option<String>,

    /// Basic authentication password
    #[arg(long, env = "MODULE_API_BASEAUTH_PASS", hide_env_values = true)]
    password: Option<String>,

    /// Base64-encoded controller certificate
    #[arg(long, env = "MODULE_API_CERTIFICATE", hide_env_values = true)]
    certificate: Option<String>,

    /// Verify the controller certificate (development setups leave this off)
    #[arg(
        long,
        env = "VERIFY_CERTIFICATE",
        value_parser = FalseyValueParser::new()
    )]
    verify_certificate: bool,

    /// Port the webhook listener binds to
    #[arg(long, env = "MODULE_GIVEN_PORT")]
    port: u16,

    /// Address the webhook listener binds to
    #[arg(long, env = "MODULE_LISTEN_HOST", default_value = "0.0.0.0")]
    listen_host: String,

    /// Webhook to register as PATH=EVENT (repeatable). Defaults to
    /// /webhook1,/webhook2 for CONTROLLER_DATA and /webhook3,/webhook4 for
    /// ENDPOINT_DATA.
    #[arg(long = "webhook", value_name = "PATH=EVENT")]
    webhooks: Vec<WebhookDeclaration>,

    /// Delete registered webhooks on shutdown
    #[arg(
        long,
        env = "MODULE_DEREGISTER_ON_SHUTDOWN",
        value_parser = FalseyValueParser::new()
    )]
    deregister_on_shutdown: bool,

    /// Receiver of the controller status message
    #[arg(long, default_value = DEFAULT_RECEIVER_ID)]
    receiver_id: String,

    /// Message pushed to every discovered endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT_MESSAGE)]
    endpoint_message: String,

    /// Message pushed to the controller
    #[arg(long, default_value = DEFAULT_CONTROLLER_MESSAGE)]
    controller_message: String,

    #[command(flatten)]
    timing: TimingArgs,
}

impl ModuleCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    fn subscriptions(&self) -> Vec<WebhookSubscription> {
        let declarations = if self.webhooks.is_empty() {
            default_webhooks()
        } else {
            self.webhooks.clone()
        };
        declarations
            .iter()
            .map(|decl| WebhookSubscription::path(&decl.path, decl.event))
            .collect()
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

        let subscriptions = self.subscriptions();
        for sub in &subscriptions {
            info!("Declared webhook {}", sub);
        }

        let listen_addr = format!("{}:{}", self.listen_host, self.port);
        let socket = InboundListener::bind(&listen_addr).await?;
        let listener =
            InboundListener::for_subscriptions(&subscriptions, Arc::new(LoggingObserver))
                .with_ack_style(AckStyle::Json);

        let registration = RegistrationLifecycle::new(
            api.clone(),
            subscriptions,
            RegistrationPolicy::BestEffort,
        )
        .deregister_on_shutdown(self.deregister_on_shutdown);

        let cycle = StatusCycle::new(api)
            .with_endpoint_message(self.endpoint_message.into_bytes())
            .with_controller_message(self.receiver_id, self.controller_message.into_bytes());

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
