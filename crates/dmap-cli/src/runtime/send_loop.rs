//! Periodic outbound send cycle.
//!
//! A cycle is never interrupted once started. Cancellation is only observed
//! before a cycle begins and while sleeping between cycles.

use async_trait::async_trait;
use dmap_client::ControllerApi;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(15);

pub const DEFAULT_ENDPOINT_MESSAGE: &str = "hey there, this is module";
pub const DEFAULT_CONTROLLER_MESSAGE: &str = "hi controller, this is module";
pub const DEFAULT_RECEIVER_ID: &str = "controller";
pub const DEFAULT_MODULE_MESSAGE: &str = "hello world, I'm from outside";

/// Outcome of a single send cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub endpoints: usize,
    pub endpoint_pushes_ok: usize,
    pub endpoint_pushes_failed: usize,
    /// Whether the push to the controller (or module) was accepted
    pub upstream_ok: bool,
}

#[async_trait]
pub trait SendCycle: Send + Sync {
    /// Run one cycle. Failures are logged and reflected in the report.
    async fn run_cycle(&self) -> CycleReport;
}

/// Discover endpoints, push a status message to each, then push a status
/// message to the controller
pub struct StatusCycle {
    api: Arc<dyn ControllerApi>,
    endpoint_message: Vec<u8>,
    controller_message: Vec<u8>,
    receiver_id: String,
}

impl StatusCycle {
    pub fn new(api: Arc<dyn ControllerApi>) -> Self {
        Self {
            api,
            endpoint_message: DEFAULT_ENDPOINT_MESSAGE.as_bytes().to_vec(),
            controller_message: DEFAULT_CONTROLLER_MESSAGE.as_bytes().to_vec(),
            receiver_id: DEFAULT_RECEIVER_ID.to_string(),
        }
    }

    pub fn with_endpoint_message(mut self, message: impl Into<Vec<u8>>) -> Self {
        self.endpoint_message = message.into();
        self
    }

    pub fn with_controller_message(
        mut self,
        receiver_id: impl Into<String>,
        message: impl Into<Vec<u8>>,
    ) -> Self {
        self.receiver_id = receiver_id.into();
        self.controller_message = message.into();
        self
    }
}

#[async_trait]
impl SendCycle for StatusCycle {
    async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        match self.api.list_endpoints().await {
            Ok(endpoints) => {
                report.endpoints = endpoints.len();
                debug!("Discovered {} endpoint(s)", endpoints.len());

                for endpoint in &endpoints {
                    match self
                        .api
                        .push_to_endpoint(&endpoint.id, &self.endpoint_message)
                        .await
                    {
                        Ok(()) => {
                            info!(endpoint_id = %endpoint.id, "Pushed message to endpoint");
                            report.endpoint_pushes_ok += 1;
                        }
                        Err(e) => {
                            warn!(endpoint_id = %endpoint.id, "Failed to push to endpoint: {}", e);
                            report.endpoint_pushes_failed += 1;
                        }
                    }
                }
            }
            Err(e) => warn!("Failed to list endpoints: {}", e),
        }

        match self
            .api
            .push_to_controller(&self.receiver_id, &self.controller_message)
            .await
        {
            Ok(()) => {
                info!(receiver_id = %self.receiver_id, "Pushed message to controller");
                report.upstream_ok = true;
            }
            Err(e) => warn!(receiver_id = %self.receiver_id, "Failed to push to controller: {}", e),
        }

        report
    }
}

/// Send a message to one module through the controller
pub struct ModuleSendCycle {
    api: Arc<dyn ControllerApi>,
    module_id: String,
    message: Vec<u8>,
}

impl ModuleSendCycle {
    pub fn new(api: Arc<dyn ControllerApi>, module_id: impl Into<String>) -> Self {
        Self {
            api,
            module_id: module_id.into(),
            message: DEFAULT_MODULE_MESSAGE.as_bytes().to_vec(),
        }
    }

    pub fn with_message(mut self, message: impl Into<Vec<u8>>) -> Self {
        self.message = message.into();
        self
    }
}

#[async_trait]
impl SendCycle for ModuleSendCycle {
    async fn run_cycle(&self) -> CycleReport {
        let upstream_ok = match self.api.send_to_module(&self.module_id, &self.message).await {
            Ok(()) => {
                info!(module_id = %self.module_id, "Sent data to module");
                true
            }
            Err(e) => {
                warn!(module_id = %self.module_id, "Failed to send data to module: {}", e);
                false
            }
        };

        CycleReport {
            upstream_ok,
            ..Default::default()
        }
    }
}

/// Runs a send cycle on a fixed interval until cancelled
pub struct SendLoop {
    cycle: Arc<dyn SendCycle>,
    interval: Duration,
}

impl SendLoop {
    pub fn new(cycle: Arc<dyn SendCycle>, interval: Duration) -> Self {
        Self { cycle, interval }
    }

    /// Returns the number of cycles that ran
    pub async fn run(&self, shutdown: CancellationToken) -> usize {
        info!("Send loop started (interval {:?})", self.interval);
        let mut cycles = 0;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let report = self.cycle.run_cycle().await;
            cycles += 1;
            debug!(
                cycle = cycles,
                endpoints = report.endpoints,
                pushed = report.endpoint_pushes_ok,
                failed = report.endpoint_pushes_failed,
                upstream_ok = report.upstream_ok,
                "Send cycle completed"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Send loop stopped after {} cycle(s)", cycles);
        cycles
    }
}
