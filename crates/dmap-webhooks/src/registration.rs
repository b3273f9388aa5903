//! Registration lifecycle of webhook subscriptions.
//!
//! Subscriptions are registered one at a time, in declaration order, before
//! the module sends anything. On shutdown every subscription that obtained an
//! identifier is deleted once; failures are logged and never retried.

use crate::error::WebhookError;
use crate::events::WebhookSubscription;
use dmap_client::ControllerApi;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happens when a registration is rejected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationPolicy {
    /// Any failure aborts startup
    Required,
    /// Failures are logged and the remaining subscriptions are still registered
    #[default]
    BestEffort,
}

/// Result of registering all subscriptions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub registered: usize,
    pub failed: usize,
}

pub struct RegistrationLifecycle {
    api: Arc<dyn ControllerApi>,
    subscriptions: Vec<WebhookSubscription>,
    policy: RegistrationPolicy,
    deregister_on_shutdown: bool,
}

impl RegistrationLifecycle {
    pub fn new(
        api: Arc<dyn ControllerApi>,
        subscriptions: Vec<WebhookSubscription>,
        policy: RegistrationPolicy,
    ) -> Self {
        Self {
            api,
            subscriptions,
            policy,
            deregister_on_shutdown: true,
        }
    }

    pub fn deregister_on_shutdown(mut self, enabled: bool) -> Self {
        self.deregister_on_shutdown = enabled;
        self
    }

    pub fn subscriptions(&self) -> &[WebhookSubscription] {
        &self.subscriptions
    }

    /// Register every subscription that has no identifier yet
    pub async fn register_all(&mut self) -> Result<RegistrationOutcome, WebhookError> {
        let mut outcome = RegistrationOutcome::default();

        for sub in self.subscriptions.iter_mut() {
            if sub.is_registered() {
                continue;
            }

            match self.api.register_webhook(&sub.registration_request()).await {
                Ok(id) => {
                    info!(webhook_id = %id, "Registered webhook {}", sub);
                    sub.mark_registered(id);
                    outcome.registered += 1;
                }
                Err(e) => match self.policy {
                    RegistrationPolicy::Required => {
                        error!("Failed to register webhook {}: {}", sub, e);
                        return Err(WebhookError::RegistrationRequired {
                            target: sub.to_string(),
                            source: e,
                        });
                    }
                    RegistrationPolicy::BestEffort => {
                        warn!("Failed to register webhook {}: {}", sub, e);
                        outcome.failed += 1;
                    }
                },
            }
        }

        Ok(outcome)
    }

    /// Delete every registered subscription. Returns how many deletions were
    /// accepted by the controller.
    pub async fn deregister_all(&mut self) -> usize {
        if !self.deregister_on_shutdown {
            info!("Skipping webhook deregistration");
            return 0;
        }

        let mut deleted = 0;
        for sub in self.subscriptions.iter_mut() {
            let Some(id) = sub.id().map(str::to_string) else {
                continue;
            };

            match self.api.delete_webhook(&id).await {
                Ok(()) => {
                    info!(webhook_id = %id, "Deleted webhook {}", sub);
                    deleted += 1;
                }
                Err(e) => {
                    warn!(webhook_id = %id, "Failed to delete webhook {}: {}", sub, e);
                }
            }
            sub.clear_registration();
        }
        deleted
    }
}
