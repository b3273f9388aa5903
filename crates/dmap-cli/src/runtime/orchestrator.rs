//! Startup sequencing and shutdown of a module process.
//!
//! Registration completes before the listener starts accepting and before the
//! send loop's first cycle. Once the shutdown token fires, the process exits
//! no earlier than the grace period later. Workers drain within that window
//! and are aborted if they outlast it. Webhooks are then deregistered and the
//! trust material is released.

use crate::runtime::send_loop::SendLoop;
use anyhow::Context;
use dmap_core::TrustMaterial;
use dmap_webhooks::{InboundListener, RegistrationLifecycle};
use std::fmt;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initializing,
    Registering,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Initializing => "initializing",
            LifecycleState::Registering => "registering",
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting-down",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub struct Orchestrator {
    registration: RegistrationLifecycle,
    listener: InboundListener,
    socket: TcpListener,
    send_loop: SendLoop,
    trust: Option<TrustMaterial>,
    grace_period: Duration,
    state: watch::Sender<LifecycleState>,
}

impl Orchestrator {
    /// `socket` must already be bound so the callback port is claimed before
    /// the controller learns about it
    pub fn new(
        registration: RegistrationLifecycle,
        listener: InboundListener,
        socket: TcpListener,
        send_loop: SendLoop,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Initializing);
        Self {
            registration,
            listener,
            socket,
            send_loop,
            trust: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            state,
        }
    }

    /// Trust material to release once both workers have stopped
    pub fn with_trust(mut self, trust: Option<TrustMaterial>) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let Orchestrator {
            mut registration,
            listener,
            socket,
            send_loop,
            trust,
            grace_period,
            state,
        } = self;

        let transition = |next: LifecycleState| {
            info!("Module lifecycle: {}", next);
            state.send_replace(next);
        };

        transition(LifecycleState::Registering);
        let outcome = match registration.register_all().await {
            Ok(outcome) => outcome,
            Err(e) => {
                release_trust(trust);
                transition(LifecycleState::Stopped);
                return Err(e).context("Webhook registration failed");
            }
        };
        info!(
            "Registered {} webhook(s), {} failed",
            outcome.registered, outcome.failed
        );

        transition(LifecycleState::Running);

        let mut listener_task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let result = listener.serve(socket, shutdown.clone()).await;
                if let Err(e) = &result {
                    error!("Webhook listener failed: {}", e);
                    shutdown.cancel();
                }
                result
            })
        };
        let mut loop_task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { send_loop.run(shutdown).await })
        };

        shutdown.cancelled().await;
        let deadline = Instant::now() + grace_period;
        transition(LifecycleState::ShuttingDown);

        let mut listener_failure = None;
        let drained = tokio::time::timeout_at(deadline, async {
            tokio::join!(&mut listener_task, &mut loop_task)
        })
        .await;

        match drained {
            Ok((listener_result, loop_result)) => {
                match listener_result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => listener_failure = Some(anyhow::Error::new(e)),
                    Err(e) => warn!("Webhook listener task failed: {}", e),
                }
                if let Err(e) = loop_result {
                    warn!("Send loop task failed: {}", e);
                }
            }
            Err(_) => {
                warn!(
                    "Workers did not stop within {:?}, aborting them",
                    grace_period
                );
                listener_task.abort();
                loop_task.abort();
            }
        }

        let deleted = registration.deregister_all().await;
        if deleted > 0 {
            info!("Deregistered {} webhook(s)", deleted);
        }

        release_trust(trust);

        // The grace period is observed in full, even after a fast drain
        tokio::time::sleep_until(deadline).await;
        transition(LifecycleState::Stopped);

        match listener_failure {
            Some(e) => Err(e.context("Webhook listener stopped unexpectedly")),
            None => Ok(()),
        }
    }
}

fn release_trust(trust: Option<TrustMaterial>) {
    if let Some(trust) = trust {
        trust.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::send_loop::StatusCycle;
    use dmap_client::{ControllerApi, ControllerClient};
    use dmap_core::{ControllerConfig, WebhookEventType};
    use dmap_webhooks::{ChannelObserver, RegistrationPolicy, WebhookSubscription};
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> Arc<dyn ControllerApi> {
        let config = ControllerConfig::new(server.uri()).unwrap();
        Arc::new(ControllerClient::new(&config).unwrap())
    }

    async fn mount_controller(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"ID": "wh-1"})),
            )
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/endpoint"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/controller/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/webhook"))
            .and(query_param("id", "wh-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn wait_for_requests(server: &MockServer, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if server.received_requests().await.unwrap().len() >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("controller calls not observed");
    }

    #[tokio::test]
    async fn test_registers_before_first_cycle_and_cleans_up() {
        let server = MockServer::start().await;
        mount_controller(&server).await;
        let api = client(&server);

        let subs = vec![WebhookSubscription::path(
            "/webhook3",
            WebhookEventType::EndpointData,
        )];
        let (observer, mut events) = ChannelObserver::new(4);
        let listener = InboundListener::for_subscriptions(&subs, Arc::new(observer));
        let socket = InboundListener::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let orchestrator = Orchestrator::new(
            RegistrationLifecycle::new(api.clone(), subs, RegistrationPolicy::BestEffort),
            listener,
            socket,
            SendLoop::new(Arc::new(StatusCycle::new(api)), Duration::from_secs(3600)),
        )
        .with_grace_period(Duration::from_millis(200));
        let mut state = orchestrator.subscribe();

        let shutdown = CancellationToken::new();
        let run = tokio::spawn(orchestrator.run(shutdown.clone()));

        state
            .wait_for(|s| *s == LifecycleState::Running)
            .await
            .unwrap();
        wait_for_requests(&server, 3).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/webhook3", addr))
            .json(&serde_json::json!({"blob": "aGVsbG8="}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(events.recv().await.unwrap().text(), "hello");

        shutdown.cancel();
        run.await.unwrap().unwrap();
        assert_eq!(*state.borrow(), LifecycleState::Stopped);

        let requests = server.received_requests().await.unwrap();
        let calls: Vec<(String, String)> = requests
            .iter()
            .map(|r| (r.method.to_string(), r.url.path().to_string()))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("POST".to_string(), "/webhook".to_string()),
                ("GET".to_string(), "/endpoint".to_string()),
                ("POST".to_string(), "/controller/push".to_string()),
                ("DELETE".to_string(), "/webhook".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_required_registration_failure_stops_before_sending() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webhook"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/endpoint"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let api = client(&server);
        let sub = WebhookSubscription::callback_url(
            "http://127.0.0.1:3358/webhook",
            Some("mod-1".to_string()),
        )
        .unwrap();
        let (observer, _events) = ChannelObserver::new(1);
        let listener = InboundListener::for_subscriptions(
            std::slice::from_ref(&sub),
            Arc::new(observer),
        );
        let socket = InboundListener::bind("127.0.0.1:0").await.unwrap();

        let trust = TrustMaterial::from_bytes(b"certificate").unwrap();
        let trust_path = trust.path().to_path_buf();

        let orchestrator = Orchestrator::new(
            RegistrationLifecycle::new(api.clone(), vec![sub], RegistrationPolicy::Required),
            listener,
            socket,
            SendLoop::new(Arc::new(StatusCycle::new(api)), Duration::from_secs(3600)),
        )
        .with_trust(Some(trust));
        let state = orchestrator.subscribe();

        let result = orchestrator.run(CancellationToken::new()).await;

        assert!(result.is_err());
        assert_eq!(*state.borrow(), LifecycleState::Stopped);
        assert!(!trust_path.exists());
    }

    #[tokio::test]
    async fn test_listener_drains_on_shutdown() {
        let server = MockServer::start().await;
        mount_controller(&server).await;
        let api = client(&server);

        let subs = vec![WebhookSubscription::path(
            "/webhook1",
            WebhookEventType::ControllerData,
        )];
        let (observer, _events) = ChannelObserver::new(4);
        let listener = InboundListener::for_subscriptions(&subs, Arc::new(observer));
        let socket = InboundListener::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let orchestrator = Orchestrator::new(
            RegistrationLifecycle::new(api.clone(), subs, RegistrationPolicy::Required),
            listener,
            socket,
            SendLoop::new(Arc::new(StatusCycle::new(api)), Duration::from_secs(3600)),
        )
        .with_grace_period(Duration::from_millis(200));
        let mut state = orchestrator.subscribe();

        let shutdown = CancellationToken::new();
        let run = tokio::spawn(orchestrator.run(shutdown.clone()));
        state
            .wait_for(|s| *s == LifecycleState::Running)
            .await
            .unwrap();

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("orchestrator did not stop")
            .unwrap()
            .unwrap();

        assert!(reqwest::Client::new()
            .post(format!("http://{}/webhook1", addr))
            .body(r#"{"blob":"aGk="}"#)
            .send()
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_grace_period_is_observed_before_stopping() {
        let server = MockServer::start().await;
        mount_controller(&server).await;
        let api = client(&server);

        let subs = vec![WebhookSubscription::path(
            "/webhook1",
            WebhookEventType::ControllerData,
        )];
        let (observer, _events) = ChannelObserver::new(1);
        let listener = InboundListener::for_subscriptions(&subs, Arc::new(observer));
        let socket = InboundListener::bind("127.0.0.1:0").await.unwrap();

        let grace = Duration::from_millis(500);
        let orchestrator = Orchestrator::new(
            RegistrationLifecycle::new(api.clone(), subs, RegistrationPolicy::Required),
            listener,
            socket,
            SendLoop::new(Arc::new(StatusCycle::new(api)), Duration::from_secs(3600)),
        )
        .with_grace_period(grace);
        let mut state = orchestrator.subscribe();

        let shutdown = CancellationToken::new();
        let run = tokio::spawn(orchestrator.run(shutdown.clone()));
        state
            .wait_for(|s| *s == LifecycleState::Running)
            .await
            .unwrap();

        // Both workers stop immediately, the process still waits out the grace period
        let cancelled_at = Instant::now();
        shutdown.cancel();
        state
            .wait_for(|s| *s == LifecycleState::ShuttingDown)
            .await
            .unwrap();

        run.await.unwrap().unwrap();
        assert!(cancelled_at.elapsed() >= grace);
        assert_eq!(*state.borrow(), LifecycleState::Stopped);
    }
}
