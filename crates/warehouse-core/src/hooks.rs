//! Release hook dispatch.
//!
//! After a head change commits, every hook URL registered for the object
//! receives a JSON [`ReleaseEvent`] by POST. Delivery is fire-and-forget:
//! the dispatch runs on a detached task and failures are logged, never
//! returned to the operation that triggered them. Subscribers are notified
//! concurrently and independently.
//!
//! Short-lived processes call [`HookDispatcher::drain`] before exiting so
//! detached deliveries are not cut off with the runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::release::ReleaseEvent;
use crate::ledger::Ledger;
use crate::obs;

/// Errors from a single hook delivery.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("subscriber answered with status {status}")]
    Status { status: u16 },
}

/// Outbound transport for hook notifications.
#[async_trait]
pub trait HookTransport: Send + Sync {
    async fn post(&self, url: &str, event: &ReleaseEvent) -> Result<(), HookError>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestHookTransport {
    client: reqwest::Client,
}

impl ReqwestHookTransport {
    pub fn new(timeout: Duration) -> Result<Self, HookError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("warehouse/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| HookError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HookTransport for ReqwestHookTransport {
    async fn post(&self, url: &str, event: &ReleaseEvent) -> Result<(), HookError> {
        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| HookError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HookError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Receiver of committed head changes.
///
/// `notify` must return immediately; any delivery work happens in the
/// background.
pub trait ReleaseNotifier: Send + Sync {
    fn notify(&self, name: &str, event: ReleaseEvent);
}

/// Notifier that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ReleaseNotifier for NoopNotifier {
    fn notify(&self, _name: &str, _event: ReleaseEvent) {}
}

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Count of detached dispatches still running.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when a dispatch task ends, including by
/// panic or abort.
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(in_flight.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Fans release events out to an object's hook URLs.
///
/// Clones share the same in-flight tracking.
#[derive(Clone)]
pub struct HookDispatcher {
    ledger: Ledger,
    transport: Arc<dyn HookTransport>,
    in_flight: Arc<InFlight>,
}

impl HookDispatcher {
    pub fn new(ledger: Ledger, transport: Arc<dyn HookTransport>) -> Self {
        Self {
            ledger,
            transport,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Deliver `event` to every hook of `name` and wait for all deliveries.
    pub async fn dispatch(&self, name: &str, event: &ReleaseEvent) -> DispatchReport {
        let hooks = match self.ledger.hooks(name).await {
            Ok(hooks) => hooks,
            Err(e) => {
                warn!(object = %name, error = %e, "failed to load hooks");
                return DispatchReport::default();
            }
        };
        debug!(object = %name, hooks = hooks.len(), "dispatching release event");

        let deliveries = hooks.iter().map(|hook| async move {
            match self.transport.post(&hook.url, event).await {
                Ok(()) => {
                    obs::emit_hook_delivered(name, &hook.url);
                    true
                }
                Err(e) => {
                    obs::emit_hook_failed(name, &hook.url, &e);
                    false
                }
            }
        });

        let results = join_all(deliveries).await;
        let delivered = results.iter().filter(|ok| **ok).count();
        DispatchReport {
            delivered,
            failed: results.len() - delivered,
        }
    }

    /// Run [`dispatch`](Self::dispatch) on a detached task.
    ///
    /// Returns `None` when called outside a Tokio runtime; the event is
    /// dropped with a warning.
    pub fn spawn(&self, name: &str, event: ReleaseEvent) -> Option<JoinHandle<DispatchReport>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(object = %name, "no async runtime; release event dropped");
                return None;
            }
        };

        let guard = InFlightGuard::enter(&self.in_flight);
        let dispatcher = self.clone();
        let name = name.to_string();
        Some(handle.spawn(async move {
            let _guard = guard;
            dispatcher.dispatch(&name, &event).await
        }))
    }

    /// Number of detached dispatches that have not finished.
    pub fn pending(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every detached dispatch has finished.
    ///
    /// Dispatches spawned while waiting are waited for too. Callers bound
    /// the wait with `tokio::time::timeout`.
    pub async fn drain(&self) {
        loop {
            // Registered before the check so a wakeup in between is not lost.
            let idle = self.in_flight.idle.notified();
            if self.pending() == 0 {
                return;
            }
            debug!(pending = self.pending(), "waiting for hook dispatches");
            idle.await;
        }
    }
}

impl ReleaseNotifier for HookDispatcher {
    fn notify(&self, name: &str, event: ReleaseEvent) {
        let _ = self.spawn(name, event);
    }
}
