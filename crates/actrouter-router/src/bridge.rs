//! Connects inbound event sources to a router.
//!
//! Two kinds of source feed the same mailbox: named channels on a
//! [`ChannelHub`] and an in-process [`SimulatedSource`]. Each attached
//! source runs its own forwarding task and is detached through the
//! [`Subscription`] returned for it.

use actrouter_core::ActivityEvent;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::ChannelHub;
use crate::error::BridgeError;
use crate::router::RouterHandle;

/// Buffered payloads for a simulated source.
pub const SIMULATED_SOURCE_CAPACITY: usize = 64;

pub struct SubscriptionBridge {
    router: RouterHandle,
    cancel: CancellationToken,
}

impl SubscriptionBridge {
    pub fn new(router: RouterHandle) -> Self {
        Self::with_cancel(router, CancellationToken::new())
    }

    /// Bridge whose subscriptions all end when `cancel` fires.
    pub fn with_cancel(router: RouterHandle, cancel: CancellationToken) -> Self {
        Self { router, cancel }
    }

    pub fn router(&self) -> &RouterHandle {
        &self.router
    }

    /// Listen on `name` and forward every payload to the router.
    ///
    /// Attach failure is logged and leaves the router without this source.
    pub fn attach_channel(&self, hub: &ChannelHub, name: &str) -> Option<Subscription> {
        match self.try_attach_channel(hub, name) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(channel = %name, error = %e, "failed to subscribe to activity channel");
                None
            }
        }
    }

    pub fn try_attach_channel(&self, hub: &ChannelHub, name: &str) -> Result<Subscription, BridgeError> {
        let rx = hub.listen(name)?;
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(forward_channel(
            name.to_owned(),
            rx,
            self.router.clone(),
            cancel.clone(),
        ));
        info!(channel = %name, "subscribed to activity channel");
        Ok(Subscription {
            name: name.to_owned(),
            cancel,
            task: Some(task),
        })
    }

    /// Open an in-process source whose payloads are handled exactly like
    /// channel payloads.
    pub fn attach_simulated(&self) -> (SimulatedSource, Subscription) {
        let (tx, rx) = mpsc::channel(SIMULATED_SOURCE_CAPACITY);
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(forward_simulated(rx, self.router.clone(), cancel.clone()));
        debug!("simulated activity source attached");
        let subscription = Subscription {
            name: "simulated".to_owned(),
            cancel,
            task: Some(task),
        };
        (SimulatedSource { tx }, subscription)
    }

    /// Detach every subscription made through this bridge.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn forward_channel(
    name: String,
    mut rx: broadcast::Receiver<serde_json::Value>,
    router: RouterHandle,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(channel = %name, "unsubscribed");
                break;
            }
            msg = rx.recv() => {
                match msg {
                    Ok(payload) => {
                        if router.dispatch_payload(payload).await.is_err() {
                            debug!(channel = %name, "router stopped, dropping subscription");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %name, skipped, "activity listener lagged, events lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(channel = %name, "activity channel closed");
                        break;
                    }
                }
            }
        }
    }
}

async fn forward_simulated(
    mut rx: mpsc::Receiver<serde_json::Value>,
    router: RouterHandle,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = rx.recv() => {
                let Some(payload) = msg else { break };
                if router.dispatch_payload(payload).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("simulated activity source detached");
}

// ─── Subscription ────────────────────────────────────────────────

/// Live attachment of one source. Dropping it detaches the source.
#[derive(Debug)]
pub struct Subscription {
    name: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Detach and wait for the forwarding task to finish.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─── Simulated Source ────────────────────────────────────────────

/// Producer end of an in-process source.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    tx: mpsc::Sender<serde_json::Value>,
}

impl SimulatedSource {
    pub async fn inject(&self, payload: serde_json::Value) -> Result<(), BridgeError> {
        self.tx
            .send(payload)
            .await
            .map_err(|_| BridgeError::SourceClosed)
    }

    pub async fn inject_event(&self, event: &ActivityEvent) -> Result<(), BridgeError> {
        let payload = serde_json::to_value(event)?;
        self.inject(payload).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
