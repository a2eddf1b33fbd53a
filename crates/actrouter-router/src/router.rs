//! The activity router actor.
//!
//! One task owns every surface, the location map and the timer registry.
//! Inbound payloads, control requests and fired timers all arrive through
//! the same mailbox and are applied in order, so surface state needs no
//! locks. Readers get immutable snapshots through a watch channel or an
//! on-demand request.

use std::collections::BTreeMap;
use std::time::Duration;

use actrouter_core::{
    ActivityEvent, Decoded, Deferred, DeferredAction, Location, LocationMap, RouterConfig,
    RouterSnapshot, SurfaceMachine, SurfaceSnapshot, TimerId, decode_payload, resolve,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RouterError;
use crate::timers::TimerRegistry;

/// Mailbox depth. Producers wait when the router falls this far behind.
pub const MAILBOX_CAPACITY: usize = 256;

#[derive(Debug)]
pub(crate) enum RouterMsg {
    /// Raw payload from a channel or the simulated source.
    Inbound(serde_json::Value),
    /// Already-decoded event.
    Event(ActivityEvent),
    Clear {
        ack: oneshot::Sender<()>,
    },
    Timer {
        location: Location,
        timer: TimerId,
        action: DeferredAction,
    },
    Snapshot {
        reply: oneshot::Sender<RouterSnapshot>,
    },
    StartTitle {
        location: Location,
        activity_id: String,
        reply: oneshot::Sender<Option<String>>,
    },
}

/// What a handled message changed, and so which part of the published
/// snapshot needs rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Touched {
    Nothing,
    Surface(Location),
    Everything,
}

pub struct ActivityRouter {
    config: RouterConfig,
    surfaces: BTreeMap<Location, SurfaceMachine>,
    locations: LocationMap,
    timers: TimerRegistry,
    mailbox: mpsc::Receiver<RouterMsg>,
    /// Timers post back through this; it never keeps the mailbox open.
    loopback: mpsc::WeakSender<RouterMsg>,
    snapshot_tx: watch::Sender<RouterSnapshot>,
    started: Instant,
    /// Ids handed to raw events built from malformed payloads. Counts down
    /// from `u64::MAX` so they sort after anything a producer sends.
    next_raw_id: u64,
    cancel: CancellationToken,
}

impl ActivityRouter {
    pub fn new(config: RouterConfig) -> (Self, RouterHandle) {
        Self::with_cancel(config, CancellationToken::new())
    }

    /// Router that also stops when `cancel` fires.
    pub fn with_cancel(config: RouterConfig, cancel: CancellationToken) -> (Self, RouterHandle) {
        let (tx, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(RouterSnapshot::default());
        let surfaces = Location::ALL
            .into_iter()
            .map(|location| (location, SurfaceMachine::new(location, config)))
            .collect();
        let router = Self {
            config,
            surfaces,
            locations: LocationMap::new(),
            timers: TimerRegistry::new(),
            mailbox,
            loopback: tx.downgrade(),
            snapshot_tx,
            started: Instant::now(),
            next_raw_id: u64::MAX,
            cancel,
        };
        let handle = RouterHandle {
            tx,
            snapshots: snapshot_rx,
        };
        (router, handle)
    }

    /// Spawn the router on the current runtime.
    pub fn spawn(config: RouterConfig, cancel: CancellationToken) -> (RouterHandle, JoinHandle<()>) {
        let (router, handle) = Self::with_cancel(config, cancel);
        let task = tokio::spawn(router.run());
        (handle, task)
    }

    /// Main loop. Runs until every handle is dropped or the cancellation
    /// token fires, then aborts all pending timers.
    pub async fn run(mut self) {
        info!(
            dwell_ms = self.config.dwell_ms,
            max_history = self.config.max_history,
            "activity router started"
        );
        loop {
            tokio::select! {
                msg = self.mailbox.recv() => {
                    match msg {
                        Some(msg) => self.handle(msg),
                        None => {
                            info!("activity router: all handles dropped, shutting down");
                            break;
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("activity router: cancellation requested, shutting down");
                    break;
                }
            }
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        let aborted = self.timers.cancel_all();
        for machine in self.surfaces.values_mut() {
            machine.clear();
        }
        self.locations.clear();
        debug!(aborted, "activity router: pending timers aborted");
    }

    fn handle(&mut self, msg: RouterMsg) {
        let touched = match msg {
            RouterMsg::Inbound(payload) => self.ingest_payload(payload),
            RouterMsg::Event(event) => self.route(event),
            RouterMsg::Clear { ack } => {
                self.clear_events();
                let _ = ack.send(());
                Touched::Everything
            }
            RouterMsg::Timer {
                location,
                timer,
                action,
            } => self.on_timer(location, timer, action),
            RouterMsg::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                Touched::Nothing
            }
            RouterMsg::StartTitle {
                location,
                activity_id,
                reply,
            } => {
                let title = self
                    .surfaces
                    .get(&location)
                    .and_then(|m| m.start_title_for_activity(&activity_id))
                    .map(str::to_owned);
                let _ = reply.send(title);
                Touched::Nothing
            }
        };
        self.publish_snapshot(touched);
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn ingest_payload(&mut self, payload: serde_json::Value) -> Touched {
        match decode_payload(payload) {
            Decoded::Event(event) => self.route(event),
            Decoded::Malformed { raw, reason } => {
                let id = self.next_raw_id;
                self.next_raw_id = self.next_raw_id.saturating_sub(1);
                warn!(
                    reason = %reason,
                    raw_id = id,
                    "malformed activity payload, showing raw text on window"
                );
                self.route(ActivityEvent::raw(id, raw))
            }
        }
    }

    fn route(&mut self, event: ActivityEvent) -> Touched {
        let resolution = resolve(&event, &mut self.locations);
        let location = resolution.location;
        if let Some(reason) = &resolution.fallback {
            warn!(
                surface = %location,
                event_id = event.id(),
                kind = %event.kind(),
                reason = %reason,
                "activity event routed by fallback"
            );
        }
        debug!(
            surface = %location,
            event_id = event.id(),
            kind = %event.kind(),
            activity_id = event.activity_id().unwrap_or(""),
            "routing activity event"
        );
        let now = self.now_ms();
        let Some(machine) = self.surfaces.get_mut(&location) else {
            return Touched::Nothing;
        };
        let plan = machine.ingest(event, now);
        self.schedule(location, plan);
        Touched::Surface(location)
    }

    fn on_timer(&mut self, location: Location, timer: TimerId, action: DeferredAction) -> Touched {
        self.timers.forget(timer);
        let now = self.now_ms();
        let Some(machine) = self.surfaces.get_mut(&location) else {
            return Touched::Nothing;
        };
        if !machine.untrack_timer(timer) {
            debug!(surface = %location, timer, "dropping timer cancelled by reset");
            return Touched::Nothing;
        }
        let plan = machine.fire(action, now);
        self.schedule(location, plan);
        Touched::Surface(location)
    }

    fn schedule(&mut self, location: Location, plan: Vec<Deferred>) {
        for Deferred { delay_ms, action } in plan {
            let timer = self.timers.schedule(
                Duration::from_millis(delay_ms),
                &self.loopback,
                move |timer| RouterMsg::Timer {
                    location,
                    timer,
                    action,
                },
            );
            if let Some(machine) = self.surfaces.get_mut(&location) {
                machine.track_timer(timer);
            }
        }
    }

    fn clear_events(&mut self) {
        let mut cancelled = 0usize;
        for machine in self.surfaces.values_mut() {
            for timer in machine.clear() {
                if self.timers.cancel(timer) {
                    cancelled += 1;
                }
            }
        }
        let forgotten = self.locations.len();
        self.locations.clear();
        info!(cancelled, forgotten, "activity events cleared");
    }

    fn snapshot(&self) -> RouterSnapshot {
        let now = self.now_ms();
        RouterSnapshot {
            surfaces: self.surfaces.values().map(|m| m.snapshot(now)).collect(),
            tracked_activities: self.locations.len(),
        }
    }

    fn publish_snapshot(&self, touched: Touched) {
        match touched {
            Touched::Nothing => {}
            Touched::Everything => {
                self.snapshot_tx.send_replace(self.snapshot());
            }
            Touched::Surface(location) => {
                let Some(machine) = self.surfaces.get(&location) else {
                    return;
                };
                let fresh = machine.snapshot(self.now_ms());
                let tracked = self.locations.len();
                self.snapshot_tx.send_modify(|published| {
                    published.tracked_activities = tracked;
                    match published.surfaces.iter_mut().find(|s| s.location == location) {
                        Some(slot) => *slot = fresh,
                        None => published.surfaces.push(fresh),
                    }
                });
            }
        }
    }
}

// ─── Handle ──────────────────────────────────────────────────────

/// Cheap, cloneable access to a running router. The router stops once every
/// handle is gone.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: mpsc::Sender<RouterMsg>,
    snapshots: watch::Receiver<RouterSnapshot>,
}

impl RouterHandle {
    async fn send(&self, msg: RouterMsg) -> Result<(), RouterError> {
        self.tx.send(msg).await.map_err(|_| RouterError::Stopped)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn dispatch(&self, event: ActivityEvent) -> Result<(), RouterError> {
        self.send(RouterMsg::Event(event)).await
    }

    /// Hand over a raw payload exactly as it arrived on a channel.
    pub async fn dispatch_payload(&self, payload: serde_json::Value) -> Result<(), RouterError> {
        self.send(RouterMsg::Inbound(payload)).await
    }

    /// Reset every surface and forget all activity locations. Resolves once
    /// the reset has been applied.
    pub async fn clear_events(&self) -> Result<(), RouterError> {
        let (ack, done) = oneshot::channel();
        self.send(RouterMsg::Clear { ack }).await?;
        done.await.map_err(|_| RouterError::NoReply)
    }

    pub async fn snapshot(&self) -> Result<RouterSnapshot, RouterError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterMsg::Snapshot { reply }).await?;
        rx.await.map_err(|_| RouterError::NoReply)
    }

    pub async fn surface(&self, location: Location) -> Result<SurfaceSnapshot, RouterError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .surface(location)
            .cloned()
            .unwrap_or_else(|| SurfaceSnapshot::empty(location)))
    }

    pub async fn start_title_for_activity(
        &self,
        location: Location,
        activity_id: &str,
    ) -> Result<Option<String>, RouterError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterMsg::StartTitle {
            location,
            activity_id: activity_id.to_owned(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| RouterError::NoReply)
    }

    /// Snapshot stream, updated after every state transition.
    pub fn watch(&self) -> watch::Receiver<RouterSnapshot> {
        self.snapshots.clone()
    }
}
