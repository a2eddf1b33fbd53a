//! One surface's store and display sequencer driven together.
//!
//! [`SurfaceMachine`] never touches a clock or a timer. Every operation takes
//! the current time and returns the deferred work it wants scheduled; the
//! owner runs those [`Deferred`] entries and feeds each back through
//! [`SurfaceMachine::fire`] when it comes due.

use crate::config::RouterConfig;
use crate::event::ActivityEvent;
use crate::location::Location;
use crate::sequencer::{self, DisplaySequencer};
use crate::snapshot::SurfaceSnapshot;
use crate::surface::{SurfaceAction, SurfaceState, TimerId, reduce};

// ─── Deferred Work ───────────────────────────────────────────────

/// Work to re-enter the machine after `delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    pub delay_ms: u64,
    pub action: DeferredAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Oneshot retention elapsed.
    RemoveOneshot { id: u64 },
    /// Post-finish retention elapsed.
    CleanupActivityProgress { activity_id: String },
    /// Dwell elapsed: release the slot and show the next queued event.
    AdvanceDisplay,
    /// Dwell elapsed for the event shown at `shown_at_ms`.
    ExpireCurrent { id: u64, shown_at_ms: u64 },
}

// ─── Machine ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SurfaceMachine {
    location: Location,
    config: RouterConfig,
    state: SurfaceState,
    sequencer: DisplaySequencer,
}

impl SurfaceMachine {
    pub fn new(location: Location, config: RouterConfig) -> Self {
        Self {
            location,
            config,
            state: SurfaceState::new(config.max_history),
            sequencer: DisplaySequencer::new(),
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn sequencer(&self) -> &DisplaySequencer {
        &self.sequencer
    }

    fn dispatch(&mut self, action: SurfaceAction) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
    }

    /// Add a routed event. Plans retention for oneshots and finishes, and
    /// starts a display cycle if the slot is free.
    pub fn ingest(&mut self, event: ActivityEvent, now_ms: u64) -> Vec<Deferred> {
        let mut plan = Vec::new();
        match &event {
            ActivityEvent::Oneshot { id, .. } => plan.push(Deferred {
                delay_ms: self.config.oneshot_retention_ms,
                action: DeferredAction::RemoveOneshot { id: *id },
            }),
            ActivityEvent::Finish { activity_id, .. } => plan.push(Deferred {
                delay_ms: self.config.progress_retention_ms,
                action: DeferredAction::CleanupActivityProgress {
                    activity_id: activity_id.clone(),
                },
            }),
            ActivityEvent::Start { .. } | ActivityEvent::Progress { .. } => {}
        }
        self.dispatch(SurfaceAction::AddEvent(event));
        self.drive(now_ms, &mut plan);
        plan
    }

    /// Apply deferred work that came due.
    pub fn fire(&mut self, action: DeferredAction, now_ms: u64) -> Vec<Deferred> {
        let mut plan = Vec::new();
        match action {
            DeferredAction::RemoveOneshot { id } => {
                self.dispatch(SurfaceAction::RemoveOneshot { id });
            }
            DeferredAction::CleanupActivityProgress { activity_id } => {
                self.dispatch(SurfaceAction::CleanupActivityProgress { activity_id });
            }
            DeferredAction::AdvanceDisplay => {
                if let Some(ticket) = self.sequencer.complete() {
                    self.dispatch(SurfaceAction::Dequeue { ticket });
                }
            }
            DeferredAction::ExpireCurrent { id, shown_at_ms } => {
                let dwell_ms = self.config.dwell_ms;
                let expired = self
                    .state
                    .current()
                    .filter(|c| c.event.id() == id && c.shown_at_ms == shown_at_ms)
                    .map(|c| sequencer::is_expired(c, now_ms, dwell_ms));
                match expired {
                    Some(true) => self.dispatch(SurfaceAction::SetCurrent(None)),
                    Some(false) => plan.push(Deferred {
                        delay_ms: (shown_at_ms + dwell_ms).saturating_sub(now_ms),
                        action: DeferredAction::ExpireCurrent { id, shown_at_ms },
                    }),
                    // Replaced or already cleared.
                    None => {}
                }
            }
        }
        self.drive(now_ms, &mut plan);
        plan
    }

    fn drive(&mut self, now_ms: u64, plan: &mut Vec<Deferred>) {
        let Some(current) = self.sequencer.next_to_show(&self.state, now_ms) else {
            return;
        };
        let id = current.event.id();
        self.dispatch(SurfaceAction::SetCurrent(Some(current)));
        plan.push(Deferred {
            delay_ms: self.config.dwell_ms,
            action: DeferredAction::AdvanceDisplay,
        });
        plan.push(Deferred {
            delay_ms: self.config.dwell_ms,
            action: DeferredAction::ExpireCurrent {
                id,
                shown_at_ms: now_ms,
            },
        });
    }

    pub fn track_timer(&mut self, timer: TimerId) {
        self.dispatch(SurfaceAction::AddTimer(timer));
    }

    /// Deregister a timer that just fired. Returns `false` if it was not
    /// pending, meaning a reset already cancelled it and its action must be
    /// dropped.
    pub fn untrack_timer(&mut self, timer: TimerId) -> bool {
        if !self.state.pending_timers().contains(&timer) {
            return false;
        }
        self.dispatch(SurfaceAction::RemoveTimer(timer));
        true
    }

    /// Reset to empty. Returns every timer that was pending; the caller must
    /// cancel them.
    pub fn clear(&mut self) -> Vec<TimerId> {
        let timers = self.state.pending_timers().iter().copied().collect();
        self.sequencer.reset();
        self.dispatch(SurfaceAction::ClearAll);
        timers
    }

    pub fn latest_event(&self, now_ms: u64) -> Option<&ActivityEvent> {
        sequencer::latest_event(&self.state, &self.sequencer, now_ms, self.config.dwell_ms)
    }

    pub fn start_title_for_activity(&self, activity_id: &str) -> Option<&str> {
        self.state.start_title_for_activity(activity_id)
    }

    pub fn snapshot(&self, now_ms: u64) -> SurfaceSnapshot {
        let state = &self.state;
        SurfaceSnapshot {
            location: self.location,
            history: state.history().iter().cloned().collect(),
            active_activities: state.active_activities().iter().cloned().collect(),
            active_count: state.active_count(),
            has_active_events: state.has_active_events(),
            latest_event: self.latest_event(now_ms).cloned(),
            current: state.current().cloned(),
            display_queue: state.queued_events().cloned().collect(),
            progress_by_activity: state.progress_by_activity().clone(),
            oneshots: state.oneshots().to_vec(),
            start_titles: state
                .start_titles()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            pending_timers: state.pending_timers().len(),
            taken_at_ms: now_ms,
        }
    }
}
