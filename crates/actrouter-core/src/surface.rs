//! Per-surface state store.
//!
//! A [`SurfaceState`] is only ever changed by [`reduce`], one
//! [`SurfaceAction`] at a time. Actions that name an id no longer present are
//! silent no-ops, which is what makes late timers harmless after a reset.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_HISTORY;
use crate::event::ActivityEvent;

/// Identifier of a deferred action registered with a surface.
pub type TimerId = u64;

/// The event occupying the display slot and when it got there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentEvent {
    pub event: ActivityEvent,
    pub shown_at_ms: u64,
}

/// A display queue entry. Event ids may repeat across producers, so the
/// queue tells entries apart by a per-surface ticket instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub ticket: u64,
    pub event: ActivityEvent,
}

// ─── Actions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceAction {
    AddEvent(ActivityEvent),
    RemoveOneshot { id: u64 },
    FinishActivity { activity_id: String },
    CleanupActivityProgress { activity_id: String },
    SetCurrent(Option<CurrentEvent>),
    /// Drop the queue entry holding this ticket (the one that was shown).
    Dequeue { ticket: u64 },
    /// Reset every field. Cancelling the timers listed in
    /// [`SurfaceState::pending_timers`] is the owner's job and must happen
    /// before this is applied.
    ClearAll,
    AddTimer(TimerId),
    RemoveTimer(TimerId),
}

// ─── State ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceState {
    max_history: usize,
    history: VecDeque<ActivityEvent>,
    active_activities: BTreeSet<String>,
    progress_by_activity: BTreeMap<String, Vec<ActivityEvent>>,
    oneshots: Vec<ActivityEvent>,
    start_titles: HashMap<String, String>,
    display_queue: VecDeque<QueuedEvent>,
    next_ticket: u64,
    current: Option<CurrentEvent>,
    pending_timers: BTreeSet<TimerId>,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl SurfaceState {
    /// Empty state with a history cap of `max_history` (at least 1).
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            history: VecDeque::new(),
            active_activities: BTreeSet::new(),
            progress_by_activity: BTreeMap::new(),
            oneshots: Vec::new(),
            start_titles: HashMap::new(),
            display_queue: VecDeque::new(),
            next_ticket: 0,
            current: None,
            pending_timers: BTreeSet::new(),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn history(&self) -> &VecDeque<ActivityEvent> {
        &self.history
    }

    pub fn active_activities(&self) -> &BTreeSet<String> {
        &self.active_activities
    }

    pub fn active_count(&self) -> usize {
        self.active_activities.len()
    }

    pub fn is_active(&self, activity_id: &str) -> bool {
        self.active_activities.contains(activity_id)
    }

    pub fn progress_by_activity(&self) -> &BTreeMap<String, Vec<ActivityEvent>> {
        &self.progress_by_activity
    }

    pub fn progress_for(&self, activity_id: &str) -> Option<&[ActivityEvent]> {
        self.progress_by_activity
            .get(activity_id)
            .map(Vec::as_slice)
    }

    pub fn oneshots(&self) -> &[ActivityEvent] {
        &self.oneshots
    }

    pub fn start_titles(&self) -> &HashMap<String, String> {
        &self.start_titles
    }

    pub fn display_queue(&self) -> &VecDeque<QueuedEvent> {
        &self.display_queue
    }

    /// Queued events front to back, without their tickets.
    pub fn queued_events(&self) -> impl Iterator<Item = &ActivityEvent> + '_ {
        self.display_queue.iter().map(|entry| &entry.event)
    }

    pub fn current(&self) -> Option<&CurrentEvent> {
        self.current.as_ref()
    }

    pub fn pending_timers(&self) -> &BTreeSet<TimerId> {
        &self.pending_timers
    }

    /// True while any activity is running or any oneshot is retained.
    pub fn has_active_events(&self) -> bool {
        !self.active_activities.is_empty() || !self.oneshots.is_empty()
    }

    /// Title of the activity's start: cached map first, then a history scan.
    pub fn start_title_for_activity(&self, activity_id: &str) -> Option<&str> {
        if let Some(title) = self.start_titles.get(activity_id) {
            return Some(title.as_str());
        }
        find_start_title(self.history.iter(), activity_id)
    }

    fn push_history(&mut self, event: ActivityEvent) {
        self.history.push_back(event);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    fn enqueue(&mut self, event: ActivityEvent, front: bool) {
        let entry = QueuedEvent {
            ticket: self.next_ticket,
            event,
        };
        self.next_ticket += 1;
        if front {
            self.display_queue.push_front(entry);
        } else {
            self.display_queue.push_back(entry);
        }
    }

    fn insert_progress(&mut self, activity_id: &str, event: ActivityEvent) {
        let buffer = self
            .progress_by_activity
            .entry(activity_id.to_owned())
            .or_default();
        // After any equal ids, so ties keep arrival order.
        let at = buffer.partition_point(|e| e.id() <= event.id());
        buffer.insert(at, event);
    }

    fn finish_activity(&mut self, activity_id: &str) {
        self.active_activities.remove(activity_id);
        self.start_titles.remove(activity_id);
    }
}

/// Scan `events` for the first start of `activity_id` and return its title.
pub(crate) fn find_start_title<'a>(
    mut events: impl Iterator<Item = &'a ActivityEvent>,
    activity_id: &str,
) -> Option<&'a str> {
    events.find_map(|event| match event {
        ActivityEvent::Start {
            activity_id: id,
            title,
            ..
        } if id == activity_id => Some(title.as_str()),
        _ => None,
    })
}

// ─── Reducer ─────────────────────────────────────────────────────

/// Apply one action and return the next state.
pub fn reduce(mut state: SurfaceState, action: SurfaceAction) -> SurfaceState {
    match action {
        SurfaceAction::AddEvent(event) => {
            state.push_history(event.clone());
            match &event {
                ActivityEvent::Oneshot { .. } => {
                    state.enqueue(event.clone(), true);
                    state.oneshots.push(event);
                }
                ActivityEvent::Start {
                    activity_id, title, ..
                } => {
                    let activity_id = activity_id.clone();
                    state.start_titles.insert(activity_id.clone(), title.clone());
                    state.active_activities.insert(activity_id.clone());
                    state.enqueue(event.clone(), false);
                    state.insert_progress(&activity_id, event);
                }
                ActivityEvent::Progress { activity_id, .. } => {
                    let activity_id = activity_id.clone();
                    state.active_activities.insert(activity_id.clone());
                    state.enqueue(event.clone(), false);
                    state.insert_progress(&activity_id, event);
                }
                ActivityEvent::Finish { activity_id, .. } => {
                    let activity_id = activity_id.clone();
                    state.finish_activity(&activity_id);
                    state.insert_progress(&activity_id, event);
                }
            }
        }
        SurfaceAction::RemoveOneshot { id } => {
            state.oneshots.retain(|e| e.id() != id);
        }
        SurfaceAction::FinishActivity { activity_id } => {
            state.finish_activity(&activity_id);
        }
        SurfaceAction::CleanupActivityProgress { activity_id } => {
            state.progress_by_activity.remove(&activity_id);
        }
        SurfaceAction::SetCurrent(current) => {
            state.current = current;
        }
        SurfaceAction::Dequeue { ticket } => {
            if let Some(pos) = state.display_queue.iter().position(|e| e.ticket == ticket) {
                state.display_queue.remove(pos);
            }
        }
        SurfaceAction::ClearAll => {
            state = SurfaceState::new(state.max_history);
        }
        SurfaceAction::AddTimer(timer) => {
            state.pending_timers.insert(timer);
        }
        SurfaceAction::RemoveTimer(timer) => {
            state.pending_timers.remove(&timer);
        }
    }
    state
}
