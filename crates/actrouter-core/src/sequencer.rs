//! Display sequencer: a single "now showing" slot fed by the display queue.
//!
//! The sequencer only tracks whether an advance is in flight. The shown
//! entry stays in the queue until its dwell elapses and it is dequeued by
//! ticket, so a oneshot that jumps the queue mid-dwell is shown next rather
//! than dropped, even when it reuses the shown event's id.

use crate::event::ActivityEvent;
use crate::surface::{CurrentEvent, SurfaceState};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DisplaySequencer {
    in_flight: Option<u64>,
}

impl DisplaySequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue ticket of the entry being shown, if an advance is pending.
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Pick the queue front for display if nothing is in flight.
    ///
    /// Returns the new slot contents; the caller applies it with
    /// `SetCurrent` and schedules the advance after one dwell.
    pub fn next_to_show(&mut self, state: &SurfaceState, now_ms: u64) -> Option<CurrentEvent> {
        if self.in_flight.is_some() {
            return None;
        }
        let front = state.display_queue().front()?;
        self.in_flight = Some(front.ticket);
        Some(CurrentEvent {
            event: front.event.clone(),
            shown_at_ms: now_ms,
        })
    }

    /// Dwell elapsed: release the slot. Returns the ticket to dequeue.
    pub fn complete(&mut self) -> Option<u64> {
        self.in_flight.take()
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
    }
}

/// True once `current` has occupied the slot for a full dwell.
pub fn is_expired(current: &CurrentEvent, now_ms: u64, dwell_ms: u64) -> bool {
    now_ms.saturating_sub(current.shown_at_ms) >= dwell_ms
}

/// The event a renderer should show right now.
///
/// Falls back to peeking the queue front while nothing is in flight, so the
/// gap between one event expiring and the next being picked never renders
/// as empty.
pub fn latest_event<'a>(
    state: &'a SurfaceState,
    sequencer: &DisplaySequencer,
    now_ms: u64,
    dwell_ms: u64,
) -> Option<&'a ActivityEvent> {
    if let Some(current) = state.current().filter(|c| !is_expired(c, now_ms, dwell_ms)) {
        return Some(&current.event);
    }
    if !sequencer.is_in_flight() {
        return state.queued_events().next();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{SurfaceAction, reduce};

    fn queued(events: impl IntoIterator<Item = ActivityEvent>) -> SurfaceState {
        events
            .into_iter()
            .map(SurfaceAction::AddEvent)
            .fold(SurfaceState::default(), reduce)
    }

    #[test]
    fn empty_queue_shows_nothing() {
        let mut seq = DisplaySequencer::new();
        assert!(seq.next_to_show(&SurfaceState::default(), 0).is_none());
        assert!(!seq.is_in_flight());
    }

    #[test]
    fn shows_front_once_until_completed() {
        let state = queued([
            ActivityEvent::start(1, "a", "A", "window"),
            ActivityEvent::progress(2, "a", "B"),
        ]);
        let mut seq = DisplaySequencer::new();
        let shown = seq.next_to_show(&state, 100).expect("front is shown");
        assert_eq!(shown.event.id(), 1);
        assert_eq!(shown.shown_at_ms, 100);
        assert!(seq.next_to_show(&state, 101).is_none(), "advance in flight");

        assert_eq!(seq.complete(), Some(0));
        assert_eq!(seq.complete(), None);
    }

    #[test]
    fn expiry_is_inclusive_at_dwell() {
        let current = CurrentEvent {
            event: ActivityEvent::oneshot(1, "O", "window"),
            shown_at_ms: 50,
        };
        assert!(!is_expired(&current, 59, 10));
        assert!(is_expired(&current, 60, 10));
        // Clock skew never underflows.
        assert!(!is_expired(&current, 0, 10));
    }

    #[test]
    fn latest_event_prefers_live_current() {
        let mut state = queued([ActivityEvent::start(1, "a", "A", "window")]);
        let mut seq = DisplaySequencer::new();
        let shown = seq.next_to_show(&state, 0).expect("shown");
        state = reduce(state, SurfaceAction::SetCurrent(Some(shown)));
        assert_eq!(latest_event(&state, &seq, 5, 10).map(ActivityEvent::id), Some(1));
        // Expired while still in flight: nothing to show.
        assert_eq!(latest_event(&state, &seq, 10, 10), None);
    }

    #[test]
    fn latest_event_peeks_queue_when_idle() {
        let state = queued([ActivityEvent::progress(4, "a", "x")]);
        let seq = DisplaySequencer::new();
        assert_eq!(latest_event(&state, &seq, 0, 10).map(ActivityEvent::id), Some(4));
    }
}
