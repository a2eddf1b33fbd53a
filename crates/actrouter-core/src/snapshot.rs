//! Read-only view of one surface, handed to renderers and RPC clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::ActivityEvent;
use crate::location::Location;
use crate::surface::{CurrentEvent, find_start_title};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSnapshot {
    pub location: Location,
    /// Bounded history, oldest first.
    pub history: Vec<ActivityEvent>,
    pub active_activities: Vec<String>,
    pub active_count: usize,
    pub has_active_events: bool,
    /// What a renderer should show at `taken_at_ms`.
    pub latest_event: Option<ActivityEvent>,
    pub current: Option<CurrentEvent>,
    pub display_queue: Vec<ActivityEvent>,
    pub progress_by_activity: BTreeMap<String, Vec<ActivityEvent>>,
    pub oneshots: Vec<ActivityEvent>,
    pub start_titles: BTreeMap<String, String>,
    pub pending_timers: usize,
    /// Router clock reading when the snapshot was taken.
    pub taken_at_ms: u64,
}

impl SurfaceSnapshot {
    pub fn empty(location: Location) -> Self {
        Self {
            location,
            history: Vec::new(),
            active_activities: Vec::new(),
            active_count: 0,
            has_active_events: false,
            latest_event: None,
            current: None,
            display_queue: Vec::new(),
            progress_by_activity: BTreeMap::new(),
            oneshots: Vec::new(),
            start_titles: BTreeMap::new(),
            pending_timers: 0,
            taken_at_ms: 0,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.display_queue.len()
    }

    /// Same lookup order as the live store: cached title, then history.
    pub fn start_title_for_activity(&self, activity_id: &str) -> Option<&str> {
        if let Some(title) = self.start_titles.get(activity_id) {
            return Some(title.as_str());
        }
        find_start_title(self.history.iter(), activity_id)
    }
}

/// Every surface at one instant, plus the size of the location map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSnapshot {
    pub surfaces: Vec<SurfaceSnapshot>,
    pub tracked_activities: usize,
}

impl Default for RouterSnapshot {
    fn default() -> Self {
        Self {
            surfaces: Location::ALL.into_iter().map(SurfaceSnapshot::empty).collect(),
            tracked_activities: 0,
        }
    }
}

impl RouterSnapshot {
    pub fn surface(&self, location: Location) -> Option<&SurfaceSnapshot> {
        self.surfaces.iter().find(|s| s.location == location)
    }

    pub fn has_active_events(&self) -> bool {
        self.surfaces.iter().any(|s| s.has_active_events)
    }
}
