//! Location resolution: which display surface renders an event.
//!
//! Starts and oneshots name their surface explicitly. Progress and finish
//! events inherit the surface recorded for their activity's start, so one
//! activity never splits across surfaces. Resolution never fails; anything
//! unroutable lands on [`Location::Window`] with a [`FallbackReason`] the
//! caller is expected to log.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::ActivityEvent;

// ─── Location ────────────────────────────────────────────────────

/// A named display surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Status bar of the main window.
    #[default]
    Window,
    /// Persistent notification.
    Notification,
    /// Auto-dismissing toast.
    Toast,
}

impl Location {
    pub const ALL: [Self; 3] = [Self::Window, Self::Notification, Self::Toast];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::Notification => "notification",
            Self::Toast => "toast",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a location string that names no known surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown location: {0}")]
pub struct UnknownLocation(pub String);

impl FromStr for Location {
    type Err = UnknownLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "window" => Ok(Self::Window),
            "notification" => Ok(Self::Notification),
            "toast" => Ok(Self::Toast),
            _ => Err(UnknownLocation(s.to_owned())),
        }
    }
}

// ─── Location Map ────────────────────────────────────────────────

/// `activity_id → Location`, written on start and read by later events.
///
/// Entries survive `Finish` so deferred cleanup can still find the surface;
/// only [`LocationMap::clear`] removes them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LocationMap {
    entries: HashMap<String, Location>,
}

impl LocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, activity_id: &str) -> Option<Location> {
        self.entries.get(activity_id).copied()
    }

    pub fn record(&mut self, activity_id: &str, location: Location) {
        self.entries.insert(activity_id.to_owned(), location);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Resolution ──────────────────────────────────────────────────

/// Why an event was routed to the default surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Oneshot or start with no location field.
    MissingLocation,
    /// Location string named no known surface.
    UnknownLocation(String),
    /// Progress or finish for an activity with no recorded start.
    UnmappedActivity(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLocation => write!(f, "event carries no location"),
            Self::UnknownLocation(loc) => write!(f, "unknown location {loc:?}"),
            Self::UnmappedActivity(id) => write!(f, "no start recorded for activity {id:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub location: Location,
    /// Set when the default surface was chosen because routing failed.
    pub fallback: Option<FallbackReason>,
}

impl Resolution {
    fn routed(location: Location) -> Self {
        Self {
            location,
            fallback: None,
        }
    }

    fn fallback(reason: FallbackReason) -> Self {
        Self {
            location: Location::default(),
            fallback: Some(reason),
        }
    }
}

/// Resolve the target surface for `event`.
///
/// Side effect: a start records its resolved surface in `map` (the fallback
/// surface included), so its progress and finish follow it.
pub fn resolve(event: &ActivityEvent, map: &mut LocationMap) -> Resolution {
    match event {
        ActivityEvent::Oneshot { location, .. } => resolve_explicit(location.as_deref()),
        ActivityEvent::Start {
            activity_id,
            location,
            ..
        } => {
            let resolution = resolve_explicit(location.as_deref());
            map.record(activity_id, resolution.location);
            resolution
        }
        ActivityEvent::Progress { activity_id, .. } | ActivityEvent::Finish { activity_id, .. } => {
            match map.get(activity_id) {
                Some(location) => Resolution::routed(location),
                None => Resolution::fallback(FallbackReason::UnmappedActivity(activity_id.clone())),
            }
        }
    }
}

fn resolve_explicit(location: Option<&str>) -> Resolution {
    match location {
        None => Resolution::fallback(FallbackReason::MissingLocation),
        Some(raw) => match raw.parse::<Location>() {
            Ok(location) => Resolution::routed(location),
            Err(UnknownLocation(raw)) => Resolution::fallback(FallbackReason::UnknownLocation(raw)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_locations_route_directly() {
        let mut map = LocationMap::new();
        let toast = resolve(&ActivityEvent::oneshot(1, "Saved", "toast"), &mut map);
        assert_eq!(toast, Resolution::routed(Location::Toast));
        let notif = resolve(&ActivityEvent::oneshot(2, "Update", "Notification"), &mut map);
        assert_eq!(notif.location, Location::Notification);
        assert!(map.is_empty(), "oneshots never record a mapping");
    }

    #[test]
    fn start_location_sticks_to_progress_and_finish() {
        let mut map = LocationMap::new();
        resolve(&ActivityEvent::start(1, "x", "Cloning", "toast"), &mut map);
        let progress = resolve(&ActivityEvent::progress(2, "x", "objects"), &mut map);
        assert_eq!(progress, Resolution::routed(Location::Toast));
        let finish = resolve(&ActivityEvent::finish(3, "x"), &mut map);
        assert_eq!(finish.location, Location::Toast);
        // Finish does not forget the mapping.
        assert_eq!(map.get("x"), Some(Location::Toast));
    }

    #[test]
    fn unmapped_progress_falls_back_to_window() {
        let mut map = LocationMap::new();
        let res = resolve(&ActivityEvent::progress(5, "ghost", "early"), &mut map);
        assert_eq!(res.location, Location::Window);
        assert_eq!(
            res.fallback,
            Some(FallbackReason::UnmappedActivity("ghost".to_string()))
        );
    }

    #[test]
    fn unknown_location_falls_back_and_is_recorded_as_window() {
        let mut map = LocationMap::new();
        let res = resolve(&ActivityEvent::start(1, "y", "Build", "sidebar"), &mut map);
        assert_eq!(res.location, Location::Window);
        assert_eq!(
            res.fallback,
            Some(FallbackReason::UnknownLocation("sidebar".to_string()))
        );
        assert_eq!(map.get("y"), Some(Location::Window));
    }

    #[test]
    fn missing_location_falls_back() {
        let mut map = LocationMap::new();
        let res = resolve(&ActivityEvent::raw(1, "{}"), &mut map);
        assert_eq!(res.location, Location::Window);
        assert_eq!(res.fallback, Some(FallbackReason::MissingLocation));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut map = LocationMap::new();
        resolve(&ActivityEvent::start(1, "x", "t", "toast"), &mut map);
        map.clear();
        let res = resolve(&ActivityEvent::progress(2, "x", "d"), &mut map);
        assert_eq!(res.location, Location::Window);
        assert!(res.fallback.is_some());
    }

    #[test]
    fn location_round_trips_through_str() {
        for loc in Location::ALL {
            assert_eq!(loc.as_str().parse::<Location>(), Ok(loc));
        }
        assert!("".parse::<Location>().is_err());
    }
}
