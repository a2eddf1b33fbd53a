//! Activity event model: the closed set of lifecycle events a backend can
//! broadcast, plus pure extraction helpers.
//!
//! Wire format is externally tagged with camelCase fields:
//!
//! ```text
//! {"start": {"id": 1, "activityId": "a1", "title": "Indexing", "location": "window"}}
//! {"progress": {"id": 2, "activityId": "a1", "detail": "50%"}}
//! {"finish": {"id": 3, "activityId": "a1"}}
//! {"oneshot": {"id": 4, "title": "Pulled", "location": "toast"}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Event ───────────────────────────────────────────────────────

/// A single activity lifecycle event.
///
/// `id` orders events within one activity; delivery order is not trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityEvent {
    /// Fire-and-forget notice. A producer-supplied `activity_id` is a tag
    /// only and never used for correlation.
    #[serde(rename_all = "camelCase")]
    Oneshot {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        activity_id: Option<String>,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Start {
        id: u64,
        activity_id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        id: u64,
        activity_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Finish { id: u64, activity_id: String },
}

/// Discriminant of [`ActivityEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Oneshot,
    Start,
    Progress,
    Finish,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Oneshot => "oneshot",
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Finish => "finish",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ActivityEvent {
    pub fn oneshot(id: u64, title: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Oneshot {
            id,
            activity_id: None,
            title: title.into(),
            detail: None,
            location: Some(location.into()),
        }
    }

    pub fn start(
        id: u64,
        activity_id: impl Into<String>,
        title: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self::Start {
            id,
            activity_id: activity_id.into(),
            title: title.into(),
            detail: None,
            location: Some(location.into()),
        }
    }

    pub fn progress(id: u64, activity_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Progress {
            id,
            activity_id: activity_id.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn finish(id: u64, activity_id: impl Into<String>) -> Self {
        Self::Finish {
            id,
            activity_id: activity_id.into(),
        }
    }

    /// Best-effort display item for a payload that matched no variant.
    ///
    /// The raw payload text becomes the title so it stays observable on the
    /// default surface.
    pub fn raw(id: u64, payload: impl Into<String>) -> Self {
        Self::Oneshot {
            id,
            activity_id: None,
            title: payload.into(),
            detail: None,
            location: None,
        }
    }


    pub fn id(&self) -> u64 {
        match self {
            Self::Oneshot { id, .. }
            | Self::Start { id, .. }
            | Self::Progress { id, .. }
            | Self::Finish { id, .. } => *id,
        }
    }

    /// Correlation key. Always `None` for oneshots.
    pub fn activity_id(&self) -> Option<&str> {
        match self {
            Self::Oneshot { .. } => None,
            Self::Start { activity_id, .. }
            | Self::Progress { activity_id, .. }
            | Self::Finish { activity_id, .. } => Some(activity_id),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Oneshot { .. } => EventKind::Oneshot,
            Self::Start { .. } => EventKind::Start,
            Self::Progress { .. } => EventKind::Progress,
            Self::Finish { .. } => EventKind::Finish,
        }
    }

    pub fn is_oneshot(&self) -> bool {
        matches!(self, Self::Oneshot { .. })
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Oneshot { title, .. } | Self::Start { title, .. } => Some(title),
            Self::Progress { .. } | Self::Finish { .. } => None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Oneshot { detail, .. }
            | Self::Start { detail, .. }
            | Self::Progress { detail, .. } => detail.as_deref(),
            Self::Finish { .. } => None,
        }
    }

    /// Producer-supplied location string. Only oneshots and starts carry one.
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Oneshot { location, .. } | Self::Start { location, .. } => location.as_deref(),
            Self::Progress { .. } | Self::Finish { .. } => None,
        }
    }
}

// ─── Decoding ────────────────────────────────────────────────────

/// Result of decoding an inbound JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Event(ActivityEvent),
    /// Payload matched none of the four variants.
    Malformed { raw: String, reason: String },
}

/// Decode a raw payload. Never fails: unrecognised shapes come back as
/// [`Decoded::Malformed`] carrying the stringified payload.
pub fn decode_payload(payload: serde_json::Value) -> Decoded {
    let raw = payload.to_string();
    match serde_json::from_value::<ActivityEvent>(payload) {
        Ok(event) => Decoded::Event(event),
        Err(e) => Decoded::Malformed {
            raw,
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_start_with_camel_case_fields() {
        let payload = json!({
            "start": {"id": 1, "activityId": "a1", "title": "Indexing", "location": "window"}
        });
        let Decoded::Event(event) = decode_payload(payload) else {
            panic!("start should decode");
        };
        assert_eq!(event, ActivityEvent::start(1, "a1", "Indexing", "window"));
        assert_eq!(event.kind(), EventKind::Start);
        assert_eq!(event.activity_id(), Some("a1"));
        assert_eq!(event.location(), Some("window"));
    }

    #[test]
    fn progress_without_detail_decodes() {
        let payload = json!({"progress": {"id": 7, "activityId": "scan_worktree"}});
        let Decoded::Event(event) = decode_payload(payload) else {
            panic!("progress should decode");
        };
        assert_eq!(event.id(), 7);
        assert_eq!(event.detail(), None);
        assert_eq!(event.location(), None);
    }

    #[test]
    fn oneshot_activity_tag_is_not_a_correlation_key() {
        let payload = json!({
            "oneshot": {"id": 3, "activityId": "pull_conflicts", "title": "Failed to pull", "location": "toast"}
        });
        let Decoded::Event(event) = decode_payload(payload) else {
            panic!("oneshot should decode");
        };
        assert!(event.is_oneshot());
        assert_eq!(event.activity_id(), None);
        assert_eq!(event.title(), Some("Failed to pull"));
    }

    #[test]
    fn unknown_variant_is_malformed_with_raw_text() {
        let payload = json!({"explode": {"id": 1}});
        match decode_payload(payload) {
            Decoded::Malformed { raw, reason } => {
                assert!(raw.contains("explode"));
                assert!(!reason.is_empty());
            }
            Decoded::Event(e) => panic!("unexpected event {e:?}"),
        }
    }

    #[test]
    fn non_object_payload_is_malformed() {
        assert!(matches!(
            decode_payload(json!("just a string")),
            Decoded::Malformed { .. }
        ));
        assert!(matches!(
            decode_payload(json!({"finish": {"id": 2}})),
            Decoded::Malformed { .. }
        ));
    }

    #[test]
    fn serializes_externally_tagged() {
        let event = ActivityEvent::progress(2, "a1", "50%");
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            value,
            json!({"progress": {"id": 2, "activityId": "a1", "detail": "50%"}})
        );
    }

    #[test]
    fn raw_event_has_no_location() {
        let event = ActivityEvent::raw(9, "{\"bogus\":true}");
        assert!(event.is_oneshot());
        assert_eq!(event.location(), None);
        assert_eq!(event.title(), Some("{\"bogus\":true}"));
    }
}
