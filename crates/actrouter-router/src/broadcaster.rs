//! Producer side: backend code reports activity onto a channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use actrouter_core::{ActivityEvent, Location};
use tracing::{debug, trace};

use crate::channel::{ACTIVITY_CHANNEL, ChannelHub};
use crate::error::BridgeError;

/// Where an emitted activity should surface, and what it says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToLocation {
    Window {
        activity_id: String,
        title: String,
        detail: Option<String>,
    },
    Notification {
        activity_id: String,
        title: String,
        detail: Option<String>,
    },
    Toast {
        activity_id: String,
        title: String,
        detail: Option<String>,
    },
}

impl ToLocation {
    pub fn new(
        location: Location,
        activity_id: impl Into<String>,
        title: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        let activity_id = activity_id.into();
        let title = title.into();
        match location {
            Location::Window => Self::Window {
                activity_id,
                title,
                detail,
            },
            Location::Notification => Self::Notification {
                activity_id,
                title,
                detail,
            },
            Location::Toast => Self::Toast {
                activity_id,
                title,
                detail,
            },
        }
    }

    pub fn location(&self) -> Location {
        match self {
            Self::Window { .. } => Location::Window,
            Self::Notification { .. } => Location::Notification,
            Self::Toast { .. } => Location::Toast,
        }
    }

    fn into_parts(self) -> (Location, String, String, Option<String>) {
        let location = self.location();
        match self {
            Self::Window {
                activity_id,
                title,
                detail,
            }
            | Self::Notification {
                activity_id,
                title,
                detail,
            }
            | Self::Toast {
                activity_id,
                title,
                detail,
            } => (location, activity_id, title, detail),
        }
    }
}

/// Publishes activity events with ids from one shared counter.
#[derive(Debug, Clone)]
pub struct ActivityBroadcaster {
    hub: ChannelHub,
    channel: String,
    next_id: Arc<AtomicU64>,
}

impl ActivityBroadcaster {
    pub fn new(hub: ChannelHub) -> Self {
        Self::with_channel(hub, ACTIVITY_CHANNEL)
    }

    pub fn with_channel(hub: ChannelHub, channel: impl Into<String>) -> Self {
        Self {
            hub,
            channel: channel.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Publish one event. Nobody listening is not an error.
    pub fn publish(&self, event: &ActivityEvent) -> Result<(), BridgeError> {
        let payload = serde_json::to_value(event)?;
        match self.hub.publish(&self.channel, payload) {
            Ok(listeners) => {
                trace!(event_id = event.id(), kind = %event.kind(), listeners, "activity event published");
                Ok(())
            }
            Err(BridgeError::NoSubscribers(_)) => {
                debug!(event_id = event.id(), kind = %event.kind(), "activity event published with no listeners");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Emit a standalone notice. Returns its event id.
    pub fn emit_oneshot(&self, to: ToLocation) -> Result<u64, BridgeError> {
        let (location, activity_id, title, detail) = to.into_parts();
        let id = self.next_id();
        let event = ActivityEvent::Oneshot {
            id,
            activity_id: Some(activity_id),
            title,
            detail,
            location: Some(location.as_str().to_owned()),
        };
        self.publish(&event)?;
        Ok(id)
    }

    /// Start a long-running activity.
    ///
    /// The wire activity id is `"{activity_id}/{start_id}"` so two concurrent
    /// runs of the same operation never share a progress buffer.
    pub fn emit_continual(&self, to: ToLocation) -> Result<ActivityHandle, BridgeError> {
        let (location, activity_id, title, detail) = to.into_parts();
        let id = self.next_id();
        let activity_id = format!("{activity_id}/{id}");
        let event = ActivityEvent::Start {
            id,
            activity_id: activity_id.clone(),
            title,
            detail,
            location: Some(location.as_str().to_owned()),
        };
        self.publish(&event)?;
        Ok(ActivityHandle {
            broadcaster: self.clone(),
            activity_id,
            location,
            finished: false,
        })
    }
}

/// An activity that has started. Dropping it without
/// [`emit_finish`](Self::emit_finish) still reports the finish.
#[derive(Debug)]
pub struct ActivityHandle {
    broadcaster: ActivityBroadcaster,
    activity_id: String,
    location: Location,
    finished: bool,
}

impl ActivityHandle {
    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn emit_progress(&self, detail: Option<String>) -> Result<u64, BridgeError> {
        let id = self.broadcaster.next_id();
        let event = ActivityEvent::Progress {
            id,
            activity_id: self.activity_id.clone(),
            detail,
        };
        self.broadcaster.publish(&event)?;
        Ok(id)
    }

    pub fn emit_finish(mut self) -> Result<u64, BridgeError> {
        self.finished = true;
        self.send_finish()
    }

    fn send_finish(&self) -> Result<u64, BridgeError> {
        let id = self.broadcaster.next_id();
        self.broadcaster
            .publish(&ActivityEvent::finish(id, self.activity_id.clone()))?;
        Ok(id)
    }
}

impl Drop for ActivityHandle {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.send_finish();
        }
    }
}
