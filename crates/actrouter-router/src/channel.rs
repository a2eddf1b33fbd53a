//! In-process named push channels carrying raw JSON payloads.
//!
//! Stands in for the host's event transport: producers publish to a channel
//! by name, listeners attach by name. Attaching to a channel that was never
//! opened fails, which is the transport's "subscription did not attach" case.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::error::BridgeError;

/// Channel the backend broadcasts activity events on.
pub const ACTIVITY_CHANNEL: &str = "workbench://activity-indicator";

/// Per-channel buffer. Slow listeners past this many payloads lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, Clone, Default)]
pub struct ChannelHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<serde_json::Value>>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub with [`ACTIVITY_CHANNEL`] already open.
    pub fn with_activity_channel() -> Self {
        let hub = Self::new();
        hub.open(ACTIVITY_CHANNEL, DEFAULT_CHANNEL_CAPACITY);
        hub
    }

    /// Open `name` if it is not open yet.
    pub fn open(&self, name: &str, capacity: usize) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels.entry(name.to_owned()).or_insert_with(|| {
            let (sender, _receiver) = broadcast::channel(capacity.max(1));
            sender
        });
    }

    /// Attach a listener to `name`.
    pub fn listen(&self, name: &str) -> Result<broadcast::Receiver<serde_json::Value>, BridgeError> {
        self.sender(name)
            .map(|sender| sender.subscribe())
            .ok_or_else(|| BridgeError::UnknownChannel(name.to_owned()))
    }

    /// Publish a payload. Returns how many listeners received it.
    pub fn publish(&self, name: &str, payload: serde_json::Value) -> Result<usize, BridgeError> {
        let sender = self
            .sender(name)
            .ok_or_else(|| BridgeError::UnknownChannel(name.to_owned()))?;
        sender
            .send(payload)
            .map_err(|_| BridgeError::NoSubscribers(name.to_owned()))
    }

    fn sender(&self, name: &str) -> Option<broadcast::Sender<serde_json::Value>> {
        let channels = self
            .channels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels.get(name).cloned()
    }
}
