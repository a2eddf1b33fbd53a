//! Error types for the router, its channels, and producers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("activity router is not running")]
    Stopped,

    #[error("activity router dropped the reply")]
    NoReply,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("no subscribers on channel {0}")]
    NoSubscribers(String),

    #[error("simulated source is closed")]
    SourceClosed,

    #[error("cannot encode activity event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Router(#[from] RouterError),
}
