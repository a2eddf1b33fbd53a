//! actrouter-router: the async side of activity routing.
//!
//! [`ActivityRouter`] runs the per-surface machines from `actrouter-core`
//! inside a single task, drives their timers, and serves snapshots.
//! [`SubscriptionBridge`] feeds it from named channels and simulated
//! sources; [`ActivityBroadcaster`] is what producers publish through.

pub mod bridge;
pub mod broadcaster;
pub mod channel;
pub mod error;
pub mod router;
pub mod simulator;
pub mod timers;

pub use bridge::{SimulatedSource, Subscription, SubscriptionBridge};
pub use broadcaster::{ActivityBroadcaster, ActivityHandle, ToLocation};
pub use channel::{ACTIVITY_CHANNEL, ChannelHub};
pub use error::{BridgeError, RouterError};
pub use router::{ActivityRouter, MAILBOX_CAPACITY, RouterHandle};
pub use simulator::{SimulationPlan, simulate_activity};
pub use timers::TimerRegistry;
