//! actrouter-core: activity event model, location resolution, per-surface
//! reducer and display sequencing.
//!
//! Pure, synchronous, clock-free. Callers pass the current time in and run
//! the deferred work handed back to them.

pub mod config;
pub mod event;
pub mod location;
pub mod machine;
pub mod sequencer;
pub mod snapshot;
pub mod surface;

pub use config::{ConfigError, RouterConfig};
pub use event::{ActivityEvent, Decoded, EventKind, decode_payload};
pub use location::{FallbackReason, Location, LocationMap, Resolution, resolve};
pub use machine::{Deferred, DeferredAction, SurfaceMachine};
pub use sequencer::DisplaySequencer;
pub use snapshot::{RouterSnapshot, SurfaceSnapshot};
pub use surface::{CurrentEvent, QueuedEvent, SurfaceAction, SurfaceState, TimerId, reduce};
