//! Hazard model and synchronizer
//!
//! Hazards are created once per venue; afterwards only their predicted
//! activation times change, and only through `Synchronizer::apply`.

pub mod aoe;
pub mod sequence;
pub mod sync;

pub use aoe::{AoeShape, RepeatingAoe};
pub use sequence::{Anchor, HazardId, HazardModel, HazardSequence, SequenceId};
pub use sync::{
    SyncOutcome, Synchronizer, TelemetryEvent, TelemetryFeed, TelemetryInbox, TriggerTable,
    telemetry_channel,
};
