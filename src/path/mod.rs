//! Timed route construction

pub mod builder;
pub mod waypoint;

pub use builder::{Mark, PathBuilder, is_safe_leg};
pub use waypoint::{Arrival, Waypoint};
