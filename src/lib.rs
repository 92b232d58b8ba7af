//! Hazard Route - timing model for recurring AOE hazards and a timed route planner
//!
//! Core modules:
//! - `geom`: Ray/shape intersection math on the ground plane
//! - `hazard`: Repeating hazards, their sequences, and telemetry synchronization
//! - `path`: Branchable timeline of timed waypoints
//! - `plan`: Stage tree, recursive solver and the spacetime-grid alternative
//! - `venue`: Per-venue configuration and the live session that ties it together
//! - `settings`: Engine tunables

pub mod error;
pub mod geom;
pub mod hazard;
pub mod path;
pub mod plan;
pub mod settings;
pub mod venue;

pub use error::{ConfigError, ConfigResult};
pub use settings::Settings;

use glam::{Vec2, Vec3};

/// Engine constants
pub mod consts {
    /// Agent ground speed (units per second)
    pub const SPEED: f32 = 6.0;
    pub const INV_SPEED: f32 = 1.0 / SPEED;

    /// Caster position must be this close (squared) to a hazard origin to match it
    pub const MATCH_TOLERANCE_SQ: f32 = 1.0;

    /// Direction components at or below this are treated as parallel in slab tests
    pub const PARALLEL_THRESHOLD: f32 = 0.05;

    /// Anything shorter than this is a degenerate length
    pub const LENGTH_EPSILON: f32 = 1e-4;

    /// Activations closer than this to a window boundary do not count as overlapping
    pub const TIME_EPSILON: f32 = 1e-3;

    /// Shortest accepted repeat period for a hazard sequence (seconds)
    pub const MIN_PERIOD: f32 = 0.1;

    /// Upper bound on space-time grid size, in voxels
    pub const MAX_GRID_VOXELS: usize = 1 << 27;

    /// Ground distance at which a waypoint counts as reached
    pub const WAYPOINT_REACHED: f32 = 0.5;

    /// Default maximum chord error when approximating circles (world units)
    pub const TESSELLATION_ERROR: f32 = 0.1;

    /// Segment count bounds for circle tessellation
    pub const MIN_CIRCLE_SEGMENTS: u32 = 4;
    pub const MAX_CIRCLE_SEGMENTS: u32 = 512;
}

/// Ground-plane projection (x, z) of a world position
#[inline]
pub fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Lift a ground-plane point back into the world at the given elevation
#[inline]
pub fn from_xz(p: Vec2, y: f32) -> Vec3 {
    Vec3::new(p.x, y, p.y)
}

/// Ground-plane direction from `from` to `to`, or `None` if they coincide
#[inline]
pub fn direction_xz(from: Vec3, to: Vec3) -> Option<Vec3> {
    geom::normalize_xz(to - from)
}
