//! Route planning
//!
//! Two strategies sit behind `Planner`: the analytic `RecursivePlanner`, which
//! walks a venue's stage tree, and the `GridPlanner`, which searches a
//! voxelised space-time grid. Both are pure functions of the hazard model, the
//! agent's position and the current time.

pub mod grid;
pub mod solver;
pub mod stage;

pub use grid::{GridPlanner, GridSpec, GroundRect, Obstacle, SpacetimeGrid};
pub use solver::RecursivePlanner;
pub use stage::{Course, Route, Stage};

use glam::Vec3;
use serde::Serialize;

use crate::hazard::HazardModel;
use crate::path::{Arrival, Waypoint};

/// Outcome of one planning pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub waypoints: Vec<Waypoint>,
    pub arrival: Arrival,
    /// Branch labels of the chosen route, e.g. `root>left>lane2`
    pub label: String,
}

impl Plan {
    /// "No safe route currently known"
    pub fn unreachable(label: impl Into<String>) -> Self {
        Self {
            waypoints: Vec::new(),
            arrival: Arrival::Unreachable,
            label: label.into(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.arrival.is_reachable()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::unreachable("")
    }
}

/// A route-building strategy
pub trait Planner: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Build a route from `start` at time `now` against the current hazard predictions
    fn plan(&self, model: &HazardModel, start: Vec3, now: f32) -> Plan;
}
