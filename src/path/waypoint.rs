//! Route output types

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// One timed leg of a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub dest: Vec3,
    /// When to start moving toward `dest`; `None` means immediately
    pub start_at: Option<f32>,
    /// Predicted arrival at `dest`
    pub arrive_at: f32,
    /// Cosmetic; has no bearing on safety
    pub jump: bool,
}

/// When a route reaches its goal
///
/// `Unreachable` orders after every real time, so the earliest arrival is
/// simply the minimum.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Arrival {
    At(f32),
    Unreachable,
}

impl Arrival {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Arrival::At(_))
    }

    pub fn time(&self) -> Option<f32> {
        match *self {
            Arrival::At(t) => Some(t),
            Arrival::Unreachable => None,
        }
    }

    /// Strictly earlier than `other`; equal arrivals keep the incumbent
    pub fn is_better_than(&self, other: &Arrival) -> bool {
        match (self, other) {
            (Arrival::At(a), Arrival::At(b)) => a < b,
            (Arrival::At(_), Arrival::Unreachable) => true,
            (Arrival::Unreachable, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_orders_last() {
        assert!(Arrival::At(1e9) < Arrival::Unreachable);
        assert!(Arrival::At(1.0) < Arrival::At(2.0));
        assert!(Arrival::At(3.0).is_better_than(&Arrival::Unreachable));
        assert!(!Arrival::Unreachable.is_better_than(&Arrival::Unreachable));
        assert!(!Arrival::At(2.0).is_better_than(&Arrival::At(2.0)));
    }
}
