//! A single repeating AOE: footprint plus activation schedule

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::TIME_EPSILON;
use crate::geom::{self, Intersection};

/// Footprint of a hazard on the ground plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AoeShape {
    Circle {
        radius: f32,
    },
    /// Axis-aligned square centered on the origin
    Square {
        half_side: f32,
    },
    /// Starts at the origin and extends `length` along `rotation` (0 = +z)
    Rect {
        length: f32,
        half_width: f32,
        #[serde(default)]
        rotation: f32,
    },
}

impl AoeShape {
    pub fn intersect(&self, origin: Vec3, start: Vec3, dir: Vec3) -> Intersection {
        match *self {
            AoeShape::Circle { radius } => geom::intersect_ray_circle(origin, radius, start, dir),
            AoeShape::Square { half_side } => geom::intersect_ray_square(origin, half_side, start, dir),
            AoeShape::Rect {
                length,
                half_width,
                rotation,
            } => geom::intersect_ray_rect(origin, length, half_width, rotation, start, dir),
        }
    }

    pub fn contains(&self, origin: Vec3, point: Vec3) -> bool {
        match *self {
            AoeShape::Circle { radius } => geom::circle_contains(origin, radius, point),
            AoeShape::Square { half_side } => geom::square_contains(origin, half_side, point),
            AoeShape::Rect {
                length,
                half_width,
                rotation,
            } => geom::rect_contains(origin, length, half_width, rotation, point),
        }
    }

    /// Polygon outline for display, at the origin's elevation
    pub fn outline(&self, origin: Vec3, max_error: f32) -> Vec<Vec3> {
        match *self {
            AoeShape::Circle { radius } => geom::circle_outline(origin, radius, max_error),
            AoeShape::Square { half_side } => {
                let h = half_side;
                [(-h, -h), (h, -h), (h, h), (-h, h)]
                    .into_iter()
                    .map(|(x, z)| origin + Vec3::new(x, 0.0, z))
                    .collect()
            }
            AoeShape::Rect {
                length,
                half_width,
                rotation,
            } => geom::rect_corners(origin, length, half_width, rotation).to_vec(),
        }
    }

    /// Shape has a usable (positive, finite) size
    pub fn is_valid(&self) -> bool {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        match *self {
            AoeShape::Circle { radius } => positive(radius),
            AoeShape::Square { half_side } => positive(half_side),
            AoeShape::Rect {
                length,
                half_width,
                rotation,
            } => positive(length) && positive(half_width) && rotation.is_finite(),
        }
    }
}

/// One hazard instance within a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatingAoe {
    pub shape: AoeShape,
    pub origin: Vec3,
    /// Seconds between activations of the whole sequence
    pub repeat: f32,
    /// Seconds from this member's activation to the next member's
    pub seq_delay: f32,
    /// How long an activation stays live (0 = instantaneous strike)
    #[serde(default)]
    pub duration: f32,
    /// Predicted activation; `None` until the sequence has been observed
    #[serde(default)]
    pub next_activation: Option<f32>,
}

impl RepeatingAoe {
    pub fn new(shape: AoeShape, origin: Vec3, seq_delay: f32) -> Self {
        Self {
            shape,
            origin,
            repeat: 0.0,
            seq_delay,
            duration: 0.0,
            next_activation: None,
        }
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration.max(0.0);
        self
    }

    #[inline]
    pub fn intersect(&self, start: Vec3, dir: Vec3) -> Intersection {
        self.shape.intersect(self.origin, start, dir)
    }

    #[inline]
    pub fn contains(&self, point: Vec3) -> bool {
        self.shape.contains(self.origin, point)
    }

    pub fn outline(&self, max_error: f32) -> Vec<Vec3> {
        self.shape.outline(self.origin, max_error)
    }

    /// Seconds from `at` until the first activation at or after `at`
    ///
    /// Walks the schedule backward or forward by `repeat`, so `at` may lie on
    /// either side of `next_activation`. `None` when the schedule is unknown,
    /// or when a non-repeating hazard has already fired.
    pub fn time_until_activation(&self, at: f32) -> Option<f32> {
        let next = self.next_activation?;
        let until = next - at;
        if self.repeat > 0.0 {
            Some(until.rem_euclid(self.repeat))
        } else if until >= 0.0 {
            Some(until)
        } else {
            None
        }
    }

    /// Start (relative to `at`) of the first activation window overlapping
    /// the open interval `(at + min, at + max)`
    ///
    /// The returned value is below `min` when the hazard is already live at
    /// `at + min`. An activation that ends exactly when the interval starts,
    /// or starts exactly when it ends, does not overlap.
    pub fn overlapping_activation(&self, at: f32, min: f32, max: f32) -> Option<f32> {
        if max < 0.0 {
            return None;
        }
        let min = min.max(0.0);
        if max <= min {
            return None;
        }
        let window_start = at + min;
        let until = self.time_until_activation(window_start - self.duration)?;
        let mut activation = window_start - self.duration + until;
        if activation + self.duration <= window_start + TIME_EPSILON {
            if self.repeat <= 0.0 {
                return None;
            }
            activation += self.repeat;
        }
        if activation < at + max - TIME_EPSILON {
            Some(activation - at)
        } else {
            None
        }
    }

    /// Wait after `at + min` until the hazard stops being live, if it is live
    /// at any point of `(at + min, at + max)`
    pub fn live_overlap(&self, at: f32, min: f32, max: f32) -> Option<f32> {
        let activation = self.overlapping_activation(at, min, max)?;
        Some((activation + self.duration - min.max(0.0)).max(0.0))
    }

    #[inline]
    pub fn is_live_during(&self, at: f32, min: f32, max: f32) -> bool {
        self.overlapping_activation(at, min, max).is_some()
    }

    /// Whether an activation window touches `at`, give or take `TIME_EPSILON`
    ///
    /// Unlike `is_live_during` the boundaries are closed; this is the test for
    /// an agent that is standing inside the footprint at `at`.
    pub fn is_live_at(&self, at: f32) -> bool {
        let from = at - TIME_EPSILON - self.duration;
        self.time_until_activation(from)
            .is_some_and(|until| until <= self.duration + 2.0 * TIME_EPSILON)
    }

    /// Seconds from `now` until this hazard is live somewhere on the stretch an
    /// agent starting at `start` would cover moving along `dir` at `speed`
    ///
    /// `None` if the ray never crosses the footprint, the schedule is unknown,
    /// or no activation falls inside the crossing.
    pub fn time_until_overlap(&self, start: Vec3, dir: Vec3, now: f32, speed: f32) -> Option<f32> {
        if !(speed > 0.0) {
            return None;
        }
        let hit = self.intersect(start, dir);
        if !hit.is_ahead() {
            return None;
        }
        let min = hit.enter.max(0.0) / speed;
        let max = hit.exit / speed;
        self.overlapping_activation(now, min, max).map(|a| a.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn circle_at_10(next: Option<f32>) -> RepeatingAoe {
        let mut aoe = RepeatingAoe::new(AoeShape::Circle { radius: 5.0 }, Vec3::new(0.0, 0.0, 10.0), 2.5);
        aoe.repeat = 2.5;
        aoe.next_activation = next;
        aoe
    }

    #[test]
    fn test_unknown_schedule_never_overlaps() {
        let aoe = circle_at_10(None);
        assert_eq!(aoe.time_until_activation(0.0), None);
        assert!(!aoe.is_live_during(0.0, 0.0, 100.0));
    }

    #[test]
    fn test_live_at_closes_the_boundary() {
        let aoe = circle_at_10(Some(0.0008));
        // The open window test ignores a strike this close to its start
        assert!(!aoe.is_live_during(0.0, 0.0, 1.0));
        assert!(aoe.is_live_at(0.0));
        assert!(aoe.is_live_at(2.5));
        assert!(!aoe.is_live_at(1.0));
        assert!(!circle_at_10(None).is_live_at(0.0));

        let lasting = circle_at_10(Some(1.0)).with_duration(0.5);
        assert!(lasting.is_live_at(1.4));
        assert!(!lasting.is_live_at(1.6));
    }

    #[test]
    fn test_time_until_walks_both_ways() {
        let aoe = circle_at_10(Some(10.0));
        assert!((aoe.time_until_activation(9.0).unwrap() - 1.0).abs() < 1e-5);
        // Earlier than next_activation by more than a period
        assert!((aoe.time_until_activation(4.0).unwrap() - 1.0).abs() < 1e-5);
        // After next_activation
        assert!((aoe.time_until_activation(11.0).unwrap() - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_not_live_right_after_hit() {
        // Hit observed at t=0, so the next activation is at 2.5
        let aoe = circle_at_10(Some(2.5));
        assert!(!aoe.is_live_during(0.0, 1.0, 1.2));
        assert!(aoe.is_live_during(0.0, 2.0, 3.0));
    }

    #[test]
    fn test_activation_on_boundary_does_not_overlap() {
        let aoe = circle_at_10(Some(2.5));
        assert!(!aoe.is_live_during(0.0, 2.5, 3.0));
        assert!(!aoe.is_live_during(0.0, 1.0, 2.5));
    }

    #[test]
    fn test_window_spanning_period_boundary() {
        // Window covers the tail of one cycle and the head of the next
        let aoe = circle_at_10(Some(2.5));
        assert!(aoe.is_live_during(0.0, 4.9, 5.1));
        let wait = aoe.live_overlap(0.0, 4.9, 5.1).unwrap();
        assert!((wait - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_live_overlap_with_duration() {
        let aoe = circle_at_10(Some(2.0)).with_duration(0.5);
        // Already live at the start of the window
        let wait = aoe.live_overlap(0.0, 2.2, 2.3).unwrap();
        assert!((wait - 0.3).abs() < 1e-4);
        // Window opens after the activation ended
        assert!(!aoe.is_live_during(0.0, 2.5, 4.4));
    }

    #[test]
    fn test_non_repeating_fires_once() {
        let mut aoe = circle_at_10(Some(3.0));
        aoe.repeat = 0.0;
        assert!(aoe.is_live_during(0.0, 2.0, 4.0));
        assert!(!aoe.is_live_during(5.0, 0.0, 100.0));
    }

    #[test]
    fn test_time_until_overlap_along_ray() {
        let aoe = circle_at_10(Some(2.0));
        // Crossing at speed 6 spans [5/6, 15/6]
        let t = aoe.time_until_overlap(Vec3::ZERO, Vec3::Z, 0.0, 6.0).unwrap();
        assert!((t - 2.0).abs() < 1e-4);
        // Walking away from it
        assert_eq!(aoe.time_until_overlap(Vec3::ZERO, -Vec3::Z, 0.0, 6.0), None);
    }

    #[test]
    fn test_shape_validity() {
        assert!(AoeShape::Circle { radius: 1.0 }.is_valid());
        assert!(!AoeShape::Square { half_side: 0.0 }.is_valid());
        assert!(!AoeShape::Rect { length: 3.0, half_width: f32::NAN, rotation: 0.0 }.is_valid());
    }

    #[test]
    fn test_shape_serde_tagged() {
        let json = r#"{"kind":"rect","length":3.5,"half_width":1.5}"#;
        let shape: AoeShape = serde_json::from_str(json).unwrap();
        assert_eq!(shape, AoeShape::Rect { length: 3.5, half_width: 1.5, rotation: 0.0 });
    }

    proptest! {
        #[test]
        fn prop_wait_clears_live_window(
            next in 0.0f32..10.0,
            repeat in 2.0f32..6.0,
            duration in 0.0f32..1.0,
            at in 0.0f32..10.0,
            min in 0.0f32..3.0,
            span in 0.05f32..1.0,
        ) {
            let mut aoe = circle_at_10(Some(next)).with_duration(duration);
            aoe.repeat = repeat;
            if let Some(activation) = aoe.overlapping_activation(at, min, min + span) {
                let wait = aoe.live_overlap(at, min, min + span).unwrap();
                // Post-wait window starts at or after the activation ends
                prop_assert!(min + wait >= activation + duration - 1e-3);
            }
        }
    }
}
