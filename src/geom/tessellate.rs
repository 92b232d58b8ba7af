//! Circle tessellation for anything that draws or rasterizes a circle as a polygon

use glam::Vec3;
use std::f32::consts::TAU;

use crate::consts::{MAX_CIRCLE_SEGMENTS, MIN_CIRCLE_SEGMENTS};

/// Smallest even segment count whose chords stay within `max_error` of the arc
///
/// Chord error for a segment of angle phi is `R * (1 - cos(phi / 2))`.
pub fn circle_segments(radius: f32, angular_length: f32, max_error: f32) -> u32 {
    if !(radius > 0.0) || !(angular_length > 0.0) {
        return MIN_CIRCLE_SEGMENTS;
    }
    if !(max_error > 0.0) {
        return MAX_CIRCLE_SEGMENTS;
    }
    let tess_angle = 2.0 * (1.0 - (max_error / radius).min(1.0)).acos();
    // tess_angle can collapse to zero when the error is far below float precision
    let segments = (angular_length / tess_angle)
        .ceil()
        .min(MAX_CIRCLE_SEGMENTS as f32) as u32;
    // Round up to even for symmetry
    let segments = (segments + 1) & !1;
    segments.clamp(MIN_CIRCLE_SEGMENTS, MAX_CIRCLE_SEGMENTS)
}

/// Closed polygon approximating a full circle on the ground plane, at `center.y`
pub fn circle_outline(center: Vec3, radius: f32, max_error: f32) -> Vec<Vec3> {
    let n = circle_segments(radius, TAU, max_error);
    (0..n)
        .map(|i| {
            let theta = i as f32 / n as f32 * TAU;
            center + Vec3::new(theta.sin(), 0.0, theta.cos()) * radius
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_even_and_clamped() {
        for (r, err) in [(0.5, 0.1), (5.0, 0.1), (5.0, 0.01), (100.0, 0.001), (1.0, 5.0)] {
            let n = circle_segments(r, TAU, err);
            assert_eq!(n % 2, 0, "r={r} err={err}");
            assert!((MIN_CIRCLE_SEGMENTS..=MAX_CIRCLE_SEGMENTS).contains(&n));
        }
        assert_eq!(circle_segments(1000.0, TAU, 1e-6), MAX_CIRCLE_SEGMENTS);
        assert_eq!(circle_segments(1.0, TAU, 5.0), MIN_CIRCLE_SEGMENTS);
    }

    #[test]
    fn test_segments_meet_error_bound() {
        let (r, err) = (5.0f32, 0.1f32);
        let n = circle_segments(r, TAU, err);
        let phi = TAU / n as f32;
        assert!(r * (1.0 - (phi / 2.0).cos()) <= err + 1e-5);
        // One pair fewer would break the bound
        let phi = TAU / (n - 2) as f32;
        assert!(r * (1.0 - (phi / 2.0).cos()) > err);
    }

    #[test]
    fn test_segments_degenerate() {
        assert_eq!(circle_segments(0.0, TAU, 0.1), MIN_CIRCLE_SEGMENTS);
        assert_eq!(circle_segments(5.0, TAU, 0.0), MAX_CIRCLE_SEGMENTS);
        assert_eq!(circle_segments(f32::NAN, TAU, 0.1), MIN_CIRCLE_SEGMENTS);
    }

    #[test]
    fn test_outline_on_circle() {
        let center = Vec3::new(1.0, 2.0, 3.0);
        let points = circle_outline(center, 4.0, 0.05);
        assert_eq!(points.len() as u32, circle_segments(4.0, TAU, 0.05));
        for p in points {
            assert!(((p - center).length() - 4.0).abs() < 1e-4);
            assert_eq!(p.y, center.y);
        }
    }
}
