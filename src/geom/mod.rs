//! Ground-plane geometry
//!
//! Everything here is pure. World positions are `Vec3` with `y` as elevation;
//! intersection math only looks at the (x, z) ground plane.

pub mod intersect;
pub mod profile;
pub mod tessellate;

pub use intersect::{
    Intersection, circle_contains, intersect_ray_circle, intersect_ray_rect, intersect_ray_square,
    rect_contains, rect_corners, square_contains,
};
pub use profile::HeightProfile;
pub use tessellate::{circle_outline, circle_segments};

use glam::{Vec2, Vec3};

use crate::consts::LENGTH_EPSILON;

#[inline]
pub fn dot_xz(a: Vec3, b: Vec3) -> f32 {
    a.x * b.x + a.z * b.z
}

#[inline]
pub fn length_xz_squared(v: Vec3) -> f32 {
    v.x * v.x + v.z * v.z
}

#[inline]
pub fn length_xz(v: Vec3) -> f32 {
    length_xz_squared(v).sqrt()
}

/// Unit ground-plane direction (y = 0), or `None` for a (near) zero-length vector
pub fn normalize_xz(v: Vec3) -> Option<Vec3> {
    let len = length_xz(v);
    if !len.is_finite() || len < LENGTH_EPSILON {
        return None;
    }
    Some(Vec3::new(v.x / len, 0.0, v.z / len))
}

/// Larger of |x| and |z|
#[inline]
pub fn max_abs_coord_xz(v: Vec3) -> f32 {
    v.x.abs().max(v.z.abs())
}

/// Point where the line through `a` and `b` crosses the plane `z = const`
///
/// `None` when the line runs parallel to the plane.
pub fn intersect_z_plane(a: Vec3, b: Vec3, z: f32) -> Option<Vec3> {
    let ab = b - a;
    if ab.z.abs() < LENGTH_EPSILON {
        return None;
    }
    let t = (z - a.z) / ab.z;
    Some(a + ab * t)
}

/// Even-odd point-in-polygon test on ground-plane points
///
/// Vertices may wind either way; fewer than three never contain anything.
pub fn polygon_contains(points: &[Vec2], p: Vec2) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for (i, &a) in points.iter().enumerate() {
        let b = points[j];
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[inline]
pub fn clamp_x(v: Vec3, min: f32, max: f32) -> Vec3 {
    Vec3::new(v.x.clamp(min, max), v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_xz_ignores_elevation() {
        let dir = normalize_xz(Vec3::new(3.0, 100.0, 4.0)).unwrap();
        assert!((dir.x - 0.6).abs() < 1e-6);
        assert_eq!(dir.y, 0.0);
        assert!((dir.z - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_xz_degenerate() {
        assert!(normalize_xz(Vec3::new(0.0, 5.0, 0.0)).is_none());
        assert!(normalize_xz(Vec3::new(f32::NAN, 0.0, 1.0)).is_none());
    }

    #[test]
    fn test_intersect_z_plane() {
        let p = intersect_z_plane(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 4.0, 10.0), 5.0).unwrap();
        assert!((p - Vec3::new(1.0, 2.0, 5.0)).length() < 1e-5);

        // Parallel to the plane
        assert!(intersect_z_plane(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 5.0).is_none());
    }

    #[test]
    fn test_clamp_x_keeps_other_axes() {
        let v = clamp_x(Vec3::new(12.0, 3.0, -7.0), -5.0, 5.0);
        assert_eq!(v, Vec3::new(5.0, 3.0, -7.0));
    }

    #[test]
    fn test_polygon_contains_trapezium() {
        let trapezium = [
            Vec2::new(-4.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(2.0, 3.0),
            Vec2::new(-2.0, 3.0),
        ];
        assert!(polygon_contains(&trapezium, Vec2::new(0.0, 1.5)));
        assert!(polygon_contains(&trapezium, Vec2::new(3.0, 0.5)));
        assert!(!polygon_contains(&trapezium, Vec2::new(3.0, 2.5)));
        assert!(!polygon_contains(&trapezium, Vec2::new(0.0, -0.1)));
        assert!(!polygon_contains(&trapezium[..2], Vec2::new(0.0, 0.0)));
    }

    #[test]
    fn test_max_abs_coord_xz() {
        assert_eq!(max_abs_coord_xz(Vec3::new(-6.0, 99.0, 2.0)), 6.0);
    }
}
