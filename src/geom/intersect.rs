//! Ray versus hazard footprint intersection
//!
//! A ray is `(start, dir)` on the ground plane. Results are signed distances
//! along the ray: `enter <= exit`, `enter < 0` means the ray starts inside,
//! and a NaN pair (`Intersection::MISS`) means the line never touches the shape.

use glam::Vec3;

use super::{dot_xz, length_xz_squared, max_abs_coord_xz, normalize_xz};
use crate::consts::{LENGTH_EPSILON, PARALLEL_THRESHOLD};

/// Signed distances along a ray to where it enters and exits a shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub enter: f32,
    pub exit: f32,
}

impl Intersection {
    pub const MISS: Self = Self {
        enter: f32::NAN,
        exit: f32::NAN,
    };

    /// Build from raw distances; anything but an ordered, non-NaN pair is a miss
    pub fn new(enter: f32, exit: f32) -> Self {
        if enter <= exit {
            Self { enter, exit }
        } else {
            Self::MISS
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        !self.enter.is_nan() && !self.exit.is_nan()
    }

    /// Ray origin is strictly inside the shape
    #[inline]
    pub fn starts_inside(&self) -> bool {
        self.is_hit() && self.enter < 0.0 && self.exit > 0.0
    }

    /// Some part of the shape lies ahead of the ray origin
    #[inline]
    pub fn is_ahead(&self) -> bool {
        self.is_hit() && self.exit > 0.0
    }

    /// Clip to the `[0, len]` stretch of the ray actually travelled
    pub fn clip(&self, len: f32) -> Option<(f32, f32)> {
        if !self.is_hit() || self.exit <= 0.0 || self.enter >= len {
            return None;
        }
        Some((self.enter.max(0.0), self.exit.min(len)))
    }
}

/// Closed-form ray/circle crossing
pub fn intersect_ray_circle(origin: Vec3, radius: f32, start: Vec3, dir: Vec3) -> Intersection {
    let Some(dir) = normalize_xz(dir) else {
        return Intersection::MISS;
    };
    if !(radius > 0.0) {
        return Intersection::MISS;
    }
    let oa = start - origin;
    let dir_dot_oa = dot_xz(dir, oa);
    let discriminant = dir_dot_oa * dir_dot_oa - length_xz_squared(oa) + radius * radius;
    if !(discriminant >= 0.0) {
        return Intersection::MISS;
    }
    let d = discriminant.sqrt();
    Intersection::new(-dir_dot_oa - d, -dir_dot_oa + d)
}

/// Slab range for one axis of an axis-aligned square
fn slab(offset: f32, dir: f32, half_side: f32) -> Option<(f32, f32)> {
    if dir > PARALLEL_THRESHOLD {
        Some(((-half_side - offset) / dir, (half_side - offset) / dir))
    } else if dir < -PARALLEL_THRESHOLD {
        Some(((half_side - offset) / dir, (-half_side - offset) / dir))
    } else if offset.abs() <= half_side {
        // Running parallel inside the slab: never leaves it along this axis
        Some((f32::MIN, f32::MAX))
    } else {
        None
    }
}

/// Slab test against an axis-aligned square
pub fn intersect_ray_square(origin: Vec3, half_side: f32, start: Vec3, dir: Vec3) -> Intersection {
    let Some(dir) = normalize_xz(dir) else {
        return Intersection::MISS;
    };
    if !(half_side > 0.0) {
        return Intersection::MISS;
    }
    let oa = start - origin;
    match (slab(oa.x, dir.x, half_side), slab(oa.z, dir.z, half_side)) {
        (Some((enter_x, exit_x)), Some((enter_z, exit_z))) => {
            Intersection::new(enter_x.max(enter_z), exit_x.min(exit_z))
        }
        _ => Intersection::MISS,
    }
}

/// Corners of a rectangle that starts at `origin` and extends `length` along
/// `rotation` (0 = +z), `half_width` to either side
///
/// Edges taken in order `(d, a), (a, b), (b, c), (c, d)` all have their
/// inward normal on the left of `(edge.z, -edge.x)`.
pub fn rect_corners(origin: Vec3, length: f32, half_width: f32, rotation: f32) -> [Vec3; 4] {
    let rd = Vec3::new(rotation.sin(), 0.0, rotation.cos());
    let rn = Vec3::new(rd.z, 0.0, -rd.x);
    let a = origin + half_width * rn;
    let b = origin - half_width * rn;
    let c = b + rd * length;
    let d = a + rd * length;
    [a, b, c, d]
}

fn edges(corners: &[Vec3; 4]) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
    (0..corners.len()).map(move |i| (corners[(i + corners.len() - 1) % corners.len()], corners[i]))
}

#[inline]
fn inward_normal(p: Vec3, q: Vec3) -> Vec3 {
    let ed = q - p;
    Vec3::new(ed.z, 0.0, -ed.x)
}

/// Parameter along segment `a -> b` where the ray's supporting line crosses it
fn intersect_ray_segment(a: Vec3, b: Vec3, start: Vec3, dir: Vec3) -> Option<f32> {
    let ray_normal = Vec3::new(dir.z, 0.0, -dir.x);
    let denom = dot_xz(ray_normal, b - a);
    if denom.abs() < LENGTH_EPSILON {
        return None;
    }
    Some(dot_xz(ray_normal, start - a) / denom)
}

/// Edge-by-edge crossing of a rotated rectangle
///
/// Convexity means the line crosses at most one entering and one exiting edge.
pub fn intersect_ray_rect(
    origin: Vec3,
    length: f32,
    half_width: f32,
    rotation: f32,
    start: Vec3,
    dir: Vec3,
) -> Intersection {
    let Some(dir) = normalize_xz(dir) else {
        return Intersection::MISS;
    };
    if !(length > 0.0 && half_width > 0.0) {
        return Intersection::MISS;
    }
    let corners = rect_corners(origin, length, half_width, rotation);
    let mut enter = f32::NAN;
    let mut exit = f32::NAN;
    for (p, q) in edges(&corners) {
        let Some(t) = intersect_ray_segment(p, q, start, dir) else {
            continue;
        };
        if !(0.0..=1.0).contains(&t) {
            continue;
        }
        let hit = p + (q - p) * t;
        let dist = dot_xz(hit - start, dir);
        if dot_xz(inward_normal(p, q), dir) > 0.0 {
            enter = dist;
        } else {
            exit = dist;
        }
    }
    Intersection::new(enter, exit)
}

#[inline]
pub fn circle_contains(origin: Vec3, radius: f32, point: Vec3) -> bool {
    length_xz_squared(point - origin) <= radius * radius
}

#[inline]
pub fn square_contains(origin: Vec3, half_side: f32, point: Vec3) -> bool {
    max_abs_coord_xz(point - origin) <= half_side
}

pub fn rect_contains(origin: Vec3, length: f32, half_width: f32, rotation: f32, point: Vec3) -> bool {
    let corners = rect_corners(origin, length, half_width, rotation);
    edges(&corners).all(|(p, q)| dot_xz(inward_normal(p, q), point - p) >= 0.0)
}
