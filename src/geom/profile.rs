//! Course elevation as a function of forward progress

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::dot_xz;

/// Piecewise-linear elevation along a ground axis
///
/// Samples are `(progress, elevation)` pairs; outside the sampled range the
/// nearest end sample is held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightProfile {
    forward: Vec3,
    samples: Vec<Vec2>,
}

impl Default for HeightProfile {
    fn default() -> Self {
        Self::flat(Vec3::Z)
    }
}

impl HeightProfile {
    /// Profile along `forward` (ground unit vector); samples are sorted by progress
    pub fn new(forward: Vec3, mut samples: Vec<Vec2>) -> Self {
        samples.retain(|s| s.x.is_finite() && s.y.is_finite());
        samples.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self {
            forward: super::normalize_xz(forward).unwrap_or(Vec3::Z),
            samples,
        }
    }

    pub fn flat(forward: Vec3) -> Self {
        Self::new(forward, Vec::new())
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Signed distance of `p` along the forward axis
    #[inline]
    pub fn progress(&self, p: Vec3) -> f32 {
        dot_xz(self.forward, p)
    }

    pub fn elevation_at(&self, progress: f32) -> f32 {
        let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) else {
            return 0.0;
        };
        if progress <= first.x {
            return first.y;
        }
        if progress >= last.x {
            return last.y;
        }
        let upper = self.samples.partition_point(|s| s.x <= progress);
        let (a, b) = (self.samples[upper - 1], self.samples[upper]);
        let span = b.x - a.x;
        if span <= 0.0 {
            return b.y;
        }
        a.y + (b.y - a.y) * (progress - a.x) / span
    }

    /// World position of a ground point, at the course elevation there
    pub fn place(&self, ground: Vec2) -> Vec3 {
        let p = crate::from_xz(ground, 0.0);
        Vec3::new(p.x, self.elevation_at(self.progress(p)), p.z)
    }
}
