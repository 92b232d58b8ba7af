//! Voxelised space-time grid and the breadth-first planner over it
//!
//! Cells are `resolution` units square on the ground plane; one time slice is
//! the time the agent needs to cross one cell, so every move between
//! 4-connected neighbours takes exactly one slice. Static terrain is blocked for
//! the whole horizon; hazards are rasterised from their predicted activations
//! on every planning pass.

use std::collections::{HashMap, VecDeque};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::{Plan, Planner};
use crate::consts::{MAX_GRID_VOXELS, SPEED};
use crate::error::{ConfigError, ConfigResult};
use crate::geom::{HeightProfile, polygon_contains, rect_corners};
use crate::hazard::{AoeShape, HazardModel, RepeatingAoe};
use crate::path::PathBuilder;
use crate::{from_xz, xz};

fn default_resolution() -> f32 {
    1.0
}

fn default_horizon() -> f32 {
    30.0
}

/// Axis-aligned ground rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundRect {
    pub min: Vec2,
    pub max: Vec2,
}

/// Grid extent and resolution, as found in venue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub center: Vec2,
    pub half_extent: Vec2,
    /// Cell size in world units
    #[serde(default = "default_resolution")]
    pub resolution: f32,
    /// Seconds of future covered by the grid
    #[serde(default = "default_horizon")]
    pub horizon: f32,
    /// Padding around each activation window; defaults to one time slice
    #[serde(default)]
    pub leeway: Option<f32>,
    /// Permanently impassable terrain
    #[serde(default)]
    pub blocked: Vec<Obstacle>,
}

/// Static terrain footprint, blocked for the whole horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Obstacle {
    Rect(GroundRect),
    /// Any hazard-style shape, e.g. a column or a rotated slab
    Footprint { shape: AoeShape, center: Vec2 },
    /// Arbitrary ground polygon (trapezia, diamonds)
    Polygon { points: Vec<Vec2> },
}

impl Obstacle {
    pub fn contains(&self, p: Vec2) -> bool {
        match self {
            Obstacle::Rect(r) => p.cmpge(r.min).all() && p.cmple(r.max).all(),
            Obstacle::Footprint { shape, center } => shape.contains(from_xz(*center, 0.0), from_xz(p, 0.0)),
            Obstacle::Polygon { points } => polygon_contains(points, p),
        }
    }

    /// Ground bounding box
    pub fn bounds(&self) -> (Vec2, Vec2) {
        match self {
            Obstacle::Rect(r) => (r.min, r.max),
            Obstacle::Footprint { shape, center } => shape_bounds(*shape, from_xz(*center, 0.0)),
            Obstacle::Polygon { points } => (
                points.iter().fold(Vec2::splat(f32::INFINITY), |m, &c| m.min(c)),
                points.iter().fold(Vec2::splat(f32::NEG_INFINITY), |m, &c| m.max(c)),
            ),
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            Obstacle::Rect(r) => r.min.is_finite() && r.max.is_finite(),
            Obstacle::Footprint { shape, center } => shape.is_valid() && center.is_finite(),
            Obstacle::Polygon { points } => points.len() >= 3 && points.iter().all(|p| p.is_finite()),
        }
    }
}

impl GridSpec {
    pub fn is_valid(&self) -> bool {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        positive(self.resolution)
            && positive(self.horizon)
            && positive(self.half_extent.x)
            && positive(self.half_extent.y)
            && self.center.is_finite()
            && self.leeway.is_none_or(|l| l.is_finite() && l >= 0.0)
            && self.blocked.iter().all(Obstacle::is_valid)
    }
}

/// Ground cell coordinates
pub type Cell = (i32, i32);

/// Space x space x time bitset of blocked voxels
#[derive(Debug, Clone)]
pub struct SpacetimeGrid {
    center: Vec2,
    resolution: f32,
    time_resolution: f32,
    width: usize,
    depth: usize,
    duration: usize,
    voxels: Vec<u64>,
}

impl SpacetimeGrid {
    /// `None` when the dimensions are not finite or the grid would exceed
    /// `MAX_GRID_VOXELS`
    pub fn new(center: Vec2, half_extent: Vec2, resolution: f32, time_resolution: f32, horizon: f32) -> Option<Self> {
        let cells = |extent: f32, step: f32| {
            let n = (extent / step).ceil();
            (n.is_finite() && n < MAX_GRID_VOXELS as f32).then(|| (n as usize).max(1))
        };
        let width = 2 * cells(half_extent.x, resolution)?;
        let depth = 2 * cells(half_extent.y, resolution)?;
        let duration = cells(horizon, time_resolution)?;
        let bits = width.checked_mul(depth)?.checked_mul(duration)?;
        if bits > MAX_GRID_VOXELS {
            return None;
        }
        Some(Self {
            center,
            resolution,
            time_resolution,
            width,
            depth,
            duration,
            voxels: vec![0; bits.div_ceil(64)],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn duration(&self) -> usize {
        self.duration
    }

    pub fn time_resolution(&self) -> f32 {
        self.time_resolution
    }

    fn index(&self, (x, z): Cell, t: usize) -> Option<usize> {
        if x < 0 || z < 0 || x as usize >= self.width || z as usize >= self.depth || t >= self.duration {
            return None;
        }
        Some((t * self.depth + z as usize) * self.width + x as usize)
    }

    /// Out-of-bounds voxels count as blocked
    pub fn is_blocked(&self, cell: Cell, t: usize) -> bool {
        self.index(cell, t)
            .map(|i| self.voxels[i / 64] & (1 << (i % 64)) != 0)
            .unwrap_or(true)
    }

    pub fn block(&mut self, cell: Cell, t: usize) {
        if let Some(i) = self.index(cell, t) {
            self.voxels[i / 64] |= 1 << (i % 64);
        }
    }

    pub fn world_to_cell(&self, p: Vec3) -> Option<Cell> {
        let half = Vec2::new((self.width / 2) as f32, (self.depth / 2) as f32);
        let frac = half + (xz(p) - self.center) / self.resolution;
        if !frac.is_finite() {
            return None;
        }
        let cell = (frac.x.floor() as i32, frac.y.floor() as i32);
        self.index(cell, 0).map(|_| cell)
    }

    pub fn cell_center(&self, (x, z): Cell) -> Vec2 {
        let half = Vec2::new((self.width / 2) as f32, (self.depth / 2) as f32);
        self.center + (Vec2::new(x as f32, z as f32) - half + 0.5) * self.resolution
    }

    /// Slices touched by `[start, end]` seconds from the grid origin
    fn slices(&self, start: f32, end: f32) -> Option<(usize, usize)> {
        let last = self.duration as f32 - 1.0;
        let begin = (start / self.time_resolution).floor();
        let end = (end / self.time_resolution).floor();
        if end < 0.0 || begin > last {
            return None;
        }
        Some((begin.clamp(0.0, last) as usize, end.clamp(0.0, last) as usize))
    }

    /// Block every cell within `[min, max]` whose area touches `shape`, for
    /// each `(start, end)` window
    ///
    /// A cell touches the shape when its center or one of its corners is
    /// inside. Returns false when no window falls within the horizon.
    pub fn block_inside(&mut self, min: Vec2, max: Vec2, shape: impl Fn(Vec2) -> bool, windows: &[(f32, f32)]) -> bool {
        let slices: Vec<(usize, usize)> = windows.iter().filter_map(|&(s, e)| self.slices(s, e)).collect();
        if slices.is_empty() {
            return false;
        }
        let half = Vec2::new((self.width / 2) as f32, (self.depth / 2) as f32);
        let lo = (half + (min - self.center) / self.resolution).floor();
        let hi = (half + (max - self.center) / self.resolution).ceil();
        let x_range = (lo.x.max(0.0) as i32)..=(hi.x.min(self.width as f32 - 1.0) as i32);
        let z_range = (lo.y.max(0.0) as i32)..=(hi.y.min(self.depth as f32 - 1.0) as i32);

        let corner = 0.5 * self.resolution;
        for z in z_range {
            for x in x_range.clone() {
                let c = self.cell_center((x, z));
                let touches = shape(c)
                    || [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                        .iter()
                        .any(|&(dx, dz)| shape(c + Vec2::new(dx, dz) * corner));
                if !touches {
                    continue;
                }
                for &(t0, t1) in &slices {
                    for t in t0..=t1 {
                        self.block((x, z), t);
                    }
                }
            }
        }
        true
    }

    /// Permanently impassable terrain
    pub fn block_static(&mut self, obstacle: &Obstacle) -> bool {
        let horizon = self.duration as f32 * self.time_resolution;
        let (min, max) = obstacle.bounds();
        self.block_inside(min, max, |p| obstacle.contains(p), &[(0.0, horizon)])
    }

    /// Rasterise every predicted activation of `aoe` within the horizon,
    /// relative to `now`; returns false for hazards with no known schedule
    pub fn block_hazard(&mut self, aoe: &RepeatingAoe, now: f32, leeway: f32) -> bool {
        // Include an activation that started before `now` but is still live
        let Some(until) = aoe.time_until_activation(now - aoe.duration) else {
            return false;
        };
        let horizon = self.duration as f32 * self.time_resolution;
        let first = until - aoe.duration;
        let window = |start: f32| (start - leeway, start + aoe.duration + leeway);
        let count = if aoe.repeat > 0.0 {
            ((horizon - first) / aoe.repeat).ceil().max(1.0)
        } else {
            1.0
        };
        let windows: Vec<(f32, f32)> = if count > self.duration as f32 {
            // At least one activation per slice
            vec![(first - leeway, horizon)]
        } else {
            (0..count as usize).map(|k| window(first + k as f32 * aoe.repeat)).collect()
        };
        let (min, max) = shape_bounds(aoe.shape, aoe.origin);
        self.block_inside(min, max, |p| aoe.contains(from_xz(p, aoe.origin.y)), &windows)
    }

    /// Earliest sequence of `(cell, slice)` states from `start` at slice 0 to `goal`
    ///
    /// Every transition (a wait or a 4-neighbour move) advances one slice, so
    /// plain breadth-first order is also time order.
    pub fn search(&self, start: Cell, goal: Cell) -> Option<Vec<(Cell, usize)>> {
        const STEPS: [(i32, i32); 5] = [(0, 0), (0, 1), (1, 0), (-1, 0), (0, -1)];
        let start_idx = self.index(start, 0)?;
        self.index(goal, 0)?;

        let mut visited = vec![0u64; self.voxels.len()];
        let mut parents: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        visited[start_idx / 64] |= 1 << (start_idx % 64);
        queue.push_back((start, 0usize, start_idx));

        while let Some((cell, t, idx)) = queue.pop_front() {
            if cell == goal {
                let mut states = vec![(cell, t)];
                let mut cur = idx;
                while let Some(&prev) = parents.get(&cur) {
                    let plane = self.width * self.depth;
                    let slice = prev / plane;
                    let rem = prev % plane;
                    states.push((((rem % self.width) as i32, (rem / self.width) as i32), slice));
                    cur = prev;
                }
                states.reverse();
                return Some(states);
            }
            if t + 1 >= self.duration {
                continue;
            }
            for (dx, dz) in STEPS {
                let next = (cell.0 + dx, cell.1 + dz);
                // Entering a cell occupies it for both slices of the transition
                let moving = (dx, dz) != (0, 0);
                if self.is_blocked(next, t + 1) || (moving && self.is_blocked(next, t)) {
                    continue;
                }
                let Some(next_idx) = self.index(next, t + 1) else {
                    continue;
                };
                if visited[next_idx / 64] & (1 << (next_idx % 64)) != 0 {
                    continue;
                }
                visited[next_idx / 64] |= 1 << (next_idx % 64);
                parents.insert(next_idx, idx);
                queue.push_back((next, t + 1, next_idx));
            }
        }
        None
    }
}

/// Ground bounding box of a shape placed at `origin`
fn shape_bounds(shape: AoeShape, origin: Vec3) -> (Vec2, Vec2) {
    let o = xz(origin);
    match shape {
        AoeShape::Circle { radius } => (o - radius, o + radius),
        AoeShape::Square { half_side } => (o - half_side, o + half_side),
        AoeShape::Rect {
            length,
            half_width,
            rotation,
        } => {
            let corners = rect_corners(origin, length, half_width, rotation).map(xz);
            let min = corners.iter().fold(Vec2::splat(f32::INFINITY), |m, &c| m.min(c));
            let max = corners.iter().fold(Vec2::splat(f32::NEG_INFINITY), |m, &c| m.max(c));
            (min, max)
        }
    }
}

/// Planner searching the space-time grid toward a fixed goal
#[derive(Debug, Clone)]
pub struct GridPlanner {
    terrain: SpacetimeGrid,
    goal: Vec3,
    profile: HeightProfile,
    speed: f32,
    leeway: f32,
}

impl GridPlanner {
    pub fn new(spec: &GridSpec, goal: Vec3, profile: HeightProfile) -> ConfigResult<Self> {
        Self::with_speed(spec, goal, profile, SPEED)
    }

    pub fn with_speed(spec: &GridSpec, goal: Vec3, profile: HeightProfile, speed: f32) -> ConfigResult<Self> {
        if !spec.is_valid() {
            return Err(ConfigError::InvalidGrid("extent, resolution, horizon and obstacles must be valid"));
        }
        let speed = if speed > 0.0 && speed.is_finite() { speed } else { SPEED };
        let time_resolution = spec.resolution / speed;
        let mut terrain = SpacetimeGrid::new(spec.center, spec.half_extent, spec.resolution, time_resolution, spec.horizon)
            .ok_or(ConfigError::InvalidGrid("too many voxels; raise the resolution or shorten the horizon"))?;
        for obstacle in &spec.blocked {
            terrain.block_static(obstacle);
        }
        Ok(Self {
            terrain,
            goal,
            profile,
            speed,
            leeway: spec.leeway.unwrap_or(time_resolution),
        })
    }

    pub fn goal(&self) -> Vec3 {
        self.goal
    }

    /// Turn a state sequence into waypoints, one per straight run
    fn build_route(&self, states: &[(Cell, usize)], start: Vec3, now: f32, grid: &SpacetimeGrid) -> PathBuilder {
        let dt = grid.time_resolution();
        let mut pb = PathBuilder::new(start, now, "grid").with_speed(self.speed);
        let mut i = 0;
        while i + 1 < states.len() {
            let step = |k: usize| (states[k + 1].0.0 - states[k].0.0, states[k + 1].0.1 - states[k].0.1);
            let dir = step(i);
            if dir == (0, 0) {
                i += 1;
                continue;
            }
            let depart = states[i].1;
            let mut j = i;
            while j + 1 < states.len() && step(j) == dir {
                j += 1;
            }
            let scheduled = now + depart as f32 * dt;
            pb.wait(scheduled - (pb.time() + pb.pending_delay()));
            let dest = if j + 1 == states.len() {
                self.goal
            } else {
                self.profile.place(grid.cell_center(states[j].0))
            };
            pb.move_to(dest);
            i = j;
        }
        if (pb.pos() - self.goal).length_squared() > 1e-6 {
            pb.move_to(self.goal);
        }
        pb
    }
}

impl Planner for GridPlanner {
    fn name(&self) -> &str {
        "grid"
    }

    fn plan(&self, model: &HazardModel, start: Vec3, now: f32) -> Plan {
        let mut grid = self.terrain.clone();
        let rasterised = model
            .hazards()
            .filter(|(_, aoe)| grid.block_hazard(aoe, now, self.leeway))
            .count();
        log::trace!("Rasterised {rasterised} hazards into the grid");

        let (Some(from), Some(to)) = (grid.world_to_cell(start), grid.world_to_cell(self.goal)) else {
            log::debug!("Start or goal outside the grid");
            return Plan::unreachable("grid");
        };
        let Some(states) = grid.search(from, to) else {
            return Plan::unreachable("grid");
        };
        let pb = self.build_route(&states, start, now, &grid);
        Plan {
            label: pb.label().to_string(),
            arrival: pb.finish(),
            waypoints: pb.into_waypoints(),
        }
    }
}
