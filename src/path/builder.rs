//! Append-only, branchable timeline of timed waypoints
//!
//! The builder keeps a cursor (position and time) that only ever moves
//! forward in time. Alternatives are explored on branches that start at the
//! parent's cursor; only the branch that wins is merged back.

use glam::Vec3;

use super::waypoint::{Arrival, Waypoint};
use crate::consts::{INV_SPEED, LENGTH_EPSILON};
use crate::geom::{length_xz, normalize_xz};
use crate::hazard::{HazardId, RepeatingAoe};

/// Cursor snapshot used to check everything emitted after it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mark {
    index: usize,
    pos: Vec3,
    time: f32,
}

#[derive(Debug, Clone)]
pub struct PathBuilder {
    label: String,
    pos: Vec3,
    time: f32,
    pending_delay: f32,
    inv_speed: f32,
    waypoints: Vec<Waypoint>,
}

impl PathBuilder {
    pub fn new(pos: Vec3, time: f32, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pos,
            time,
            pending_delay: 0.0,
            inv_speed: INV_SPEED,
            waypoints: Vec::new(),
        }
    }

    /// Override the agent speed (units per second); non-positive values are ignored
    pub fn with_speed(mut self, speed: f32) -> Self {
        if speed > 0.0 && speed.is_finite() {
            self.inv_speed = 1.0 / speed;
        }
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pos(&self) -> Vec3 {
        self.pos
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn pending_delay(&self) -> f32 {
        self.pending_delay
    }

    pub fn inv_speed(&self) -> f32 {
        self.inv_speed
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn into_waypoints(self) -> Vec<Waypoint> {
        self.waypoints
    }

    pub fn finish(&self) -> Arrival {
        Arrival::At(self.time)
    }

    pub fn mark(&self) -> Mark {
        Mark {
            index: self.waypoints.len(),
            pos: self.pos,
            time: self.time,
        }
    }

    /// Move in a straight line; returns seconds elapsed including any queued delay
    pub fn move_to(&mut self, pos: Vec3) -> f32 {
        self.push_move(pos, false)
    }

    pub fn jump_to(&mut self, pos: Vec3) -> f32 {
        self.push_move(pos, true)
    }

    pub fn move_by(&mut self, offset: Vec3) -> f32 {
        self.move_to(self.pos + offset)
    }

    fn push_move(&mut self, pos: Vec3, jump: bool) -> f32 {
        let dt = length_xz(pos - self.pos) * self.inv_speed;
        let delay = self.pending_delay;
        log::trace!(
            "MoveTo {}: {:?} -> {:?} with delay {:.3}, will take {:.3}",
            self.label,
            self.pos,
            pos,
            delay,
            dt
        );
        let start_at = (delay > 0.0).then_some(self.time + delay);
        self.time += delay + dt;
        self.pos = pos;
        self.pending_delay = 0.0;
        self.waypoints.push(Waypoint {
            dest: pos,
            start_at,
            arrive_at: self.time,
            jump,
        });
        delay + dt
    }

    /// Queue a delay before the next move; negative requests are ignored
    ///
    /// Returns the total delay now queued.
    pub fn wait(&mut self, duration: f32) -> f32 {
        if duration > 0.0 && duration.is_finite() {
            self.pending_delay += duration;
        }
        self.pending_delay
    }

    /// Stop at the edge of `aoe` if crossing it along `dir` would meet an
    /// activation, and wait there until it is over
    ///
    /// The crossing window is evaluated as if it began `extra_delay` later
    /// (on top of any delay already queued); when the hazard is live in it,
    /// that extra delay is held at the edge together with the wait. Returns
    /// the seconds spent, or 0 when nothing needed doing - the caller then
    /// crosses on its own.
    pub fn move_to_hazard_edge(&mut self, aoe: &RepeatingAoe, dir: Vec3, extra_delay: f32) -> f32 {
        let Some(dir) = normalize_xz(dir) else {
            return 0.0;
        };
        let hit = aoe.intersect(self.pos, dir);
        if !hit.is_hit() || hit.enter <= 0.0 {
            return 0.0;
        }
        let extra_delay = extra_delay.max(0.0);
        let lead = self.pending_delay + extra_delay;
        let min = hit.enter * self.inv_speed + lead;
        let max = hit.exit * self.inv_speed + lead;
        match aoe.live_overlap(self.time, min, max) {
            Some(wait) => {
                let moved = self.move_by(dir * hit.enter);
                self.wait(extra_delay + wait);
                moved + extra_delay + wait
            }
            None => 0.0,
        }
    }

    /// Fresh builder continuing from this cursor, for exploring an alternative
    pub fn branch(&self, name: &str) -> PathBuilder {
        PathBuilder {
            label: format!("{}>{}", self.label, name),
            pos: self.pos,
            time: self.time,
            pending_delay: self.pending_delay,
            inv_speed: self.inv_speed,
            waypoints: Vec::new(),
        }
    }

    /// Adopt a finished branch: its waypoints and its cursor
    pub fn merge(&mut self, rest: PathBuilder) {
        self.waypoints.extend(rest.waypoints);
        self.pos = rest.pos;
        self.time = rest.time;
        self.pending_delay = rest.pending_delay;
        self.label = rest.label;
    }

    /// First of `hazards` that would catch the agent anywhere on the legs
    /// emitted since `mark`, including time spent holding before a leg
    pub fn first_conflict<'a>(
        &self,
        mark: Mark,
        hazards: impl IntoIterator<Item = (HazardId, &'a RepeatingAoe)> + Clone,
    ) -> Option<HazardId> {
        let mut from = mark.pos;
        let mut hold_from = mark.time;
        for leg in self.waypoints.iter().skip(mark.index) {
            for (id, aoe) in hazards.clone() {
                if !is_safe_leg(aoe, from, hold_from, leg, self.inv_speed) {
                    return Some(id);
                }
            }
            from = leg.dest;
            hold_from = leg.arrive_at;
        }
        None
    }
}

/// Whether `aoe` stays dormant while the agent holds at `from` (from
/// `hold_from` until the leg departs) and then travels to `leg.dest`
pub fn is_safe_leg(aoe: &RepeatingAoe, from: Vec3, hold_from: f32, leg: &Waypoint, inv_speed: f32) -> bool {
    let depart = leg.start_at.unwrap_or(hold_from);
    let hold = depart - hold_from;
    let dir = normalize_xz(leg.dest - from);

    // Standing on the boundary (e.g. waiting at an edge) is outside
    let inside = match dir {
        Some(dir) => aoe.intersect(from, dir).enter < -LENGTH_EPSILON * 10.0,
        None => aoe.contains(from),
    };
    if inside {
        if aoe.is_live_at(hold_from) || aoe.is_live_at(depart) {
            return false;
        }
        if hold > 0.0 && aoe.is_live_during(hold_from, 0.0, hold) {
            return false;
        }
    }

    let Some(dir) = dir else {
        return true;
    };
    let len = length_xz(leg.dest - from);
    let Some((enter, exit)) = aoe.intersect(from, dir).clip(len) else {
        return true;
    };
    if exit - enter < LENGTH_EPSILON * 10.0 {
        // Grazing contact
        return true;
    }
    !aoe.is_live_during(depart, enter * inv_speed, exit * inv_speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::{AoeShape, SequenceId};
    use proptest::prelude::*;

    const GOAL: Vec3 = Vec3::new(0.0, 0.0, 20.0);

    fn hazard(next: f32) -> RepeatingAoe {
        let mut aoe = RepeatingAoe::new(AoeShape::Circle { radius: 5.0 }, Vec3::new(0.0, 0.0, 10.0), 2.5);
        aoe.repeat = 2.5;
        aoe.next_activation = Some(next);
        aoe
    }

    fn id() -> HazardId {
        HazardId {
            sequence: SequenceId(0),
            member: 0,
        }
    }

    #[test]
    fn test_move_to_elapsed() {
        let mut pb = PathBuilder::new(Vec3::ZERO, 0.0, "t");
        let dt = pb.move_to(Vec3::new(3.0, 7.0, 4.0));
        // Elevation does not count toward distance
        assert!((dt - 5.0 / 6.0).abs() < 1e-5);
        assert_eq!(pb.waypoints()[0].start_at, None);
        assert!((pb.time() - 5.0 / 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_wait_applies_to_next_move() {
        let mut pb = PathBuilder::new(Vec3::ZERO, 10.0, "t");
        assert_eq!(pb.wait(-1.0), 0.0);
        pb.wait(1.0);
        pb.wait(0.5);
        let dt = pb.move_to(Vec3::new(0.0, 0.0, 6.0));
        assert!((dt - 2.5).abs() < 1e-5);
        let wp = pb.waypoints()[0];
        assert_eq!(wp.start_at, Some(11.5));
        assert!((wp.arrive_at - 12.5).abs() < 1e-5);
        assert_eq!(pb.pending_delay(), 0.0);
    }

    #[test]
    fn test_direct_route_when_hazard_is_quiet() {
        // Hit at 0.5: next strike at 3.0, after the [5/6, 15/6] crossing
        let aoe = hazard(3.0);
        let mut pb = PathBuilder::new(Vec3::ZERO, 0.0, "t");
        assert_eq!(pb.move_to_hazard_edge(&aoe, Vec3::Z, 0.0), 0.0);
        pb.move_to(GOAL);
        assert_eq!(pb.waypoints().len(), 1);
        assert!((pb.time() - 20.0 / 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_waits_out_strike_at_edge() {
        // Strike at 2.0 falls inside the [5/6, 15/6] crossing
        let aoe = hazard(2.0);
        let mut pb = PathBuilder::new(Vec3::ZERO, 0.0, "t");
        let spent = pb.move_to_hazard_edge(&aoe, Vec3::Z, 0.0);
        assert!((spent - 2.0).abs() < 1e-4);
        assert!((pb.pos() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-4);
        pb.move_to(GOAL);
        let wps = pb.waypoints();
        assert_eq!(wps.len(), 2);
        assert!((wps[1].start_at.unwrap() - 2.0).abs() < 1e-4);
        // Added wait exactly closes the gap
        assert!((pb.time() - (2.0 + 15.0 / 6.0)).abs() < 1e-4);
        let mark = PathBuilder::new(Vec3::ZERO, 0.0, "t").mark();
        assert_eq!(pb.first_conflict(mark, [(id(), &aoe)]), None);
    }

    #[test]
    fn test_direct_crossing_into_strike_is_flagged() {
        let aoe = hazard(2.0);
        let mut pb = PathBuilder::new(Vec3::ZERO, 0.0, "t");
        let mark = pb.mark();
        pb.move_to(GOAL);
        assert_eq!(pb.first_conflict(mark, [(id(), &aoe)]), Some(id()));
    }

    #[test]
    fn test_holding_inside_is_flagged() {
        let aoe = hazard(2.0);
        let mut pb = PathBuilder::new(Vec3::new(0.0, 0.0, 9.0), 0.0, "t");
        let mark = pb.mark();
        pb.wait(3.0);
        pb.move_to(Vec3::new(20.0, 0.0, 9.0));
        assert_eq!(pb.first_conflict(mark, [(id(), &aoe)]), Some(id()));
    }

    #[test]
    fn test_leaving_inside_just_before_strike_is_flagged() {
        let aoe = hazard(0.0008);
        let from = Vec3::new(0.0, 0.0, 10.0);
        let leg = Waypoint {
            dest: GOAL,
            start_at: None,
            arrive_at: 10.0 / 6.0,
            jump: false,
        };
        assert!(!is_safe_leg(&aoe, from, 0.0, &leg, INV_SPEED));

        // Same strike from outside the footprint is a non-issue
        let leg = Waypoint {
            dest: Vec3::new(20.0, 0.0, 0.0),
            start_at: None,
            arrive_at: 20.0 / 6.0,
            jump: false,
        };
        assert!(is_safe_leg(&aoe, Vec3::ZERO, 0.0, &leg, INV_SPEED));
    }

    #[test]
    fn test_arriving_inside_at_strike_is_flagged() {
        let aoe = hazard(2.0);
        let leg = Waypoint {
            dest: Vec3::new(0.0, 0.0, 12.0),
            start_at: Some(2.0005),
            arrive_at: 2.0005 + 2.0 / 6.0,
            jump: false,
        };
        assert!(!is_safe_leg(&aoe, Vec3::new(0.0, 0.0, 10.0), 1.9995, &leg, INV_SPEED));
    }

    #[test]
    fn test_edge_noop_when_inside_or_behind() {
        let aoe = hazard(2.0);
        let mut inside = PathBuilder::new(Vec3::new(0.0, 0.0, 10.0), 0.0, "t");
        assert_eq!(inside.move_to_hazard_edge(&aoe, Vec3::Z, 0.0), 0.0);
        let mut behind = PathBuilder::new(Vec3::new(0.0, 0.0, 30.0), 0.0, "t");
        assert_eq!(behind.move_to_hazard_edge(&aoe, Vec3::Z, 0.0), 0.0);
        assert!(inside.waypoints().is_empty() && behind.waypoints().is_empty());
    }

    #[test]
    fn test_branch_and_merge() {
        let mut root = PathBuilder::new(Vec3::ZERO, 1.0, "root");
        root.move_to(Vec3::new(0.0, 0.0, 6.0));
        let mut left = root.branch("left");
        assert_eq!(left.label(), "root>left");
        assert!(left.waypoints().is_empty());
        assert_eq!(left.pos(), root.pos());
        left.move_to(Vec3::new(-6.0, 0.0, 6.0));
        let right = root.branch("right");
        root.merge(left);
        assert_eq!(root.waypoints().len(), 2);
        assert_eq!(root.pos(), Vec3::new(-6.0, 0.0, 6.0));
        assert!((root.time() - 3.0).abs() < 1e-5);
        assert!(right.waypoints().is_empty());
    }

    proptest! {
        #[test]
        fn prop_edge_wait_never_enters_live_window(
            next in 0.0f32..5.0,
            duration in 0.0f32..0.8,
            start_z in -10.0f32..4.0,
            start_time in 0.0f32..5.0,
        ) {
            let aoe = hazard(next).with_duration(duration);
            let mut pb = PathBuilder::new(Vec3::new(0.0, 0.0, start_z), start_time, "p");
            let hit = aoe.intersect(pb.pos(), Vec3::Z);
            let inv = pb.inv_speed();
            let crossing = hit.exit * inv - hit.enter * inv;
            let before = pb.time() + hit.enter * inv;
            let overlap = aoe.overlapping_activation(before, 0.0, crossing);
            let spent = pb.move_to_hazard_edge(&aoe, Vec3::Z, 0.0);
            match overlap {
                Some(activation) => {
                    // Post-wait crossing begins once the activation window is over
                    let post_wait_start = pb.time() + pb.pending_delay();
                    prop_assert!(spent > 0.0);
                    prop_assert!(post_wait_start >= before + activation + duration - 1e-3);
                }
                None => prop_assert_eq!(spent, 0.0),
            }
        }
    }
}
