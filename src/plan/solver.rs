//! Recursive branch-and-merge solver over a `Course`
//!
//! Each `Choose` forks the builder once per option, solves the option together
//! with everything after it, and merges back only the earliest arrival. A
//! branch that cannot be made safe reports `Arrival::Unreachable` and is
//! dropped along with its waypoints.

use glam::Vec3;

use super::stage::{Course, Stage};
use super::{Plan, Planner};
use crate::consts::{LENGTH_EPSILON, SPEED};
use crate::geom::{length_xz, normalize_xz};
use crate::hazard::{HazardId, HazardModel, RepeatingAoe, SequenceId};
use crate::path::{Arrival, PathBuilder};

/// Stages still to run once the current list is exhausted
struct Tail<'a> {
    stages: &'a [Stage],
    next: Option<&'a Tail<'a>>,
}

#[derive(Debug, Clone)]
pub struct RecursivePlanner {
    course: Course,
    speed: f32,
}

impl RecursivePlanner {
    pub fn new(course: Course) -> Self {
        Self { course, speed: SPEED }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        if speed > 0.0 && speed.is_finite() {
            self.speed = speed;
        }
        self
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    fn solve(&self, model: &HazardModel, pb: &mut PathBuilder, stages: &[Stage], tail: Option<&Tail>) -> Arrival {
        let Some((stage, rest)) = stages.split_first() else {
            return match tail {
                Some(t) => self.solve(model, pb, t.stages, t.next),
                None => pb.finish(),
            };
        };

        if self.is_complete(stage, rest, tail, pb.pos()) {
            return self.solve(model, pb, rest, tail);
        }

        match stage {
            Stage::MoveTo { to, jump, guards } => {
                if !self.guarded_move(model, pb, *to, *jump, guards) {
                    return Arrival::Unreachable;
                }
                self.solve(model, pb, rest, tail)
            }
            Stage::Gate { guards, .. } => {
                let Some(to) = stage.target(pb.pos()) else {
                    return Arrival::Unreachable;
                };
                if !self.guarded_move(model, pb, to, false, guards) {
                    return Arrival::Unreachable;
                }
                self.solve(model, pb, rest, tail)
            }
            Stage::Wait { seconds } => {
                pb.wait(*seconds);
                self.solve(model, pb, rest, tail)
            }
            Stage::Choose { options } => {
                let after = Tail { stages: rest, next: tail };
                let mut best: Option<(Arrival, PathBuilder)> = None;
                for option in options {
                    let mut branch = pb.branch(&option.name);
                    let arrival = self.solve(model, &mut branch, &option.stages, Some(&after));
                    log::debug!("Branch {} -> {:?}", branch.label(), arrival);
                    let better = match &best {
                        Some((incumbent, _)) => arrival.is_better_than(incumbent),
                        None => arrival.is_reachable(),
                    };
                    if better {
                        best = Some((arrival, branch));
                    }
                }
                match best {
                    Some((arrival, branch)) => {
                        pb.merge(branch);
                        arrival
                    }
                    None => Arrival::Unreachable,
                }
            }
        }
    }

    /// Stage already behind the agent along the course
    ///
    /// A wait is complete when the next stage that moves the agent is.
    fn is_complete<'a>(&self, stage: &Stage, rest: &'a [Stage], tail: Option<&'a Tail<'a>>, pos: Vec3) -> bool {
        match stage {
            Stage::MoveTo { .. } | Stage::Gate { .. } => match stage.target(pos) {
                Some(target) => self.course.progress(target) + LENGTH_EPSILON < self.course.progress(pos),
                None => false,
            },
            Stage::Wait { .. } => {
                let mut stages = rest;
                let mut next = tail;
                loop {
                    if let Some(s) = stages.iter().find(|s| !matches!(s, Stage::Wait { .. })) {
                        return matches!(s, Stage::MoveTo { .. } | Stage::Gate { .. })
                            && self.is_complete(s, &[], None, pos);
                    }
                    match next {
                        Some(t) => {
                            stages = t.stages;
                            next = t.next;
                        }
                        None => return false,
                    }
                }
            }
            Stage::Choose { .. } => false,
        }
    }

    /// Move to `to`, waiting at the edge of each guarded hazard in turn
    ///
    /// Returns false if any emitted leg still crosses a live hazard.
    fn guarded_move(&self, model: &HazardModel, pb: &mut PathBuilder, to: Vec3, jump: bool, guards: &[SequenceId]) -> bool {
        let mark = pb.mark();
        let guarded: Vec<(HazardId, &RepeatingAoe)> = model
            .hazards()
            .filter(|(id, _)| guards.contains(&id.sequence))
            .collect();

        let from = pb.pos();
        let len = length_xz(to - from);
        if let Some(dir) = normalize_xz(to - from) {
            let mut ahead: Vec<(f32, &RepeatingAoe)> = guarded
                .iter()
                .filter_map(|&(_, aoe)| {
                    let (enter, _) = aoe.intersect(from, dir).clip(len)?;
                    (enter > 0.0).then_some((enter, aoe))
                })
                .collect();
            ahead.sort_by(|a, b| a.0.total_cmp(&b.0));
            for (_, aoe) in ahead {
                pb.move_to_hazard_edge(aoe, dir, 0.0);
            }
        }

        if length_xz(to - pb.pos()) > LENGTH_EPSILON || pb.pending_delay() > 0.0 {
            if jump {
                pb.jump_to(to);
            } else {
                pb.move_to(to);
            }
        }

        match pb.first_conflict(mark, guarded.iter().copied()) {
            Some(id) => {
                log::debug!("{}: no safe way past {:?}", pb.label(), id);
                false
            }
            None => true,
        }
    }
}

impl Planner for RecursivePlanner {
    fn name(&self) -> &str {
        "recursive"
    }

    fn plan(&self, model: &HazardModel, start: Vec3, now: f32) -> Plan {
        let mut pb = PathBuilder::new(start, now, "root").with_speed(self.speed);
        let arrival = self.solve(model, &mut pb, &self.course.stages, None);
        if arrival.is_reachable() {
            Plan {
                label: pb.label().to_string(),
                arrival,
                waypoints: pb.into_waypoints(),
            }
        } else {
            Plan::unreachable("root")
        }
    }
}
