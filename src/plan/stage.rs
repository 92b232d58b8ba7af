//! Course description: a tree of stages the solver walks in order

use glam::Vec3;

use crate::geom::{HeightProfile, clamp_x, intersect_z_plane};
use crate::hazard::SequenceId;

/// One decision point or leg of a course
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Straight move to `to`, stopping at the edge of any guarded hazard that
    /// would be live while crossing it
    MoveTo {
        to: Vec3,
        jump: bool,
        guards: Vec<SequenceId>,
    },
    /// Move to where the line toward `toward` crosses the plane `z`, with x
    /// clamped to `[x_min, x_max]`
    Gate {
        z: f32,
        toward: Vec3,
        x_min: f32,
        x_max: f32,
        guards: Vec<SequenceId>,
    },
    /// Hold still before the next move
    Wait { seconds: f32 },
    /// Mutually exclusive alternatives; the earliest arrival wins
    Choose { options: Vec<Route> },
}

impl Stage {
    pub fn move_to(to: Vec3) -> Self {
        Stage::MoveTo {
            to,
            jump: false,
            guards: Vec::new(),
        }
    }

    pub fn guarded_move(to: Vec3, guards: impl IntoIterator<Item = SequenceId>) -> Self {
        Stage::MoveTo {
            to,
            jump: false,
            guards: guards.into_iter().collect(),
        }
    }

    /// Where the stage leaves the agent when entered from `from`, for stages
    /// that move it at all
    pub fn target(&self, from: Vec3) -> Option<Vec3> {
        match self {
            Stage::MoveTo { to, .. } => Some(*to),
            Stage::Gate {
                z,
                toward,
                x_min,
                x_max,
                ..
            } => {
                let crossing = intersect_z_plane(from, *toward, *z).unwrap_or(Vec3::new(toward.x, toward.y, *z));
                Some(clamp_x(crossing, x_min.min(*x_max), x_max.max(*x_min)))
            }
            Stage::Wait { .. } | Stage::Choose { .. } => None,
        }
    }

    pub fn guards(&self) -> &[SequenceId] {
        match self {
            Stage::MoveTo { guards, .. } | Stage::Gate { guards, .. } => guards,
            Stage::Wait { .. } | Stage::Choose { .. } => &[],
        }
    }
}

/// Named list of stages; one option of a `Choose`
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub name: String,
    pub stages: Vec<Stage>,
}

impl Route {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }
}

/// Complete course of one venue
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Course {
    pub profile: HeightProfile,
    pub stages: Vec<Stage>,
}

impl Course {
    pub fn new(profile: HeightProfile, stages: Vec<Stage>) -> Self {
        Self { profile, stages }
    }

    #[inline]
    pub fn progress(&self, p: Vec3) -> f32 {
        self.profile.progress(p)
    }

    /// Final fixed destination of the course, if it ends with a plain move
    pub fn goal(&self) -> Option<Vec3> {
        fn last_target(stages: &[Stage]) -> Option<Vec3> {
            stages.iter().rev().find_map(|stage| match stage {
                Stage::MoveTo { to, .. } => Some(*to),
                Stage::Choose { options } => options.iter().find_map(|r| last_target(&r.stages)),
                _ => None,
            })
        }
        last_target(&self.stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_target_clamped() {
        let gate = Stage::Gate {
            z: 10.0,
            toward: Vec3::new(20.0, 0.0, 20.0),
            x_min: -5.0,
            x_max: 5.0,
            guards: Vec::new(),
        };
        let target = gate.target(Vec3::ZERO).unwrap();
        assert_eq!(target, Vec3::new(5.0, 0.0, 10.0));
        // Already level with the plane: drop straight onto it
        let target = gate.target(Vec3::new(0.0, 0.0, 20.0)).unwrap();
        assert!((target - Vec3::new(5.0, 0.0, 10.0)).length() < 1e-5);
    }

    #[test]
    fn test_goal_looks_through_choices() {
        let course = Course::new(
            HeightProfile::default(),
            vec![
                Stage::move_to(Vec3::Z),
                Stage::Choose {
                    options: vec![Route::new("a", vec![Stage::move_to(Vec3::new(1.0, 0.0, 9.0))])],
                },
            ],
        );
        assert_eq!(course.goal(), Some(Vec3::new(1.0, 0.0, 9.0)));
    }
}
