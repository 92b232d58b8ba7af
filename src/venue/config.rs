//! Venue configuration: hazard sequences, triggers and the course, as JSON
//!
//! Course points are ground `[x, z]` pairs; their elevation comes from the
//! venue's height profile when the venue is built. Sequences are referred to
//! by name everywhere and resolved to ids in `build`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::Venue;
use crate::consts::MIN_PERIOD;
use crate::error::{ConfigError, ConfigResult};
use crate::geom::HeightProfile;
use crate::hazard::{AoeShape, HazardModel, HazardSequence, RepeatingAoe, SequenceId, Synchronizer, TriggerTable};
use crate::plan::{Course, GridPlanner, GridSpec, GroundRect, Planner, RecursivePlanner, Route, Stage};
use crate::settings::Settings;
use crate::{from_xz, xz};

fn default_forward() -> Vec2 {
    Vec2::Y
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    #[default]
    Recursive,
    Grid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub position: Vec3,
    /// Seconds from this member's activation to the next member's
    pub delay: f32,
    /// Overrides the sequence shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<AoeShape>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub name: String,
    pub shape: AoeShape,
    /// How long each activation stays live (0 = instantaneous strike)
    #[serde(default)]
    pub duration: f32,
    pub members: Vec<MemberConfig>,
}

/// Action id to candidate sequence names, separately for hits and casts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TriggersConfig {
    #[serde(default)]
    pub hits: BTreeMap<u32, Vec<String>>,
    #[serde(default)]
    pub casts: BTreeMap<u32, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageConfig {
    MoveTo {
        to: Vec2,
        #[serde(default)]
        jump: bool,
        #[serde(default)]
        guards: Vec<String>,
    },
    Gate {
        z: f32,
        toward: Vec2,
        x_min: f32,
        x_max: f32,
        #[serde(default)]
        guards: Vec<String>,
    },
    Wait {
        seconds: f32,
    },
    Choose {
        options: Vec<RouteConfig>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueConfig {
    pub name: String,
    /// Ground region in which this venue applies
    #[serde(default)]
    pub bounds: Option<GroundRect>,
    /// Ground point where agents enter the venue
    #[serde(default)]
    pub start: Vec2,
    /// Ground direction of course progress
    #[serde(default = "default_forward")]
    pub forward: Vec2,
    /// `[progress, elevation]` samples
    #[serde(default)]
    pub height_profile: Vec<Vec2>,
    pub sequences: Vec<SequenceConfig>,
    #[serde(default)]
    pub triggers: TriggersConfig,
    pub course: Vec<StageConfig>,
    #[serde(default)]
    pub grid: Option<GridSpec>,
    #[serde(default)]
    pub planner: PlannerKind,
}

impl VenueConfig {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded venue '{}' from {}", config.name, path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether `position` lies within this venue's bounds
    pub fn contains(&self, position: Vec3) -> bool {
        self.bounds.is_some_and(|b| {
            let p = xz(position);
            p.cmpge(b.min).all() && p.cmple(b.max).all()
        })
    }

    /// Entry point at course elevation
    pub fn start_position(&self) -> Vec3 {
        self.profile().place(self.start)
    }

    pub fn profile(&self) -> HeightProfile {
        HeightProfile::new(from_xz(self.forward, 0.0), self.height_profile.clone())
    }

    /// Validate and resolve names into a runnable venue
    pub fn build(&self, settings: &Settings) -> ConfigResult<Venue> {
        settings.validate()?;
        let mut model = HazardModel::new();
        let mut ids: HashMap<&str, SequenceId> = HashMap::new();
        for sequence in &self.sequences {
            if ids.contains_key(sequence.name.as_str()) {
                return Err(ConfigError::DuplicateSequence(sequence.name.clone()));
            }
            let id = model.add(build_sequence(sequence)?);
            ids.insert(&sequence.name, id);
        }
        let resolve = |names: &[String]| -> ConfigResult<Vec<SequenceId>> {
            names
                .iter()
                .map(|n| ids.get(n.as_str()).copied().ok_or_else(|| ConfigError::UnknownSequence(n.clone())))
                .collect()
        };

        let mut triggers = TriggerTable::new();
        for (&action, names) in &self.triggers.hits {
            triggers.on_hit(action, resolve(names)?);
        }
        for (&action, names) in &self.triggers.casts {
            triggers.on_cast(action, resolve(names)?);
        }
        let synchronizer = Synchronizer::new(triggers).with_tolerance(settings.match_tolerance_sq);

        let profile = self.profile();
        let stages = build_stages(&self.course, &profile, &resolve)?;
        let course = Course::new(profile.clone(), stages);

        let planner: Box<dyn Planner> = match self.planner {
            PlannerKind::Recursive => Box::new(RecursivePlanner::new(course).with_speed(settings.speed)),
            PlannerKind::Grid => {
                let spec = self.grid.as_ref().ok_or(ConfigError::InvalidGrid("grid planner needs a grid block"))?;
                let goal = course
                    .goal()
                    .ok_or(ConfigError::InvalidGrid("course has no fixed destination"))?;
                Box::new(GridPlanner::with_speed(spec, goal, profile.clone(), settings.speed)?)
            }
        };

        Ok(Venue {
            name: self.name.clone(),
            bounds: self.bounds,
            profile,
            model,
            synchronizer,
            planner,
        })
    }
}

fn build_sequence(config: &SequenceConfig) -> ConfigResult<HazardSequence> {
    if config.members.is_empty() {
        return Err(ConfigError::EmptySequence(config.name.clone()));
    }
    let members = config
        .members
        .iter()
        .enumerate()
        .map(|(member, m)| {
            let shape = m.shape.unwrap_or(config.shape);
            if !shape.is_valid() || !m.position.is_finite() {
                return Err(ConfigError::InvalidShape {
                    name: config.name.clone(),
                    member,
                });
            }
            if !(m.delay.is_finite() && m.delay >= 0.0) {
                return Err(ConfigError::InvalidDelay {
                    name: config.name.clone(),
                    member,
                });
            }
            Ok(RepeatingAoe::new(shape, m.position, m.delay).with_duration(config.duration))
        })
        .collect::<ConfigResult<Vec<_>>>()?;
    let sequence = HazardSequence::from_members(config.name.clone(), members);
    if !(sequence.repeat() >= MIN_PERIOD) {
        return Err(ConfigError::PeriodTooShort(config.name.clone()));
    }
    Ok(sequence)
}

fn build_stages(
    configs: &[StageConfig],
    profile: &HeightProfile,
    resolve: &dyn Fn(&[String]) -> ConfigResult<Vec<SequenceId>>,
) -> ConfigResult<Vec<Stage>> {
    configs
        .iter()
        .map(|config| {
            Ok(match config {
                StageConfig::MoveTo { to, jump, guards } => Stage::MoveTo {
                    to: profile.place(*to),
                    jump: *jump,
                    guards: resolve(guards)?,
                },
                StageConfig::Gate {
                    z,
                    toward,
                    x_min,
                    x_max,
                    guards,
                } => Stage::Gate {
                    z: *z,
                    toward: profile.place(*toward),
                    x_min: *x_min,
                    x_max: *x_max,
                    guards: resolve(guards)?,
                },
                StageConfig::Wait { seconds } => {
                    if !(seconds.is_finite() && *seconds >= 0.0) {
                        return Err(ConfigError::NonPositive {
                            field: "wait.seconds",
                            value: *seconds,
                        });
                    }
                    Stage::Wait { seconds: *seconds }
                }
                StageConfig::Choose { options } => Stage::Choose {
                    options: options
                        .iter()
                        .map(|r| Ok(Route::new(r.name.clone(), build_stages(&r.stages, profile, resolve)?)))
                        .collect::<ConfigResult<Vec<_>>>()?,
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VENUE: &str = r#"{
        "name": "bridge",
        "bounds": { "min": [-20.0, 0.0], "max": [20.0, 40.0] },
        "height_profile": [[0.0, 10.0], [40.0, 2.0]],
        "sequences": [
            {
                "name": "pair",
                "shape": { "kind": "circle", "radius": 5.0 },
                "members": [
                    { "position": [-6.0, 6.0, 20.0], "delay": 1.5 },
                    { "position": [6.0, 6.0, 20.0], "delay": 1.0,
                      "shape": { "kind": "square", "half_side": 3.0 } }
                ]
            }
        ],
        "triggers": { "hits": { "4242": ["pair"] } },
        "course": [
            { "stage": "move_to", "to": [0.0, 10.0] },
            { "stage": "choose", "options": [
                { "name": "left", "stages": [ { "stage": "move_to", "to": [-12.0, 30.0], "guards": ["pair"] } ] },
                { "name": "right", "stages": [ { "stage": "wait", "seconds": 0.5 },
                                               { "stage": "move_to", "to": [12.0, 30.0], "guards": ["pair"] } ] }
            ] },
            { "stage": "move_to", "to": [0.0, 40.0] }
        ]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let config = VenueConfig::from_json(VENUE).unwrap();
        assert_eq!(config.planner, PlannerKind::Recursive);
        assert_eq!(config.forward, Vec2::Y);
        let venue = config.build(&Settings::default()).unwrap();
        let seq = venue.model.sequence(SequenceId(0)).unwrap();
        assert!((seq.repeat() - 2.5).abs() < 1e-6);
        assert_eq!(seq.member(1).unwrap().shape, AoeShape::Square { half_side: 3.0 });
        assert_eq!(venue.planner.name(), "recursive");
        // Course points pick up the profile elevation
        assert!((venue.profile.place(Vec2::new(0.0, 10.0)).y - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_bounds_contain() {
        let config = VenueConfig::from_json(VENUE).unwrap();
        assert!(config.contains(Vec3::new(0.0, 50.0, 10.0)));
        assert!(!config.contains(Vec3::new(0.0, 0.0, 41.0)));
    }

    #[test]
    fn test_unknown_guard_is_rejected() {
        let json = VENUE.replace(r#""guards": ["pair"] } ] },"#, r#""guards": ["nope"] } ] },"#);
        let err = VenueConfig::from_json(&json).unwrap().build(&Settings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSequence(name) if name == "nope"));
    }

    #[test]
    fn test_short_period_is_rejected() {
        let json = VENUE.replace(r#""delay": 1.5"#, r#""delay": 0.0"#).replace(r#""delay": 1.0"#, r#""delay": 0.0"#);
        let err = VenueConfig::from_json(&json).unwrap().build(&Settings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::PeriodTooShort(_)));

        // Positive but far too fast to plan around
        let json = VENUE.replace(r#""delay": 1.5"#, r#""delay": 1e-7"#).replace(r#""delay": 1.0"#, r#""delay": 0.0"#);
        let err = VenueConfig::from_json(&json).unwrap().build(&Settings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::PeriodTooShort(_)));
    }

    #[test]
    fn test_grid_planner_requires_grid() {
        let mut config = VenueConfig::from_json(VENUE).unwrap();
        config.planner = PlannerKind::Grid;
        assert!(matches!(config.build(&Settings::default()), Err(ConfigError::InvalidGrid(_))));
        config.grid = Some(GridSpec {
            center: Vec2::new(0.0, 20.0),
            half_extent: Vec2::new(20.0, 20.0),
            resolution: 1.0,
            horizon: 20.0,
            leeway: None,
            blocked: Vec::new(),
        });
        assert_eq!(config.build(&Settings::default()).unwrap().planner.name(), "grid");
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(VenueConfig::from_json("{"), Err(ConfigError::Json(_))));
    }
}
