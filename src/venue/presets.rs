//! Built-in venues

use glam::{Vec2, Vec3};

use super::config::{
    MemberConfig, PlannerKind, RouteConfig, SequenceConfig, StageConfig, TriggersConfig, VenueConfig,
};
use crate::geom::HeightProfile;
use crate::hazard::AoeShape;
use crate::plan::{GridSpec, GroundRect, Obstacle};

pub const DEMO: &str = "gauntlet";
pub const DEMO_GRID: &str = "gauntlet-grid";

/// Action ids reported by the demo venue's telemetry
pub mod actions {
    pub const SWEEPER_HIT: u32 = 1001;
    pub const LANE_CAST: u32 = 1002;
    pub const LANE_HIT: u32 = 1003;
}

fn move_to(x: f32, z: f32) -> StageConfig {
    StageConfig::MoveTo {
        to: Vec2::new(x, z),
        jump: false,
        guards: Vec::new(),
    }
}

fn guarded(x: f32, z: f32, guard: &str) -> StageConfig {
    StageConfig::MoveTo {
        to: Vec2::new(x, z),
        jump: false,
        guards: vec![guard.to_string()],
    }
}

fn lane(name: &str, x: f32, guard: &str) -> RouteConfig {
    RouteConfig {
        name: name.to_string(),
        stages: vec![move_to(x, 30.0), guarded(x, 52.0, guard)],
    }
}

/// Three sweeping circles, then a choice of two lanes
///
/// ```text
///   z=62  finish (jump)
///   z=56  gate, |x| <= 3
///   z=34..52   [left_lane]  |  [right_lane]
///   z=20       o   o   o    sweepers
///   z=0   start
/// ```
pub fn demo() -> VenueConfig {
    let height_profile = vec![Vec2::new(0.0, 10.0), Vec2::new(30.0, 8.0), Vec2::new(60.0, 4.0)];
    let profile = HeightProfile::new(Vec3::Z, height_profile.clone());
    let member = |x: f32, z: f32, delay: f32| MemberConfig {
        position: profile.place(Vec2::new(x, z)),
        delay,
        shape: None,
    };

    let sequences = vec![
        SequenceConfig {
            name: "sweepers".to_string(),
            shape: AoeShape::Circle { radius: 5.0 },
            duration: 0.0,
            members: vec![member(-8.0, 20.0, 1.2), member(0.0, 20.0, 1.2), member(8.0, 20.0, 1.2)],
        },
        SequenceConfig {
            name: "left_lane".to_string(),
            shape: AoeShape::Square { half_side: 3.0 },
            duration: 0.0,
            members: vec![member(-6.0, 37.0, 1.5), member(-6.0, 46.0, 1.5)],
        },
        SequenceConfig {
            name: "right_lane".to_string(),
            shape: AoeShape::Rect {
                length: 8.0,
                half_width: 3.0,
                rotation: 0.0,
            },
            duration: 0.3,
            members: vec![member(6.0, 34.0, 2.0), member(6.0, 43.0, 1.0)],
        },
    ];

    let mut triggers = TriggersConfig::default();
    triggers.hits.insert(actions::SWEEPER_HIT, vec!["sweepers".to_string()]);
    triggers
        .hits
        .insert(actions::LANE_HIT, vec!["left_lane".to_string(), "right_lane".to_string()]);
    triggers
        .casts
        .insert(actions::LANE_CAST, vec!["left_lane".to_string(), "right_lane".to_string()]);

    let course = vec![
        move_to(0.0, 8.0),
        guarded(0.0, 28.0, "sweepers"),
        StageConfig::Choose {
            options: vec![lane("left", -6.0, "left_lane"), lane("right", 6.0, "right_lane")],
        },
        StageConfig::Gate {
            z: 56.0,
            toward: Vec2::new(0.0, 62.0),
            x_min: -3.0,
            x_max: 3.0,
            guards: Vec::new(),
        },
        StageConfig::MoveTo {
            to: Vec2::new(0.0, 62.0),
            jump: true,
            guards: Vec::new(),
        },
    ];

    VenueConfig {
        name: DEMO.to_string(),
        bounds: Some(GroundRect {
            min: Vec2::new(-20.0, -5.0),
            max: Vec2::new(20.0, 70.0),
        }),
        start: Vec2::ZERO,
        forward: Vec2::Y,
        height_profile,
        sequences,
        triggers,
        course,
        grid: Some(GridSpec {
            center: Vec2::new(0.0, 32.0),
            half_extent: Vec2::new(12.0, 34.0),
            resolution: 1.0,
            horizon: 30.0,
            leeway: None,
            blocked: vec![
                Obstacle::Rect(GroundRect {
                    min: Vec2::new(-1.5, 32.0),
                    max: Vec2::new(1.5, 50.0),
                }),
                // Pillar guarding the gate approach
                Obstacle::Footprint {
                    shape: AoeShape::Circle { radius: 1.0 },
                    center: Vec2::new(-9.0, 56.0),
                },
            ],
        }),
        planner: PlannerKind::Recursive,
    }
}

/// Same venue routed by the space-time grid search; selected by name only
pub fn demo_grid() -> VenueConfig {
    VenueConfig {
        name: DEMO_GRID.to_string(),
        bounds: None,
        planner: PlannerKind::Grid,
        ..demo()
    }
}

pub fn all() -> Vec<VenueConfig> {
    vec![demo(), demo_grid()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    #[test]
    fn test_presets_build() {
        for config in all() {
            let venue = config.build(&Settings::default()).unwrap();
            assert_eq!(venue.model.len(), 3);
            assert_eq!(venue.model.hazards().count(), 7);
        }
    }

    #[test]
    fn test_demo_survives_json() {
        let json = demo().to_json().unwrap();
        let parsed = VenueConfig::from_json(&json).unwrap();
        assert_eq!(parsed.name, DEMO);
        assert_eq!(parsed.course.len(), 5);
        assert!(parsed.build(&Settings::default()).is_ok());
    }
}
