//! Venues: one generic engine parameterised by configuration
//!
//! A `VenueConfig` describes a venue's hazards, triggers and course; building
//! it yields a `Venue`, and a `VenueSession` runs that venue against live
//! telemetry.

pub mod config;
pub mod presets;
pub mod session;

pub use config::{PlannerKind, RouteConfig, SequenceConfig, StageConfig, TriggersConfig, VenueConfig};
pub use session::{HazardState, Strategy, TickOutcome, VenueSession};

use glam::Vec3;

use crate::error::{ConfigError, ConfigResult};
use crate::geom::HeightProfile;
use crate::hazard::{HazardModel, Synchronizer};
use crate::plan::{GroundRect, Planner};

/// A built venue: hazard model, trigger matching and route strategy
#[derive(Debug)]
pub struct Venue {
    pub name: String,
    pub bounds: Option<GroundRect>,
    pub profile: HeightProfile,
    pub model: HazardModel,
    pub synchronizer: Synchronizer,
    pub planner: Box<dyn Planner>,
}

/// First venue whose bounds contain `position`
pub fn select_venue(configs: &[VenueConfig], position: Vec3) -> Option<&VenueConfig> {
    configs.iter().find(|c| c.contains(position))
}

pub fn find_venue<'a>(configs: &'a [VenueConfig], name: &str) -> ConfigResult<&'a VenueConfig> {
    configs
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| ConfigError::UnknownVenue(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_by_position() {
        let configs = presets::all();
        let inside = presets::demo().bounds.map(|b| (b.min + b.max) * 0.5).unwrap();
        let selected = select_venue(&configs, crate::from_xz(inside, 0.0)).unwrap();
        assert_eq!(selected.name, presets::DEMO);
        assert!(select_venue(&configs, Vec3::new(1e4, 0.0, 1e4)).is_none());
    }

    #[test]
    fn test_find_by_name() {
        let configs = presets::all();
        assert!(find_venue(&configs, presets::DEMO).is_ok());
        assert!(matches!(find_venue(&configs, "nowhere"), Err(ConfigError::UnknownVenue(_))));
    }
}
