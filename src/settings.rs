//! Engine tunables
//!
//! Loaded from an optional JSON file; anything missing falls back to the
//! defaults in `consts`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{MATCH_TOLERANCE_SQ, SPEED, TESSELLATION_ERROR};
use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Agent ground speed (units per second)
    pub speed: f32,
    /// Squared distance within which a caster matches a hazard origin
    pub match_tolerance_sq: f32,
    /// Maximum chord error of displayed circle outlines
    pub tessellation_error: f32,
    /// Also rebuild the route this often even without new telemetry (seconds)
    pub rebuild_interval: Option<f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speed: SPEED,
            match_tolerance_sq: MATCH_TOLERANCE_SQ,
            tessellation_error: TESSELLATION_ERROR,
            rebuild_interval: None,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let positive = |field: &'static str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NonPositive { field, value })
            }
        };
        positive("speed", self.speed)?;
        positive("match_tolerance_sq", self.match_tolerance_sq)?;
        positive("tessellation_error", self.tessellation_error)?;
        if let Some(interval) = self.rebuild_interval {
            positive("rebuild_interval", interval)?;
        }
        Ok(())
    }
}
