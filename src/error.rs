//! Load-time configuration errors
//!
//! Runtime conditions (no prediction yet, no safe route) are ordinary values,
//! not errors; only reading and validating configuration can fail.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be a positive finite number (got {value})")]
    NonPositive { field: &'static str, value: f32 },
    #[error("sequence '{0}' is defined twice")]
    DuplicateSequence(String),
    #[error("sequence '{0}' has no members")]
    EmptySequence(String),
    #[error("sequence '{name}' member {member} has an invalid shape")]
    InvalidShape { name: String, member: usize },
    #[error("sequence '{name}' member {member} has a negative or non-finite delay")]
    InvalidDelay { name: String, member: usize },
    #[error("sequence '{0}' repeats faster than the minimum period")]
    PeriodTooShort(String),
    #[error("unknown sequence '{0}'")]
    UnknownSequence(String),
    #[error("invalid grid: {0}")]
    InvalidGrid(&'static str),
    #[error("no venue named '{0}'")]
    UnknownVenue(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
