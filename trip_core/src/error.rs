//! Error types for trip inference.
//!
//! Only [`PipelineError`] and [`ConfigError`] escape the pipeline. Input and
//! filter errors are handled where they occur (skip the sample, reset the
//! covariance, floor the likelihood) and are returned by the lower-level
//! functions so the caller can log and count them.

use crate::types::Mode;
use location_models::ProjectionError;
use thiserror::Error;

/// Rejected pipeline configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("mode {mode}: {field} must be positive and finite, got {value}")]
    ModeParameter {
        mode: Mode,
        field: &'static str,
        value: f64,
    },

    #[error("{field} must be positive and finite, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),

    #[error("projection: {0}")]
    Projection(String),
}

/// A raw or admitted sample that cannot enter the filter.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("non-finite value in field {0}")]
    NonFinite(&'static str),

    #[error("out of order sample at t={time} (previous t={previous})")]
    OutOfOrder { time: f64, previous: f64 },
}

/// Numerical trouble inside one mode filter.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("process noise overflow for dt={dt}")]
    ProcessNoiseOverflow { dt: f64 },

    #[error("innovation covariance is not positive definite")]
    DegenerateInnovation,
}

/// Failure that aborts the processing of one user's stream.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stream cancelled after {processed} samples")]
    Cancelled { processed: usize },

    #[error("dimension mismatch: {what} has {got} entries, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("non-finite {what} at t={time}")]
    NonFinite { what: &'static str, time: f64 },

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
