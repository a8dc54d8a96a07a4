//! `trip_core` — Trip and transport-mode inference from location streams.
//!
//! # Module layout
//! - [`types`]      — Fundamental types (modes, observations, state vectors)
//! - [`error`]      — Error taxonomy
//! - [`preprocess`] — Admission, normalisation, gap-based trip segmentation
//! - [`kf`]         — Drag-model Kalman filter (predict / Joseph update / likelihood)
//! - [`imm`]        — Interacting Multiple Models over transport modes
//! - [`viterbi`]    — Most likely mode sequence
//! - [`legs`]       — Leg segmentation and length on the filtered trajectory
//! - [`records`]    — Trip / leg output records
//! - [`pipeline`]   — Per-user orchestration and the parallel multi-user driver
//! - [`ingest`]     — Raw location records to per-device streams
//! - [`metrics`]    — Mode accuracy, position RMSE, switch offsets

pub mod error;
pub mod imm;
pub mod ingest;
pub mod kf;
pub mod legs;
pub mod metrics;
pub mod pipeline;
pub mod preprocess;
pub mod records;
pub mod types;
pub mod viterbi;

pub use error::{ConfigError, FilterError, InputError, PipelineError};
pub use pipeline::{process_users, CancelFlag, PipelineConfig, StreamOutput, TraceStep, TripPipeline};
pub use records::{LegPoint, LegRecord, TripRecord};
pub use types::{ActivityHint, Mode, ModeTable, Observation, StateCov, StateVec, TripId};
