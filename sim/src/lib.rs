//! `sim` — Scenario simulator: traveller journeys, GPS samples, replay.

pub mod gps_sim;
pub mod replay;
pub mod scenarios;
pub mod traveller;

pub use gps_sim::{GpsParams, GpsSimulator, Recording};
pub use replay::{load_replay, save_replay, ReplayLog};
pub use scenarios::{Scenario, ScenarioKind};
pub use traveller::{MotionSpec, PlanItem, Segment, Traveller};
