//! `location_models` — GPS fix observation model, activity hint priors and
//! map projections between WGS84 and the local planar CRS.

pub mod observation;
pub mod projection;

pub use observation::{categorical_prior, position_h, ObsMatrix, ObservationModel, PositionFix};
pub use projection::{ProjectionError, Projector, TransverseMercator};
