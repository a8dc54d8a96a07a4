//! Observation models: H matrix, R matrix and external activity priors.
//!
//! # Measurement
//! A GPS fix is a position z = [x, y] in the local planar CRS (metres),
//! observed against the drag-model state x = [px, py, vx, vy].
//!
//! The device reports `loc_error`, the 1σ radius of the position error. It is
//! used as an isotropic standard deviation on both axes: R = diag(σ², σ²).
//! Reported speed and heading are not observed.

use nalgebra::{Matrix2, SMatrix, SVector, Vector2, Vector4};
use serde::{Deserialize, Serialize};

/// 2×4 observation matrix.
pub type ObsMatrix = SMatrix<f64, 2, 4>;

/// H for a position-only measurement of [px, py, vx, vy].
pub fn position_h() -> ObsMatrix {
    #[rustfmt::skip]
    let h = ObsMatrix::new(
        1., 0., 0., 0.,
        0., 1., 0., 0.,
    );
    h
}

/// Trait for a linear observation model of the 4-state drag filter.
pub trait ObservationModel {
    /// Observation matrix H
    fn h_matrix(&self) -> ObsMatrix;
    /// Measurement noise covariance R
    fn r_matrix(&self) -> Matrix2<f64>;
    /// Map state to expected measurement h(x)
    fn apply(&self, state: &Vector4<f64>) -> Vector2<f64> {
        self.h_matrix() * state
    }
}

// ---------------------------------------------------------------------------
// Position fix
// ---------------------------------------------------------------------------

/// Position-only fix with isotropic error.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PositionFix {
    /// Std deviation on each axis (meters)
    pub sigma: f64,
}

impl PositionFix {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }
}

impl ObservationModel for PositionFix {
    fn h_matrix(&self) -> ObsMatrix {
        position_h()
    }

    fn r_matrix(&self) -> Matrix2<f64> {
        let var = self.sigma * self.sigma;
        Matrix2::new(var, 0.0, 0.0, var)
    }
}

// ---------------------------------------------------------------------------
// Activity hint prior
// ---------------------------------------------------------------------------

/// Categorical prior from an external activity classifier: `confidence` on
/// the reported class, the rest spread evenly over the other `N − 1` classes.
///
/// Returns `None` for an out-of-range index or a confidence outside [0, 1].
pub fn categorical_prior<const N: usize>(index: usize, confidence: f64) -> Option<SVector<f64, N>> {
    if index >= N || N < 2 || !(0.0..=1.0).contains(&confidence) {
        return None;
    }
    let leftover = (1.0 - confidence) / (N - 1) as f64;
    let mut prior = SVector::<f64, N>::repeat(leftover);
    prior[index] = confidence;
    Some(prior)
}
