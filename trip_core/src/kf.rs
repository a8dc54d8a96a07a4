//! Drag-force Kalman filter: predict, update and observation likelihood.
//!
//! # Design choices
//! - One **linear KF** per transport mode; the modes differ only by their
//!   `(force, drag)` parameters, so a single type serves the whole bank.
//! - All math is done in `f64` via fixed-size `nalgebra` types.
//!
//! ## State vector
//! x = [px, py, vx, vy]ᵀ
//!
//! ## Continuous model
//! ẋ = v,  v̇ = −drag·v + w,  w ~ N(0, q·I) white, q = force²
//!
//! ## Discretisation for a step Δt (b = drag, e₁ = 1 − e^(−bΔt), e₂ = 1 − e^(−2bΔt))
//! Fd = [[I, e₁/b·I], [0, e^(−bΔt)·I]]
//! Qd = q · [[ (Δt − 2e₁/b + e₂/(2b))/b² · I,  e₁²/(2b²) · I ],
//!           [ e₁²/(2b²) · I,                   e₂/(2b) · I   ]]

use crate::{
    error::FilterError,
    types::{MeasCov, MeasVec, StateCov, StateVec},
};
use location_models::position_h;
use nalgebra::{Matrix4, SMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

const LN_2PI: f64 = 1.837_877_066_409_345_5;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for a Kalman filter model (predict + update).
pub trait KalmanFilter {
    /// Predict state and covariance forward by `dt` seconds.
    fn predict(
        &self,
        state: &StateVec,
        cov: &StateCov,
        dt: f64,
    ) -> Result<(StateVec, StateCov), FilterError>;

    /// Update state and covariance with a position fix `z` of noise `R`.
    fn update(&self, state: &StateVec, cov: &StateCov, z: &MeasVec, r: &MeasCov) -> KfUpdateResult;
}

/// Result of a KF update step.
#[derive(Clone, Debug)]
pub struct KfUpdateResult {
    pub state: StateVec,
    pub cov: StateCov,
    /// Innovation ν = z − H·x
    pub innovation: MeasVec,
    /// Innovation covariance S = H·P·Hᵀ + R
    pub innovation_cov: MeasCov,
    /// Kalman gain K (zero when the update was skipped)
    pub kalman_gain: SMatrix<f64, 4, 2>,
    /// N(ν; 0, S), floored at machine epsilon
    pub likelihood: f64,
    /// S was not positive definite; the update was skipped
    pub degenerate: bool,
}

// ---------------------------------------------------------------------------
// Drag model
// ---------------------------------------------------------------------------

/// Per-mode parameters of the drag model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DragParams {
    /// Process noise std (m/s²)
    pub force: f64,
    /// Velocity decay rate (1/s)
    pub drag: f64,
}

impl DragParams {
    pub const fn new(force: f64, drag: f64) -> Self {
        Self { force, drag }
    }
}

/// Drag-force Kalman filter (4-state, linear).
#[derive(Clone, Debug)]
pub struct DragKalmanFilter {
    pub params: DragParams,
    /// Upper bound on the step length used for discretisation (s)
    pub dt_clamp: f64,
}

impl DragKalmanFilter {
    pub fn new(params: DragParams, dt_clamp: f64) -> Self {
        Self { params, dt_clamp }
    }

    /// Build state transition matrix Fd for timestep dt.
    pub fn transition_matrix(drag: f64, dt: f64) -> Matrix4<f64> {
        let decay = (-drag * dt).exp();
        let gain = -(-drag * dt).exp_m1() / drag;
        let mut f = Matrix4::<f64>::identity();
        f[(0, 2)] = gain;
        f[(1, 3)] = gain;
        f[(2, 2)] = decay;
        f[(3, 3)] = decay;
        f
    }

    /// Build discrete process noise Qd for timestep dt.
    pub fn process_noise(force: f64, drag: f64, dt: f64) -> Result<Matrix4<f64>, FilterError> {
        let q = force * force;
        let b = drag;
        let e1 = -(-b * dt).exp_m1();
        let e2 = -(-2.0 * b * dt).exp_m1();

        let pos = q / (b * b) * (dt - 2.0 * e1 / b + e2 / (2.0 * b));
        let cross = q * e1 * e1 / (2.0 * b * b);
        let vel = q * e2 / (2.0 * b);

        if !(pos.is_finite() && cross.is_finite() && vel.is_finite()) {
            return Err(FilterError::ProcessNoiseOverflow { dt });
        }

        let mut qm = Matrix4::<f64>::zeros();
        for i in 0..2usize {
            qm[(i, i)] = pos;
            qm[(i + 2, i + 2)] = vel;
            qm[(i, i + 2)] = cross;
            qm[(i + 2, i)] = cross;
        }
        Ok(qm)
    }
}

impl KalmanFilter for DragKalmanFilter {
    fn predict(
        &self,
        state: &StateVec,
        cov: &StateCov,
        dt: f64,
    ) -> Result<(StateVec, StateCov), FilterError> {
        let dt = dt.min(self.dt_clamp);
        if dt <= 0.0 {
            return Ok((*state, *cov));
        }
        let DragParams { force, drag } = self.params;
        let f = Self::transition_matrix(drag, dt);
        let q = Self::process_noise(force, drag, dt)?;
        let predicted_state = f * state;
        let predicted_cov = f * cov * f.transpose() + q;
        if predicted_state.iter().chain(predicted_cov.iter()).any(|v| !v.is_finite()) {
            return Err(FilterError::ProcessNoiseOverflow { dt });
        }
        Ok((predicted_state, symmetrize(&predicted_cov)))
    }

    fn update(&self, state: &StateVec, cov: &StateCov, z: &MeasVec, r: &MeasCov) -> KfUpdateResult {
        let h = position_h();

        // Innovation: ν = z − H·x
        let innovation = z - h * state;

        // Innovation covariance: S = H·P·Hᵀ + R
        let s = symmetrize2(&(h * cov * h.transpose() + r));

        let (likelihood, s_inv) = match (observation_likelihood(&innovation, &s), s.try_inverse()) {
            (Ok(lik), Some(s_inv)) => (lik, s_inv),
            _ => {
                return KfUpdateResult {
                    state: *state,
                    cov: symmetrize(cov),
                    innovation,
                    innovation_cov: s,
                    kalman_gain: SMatrix::zeros(),
                    likelihood: f64::EPSILON,
                    degenerate: true,
                };
            }
        };

        // Kalman gain: K = P·Hᵀ·S⁻¹
        let k = cov * h.transpose() * s_inv;

        // Updated state: x' = x + K·ν
        let new_state = state + k * innovation;

        // Updated covariance: Joseph form P' = (I−KH)·P·(I−KH)ᵀ + K·R·Kᵀ
        let i_kh = StateCov::identity() - k * h;
        let new_cov = i_kh * cov * i_kh.transpose() + k * r * k.transpose();

        KfUpdateResult {
            state: new_state,
            cov: symmetrize(&new_cov),
            innovation,
            innovation_cov: s,
            kalman_gain: k,
            likelihood,
            degenerate: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Likelihood
// ---------------------------------------------------------------------------

/// Log-density of a zero-mean bivariate normal at `innovation`, computed
/// through the eigendecomposition of the (symmetric) covariance.
pub fn innovation_logpdf(innovation: &MeasVec, s: &MeasCov) -> Result<f64, FilterError> {
    let eig = SymmetricEigen::new(*s);
    let max_ev = eig.eigenvalues.max();
    if !max_ev.is_finite() || max_ev <= 0.0 {
        return Err(FilterError::DegenerateInnovation);
    }
    let floor = f64::EPSILON * max_ev;
    if eig.eigenvalues.iter().any(|&ev| !ev.is_finite() || ev <= floor) {
        return Err(FilterError::DegenerateInnovation);
    }

    // Mahalanobis distance in the eigenbasis: Σ (uᵢ·ν)² / λᵢ
    let proj = eig.eigenvectors.transpose() * innovation;
    let maha2: f64 = proj
        .iter()
        .zip(eig.eigenvalues.iter())
        .map(|(p, ev)| p * p / ev)
        .sum();
    let log_det: f64 = eig.eigenvalues.iter().map(|ev| ev.ln()).sum();

    Ok(-0.5 * (innovation.len() as f64 * LN_2PI + log_det + maha2))
}

/// Linear likelihood N(ν; 0, S), floored at machine epsilon.
pub fn observation_likelihood(innovation: &MeasVec, s: &MeasCov) -> Result<f64, FilterError> {
    innovation_logpdf(innovation, s).map(|lp| lp.exp().max(f64::EPSILON))
}

/// ½(P + Pᵀ)
pub fn symmetrize(p: &StateCov) -> StateCov {
    (p + p.transpose()) * 0.5
}

fn symmetrize2(s: &MeasCov) -> MeasCov {
    (s + s.transpose()) * 0.5
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
