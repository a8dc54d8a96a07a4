//! Interacting Multiple Models (IMM) filter over transport modes.
//!
//! Maintains one drag-model Kalman filter per [`Mode`] and a probability
//! vector μ over modes. Mode switches follow a continuous-time Markov chain
//! with rate matrix Q (off-diagonal 1/((N−1)·τ), diagonal −1/τ), so the
//! transition matrix for a step of Δt seconds is M(Δt) = exp(Q·Δt).
//!
//! Per step:
//! 1. M(Δt), predicted mode probabilities c̄ⱼ = Σᵢ Mᵢⱼ·μᵢ
//! 2. Interaction: mixed initial condition per target mode
//! 3. Predict each filter from its mixed state (skipped for Δt = 0)
//! 4. Update each filter with the fix, collecting likelihoods Λⱼ
//! 5. Optional external activity prior pⱼ multiplies c̄ⱼ
//! 6. μⱼ ∝ max(c̄ⱼ·pⱼ·Λⱼ, ε)
//! 7. Fused mean and covariance (including the spread of the hypotheses)

use crate::{
    error::{ConfigError, FilterError},
    kf::{DragKalmanFilter, DragParams, KalmanFilter},
    types::{MeasCov, MeasVec, Mode, ModeMatrix, ModeTable, ModeVec, StateCov, StateVec, N_MODES},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration of the filter bank and mode chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmConfig {
    /// (force, drag) per mode
    pub mode_parameters: ModeTable<DragParams>,
    /// Longest step used for discretising the drag model (s)
    pub dt_clamp: f64,
    /// Mean time spent in one mode, τ (s)
    pub mean_state_duration: f64,
    /// Prior mean position; `None` starts each trip at its first fix
    pub initial_position: Option<[f64; 2]>,
    /// Prior position std (m)
    pub initial_location_std: f64,
    /// Prior speed std (m/s)
    pub initial_speed_std: f64,
}

impl Default for ImmConfig {
    fn default() -> Self {
        Self {
            mode_parameters: ModeTable {
                still: DragParams::new(0.5, 1.0),
                walking: DragParams::new(2.0, 0.6),
                cycling: DragParams::new(3.0, 0.06),
                driving: DragParams::new(3.5, 0.008),
            },
            dt_clamp: 300.0,
            mean_state_duration: 300.0,
            initial_position: None,
            initial_location_std: 10_000.0,
            initial_speed_std: 200.0,
        }
    }
}

impl ImmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (mode, p) in self.mode_parameters.iter() {
            for (field, value) in [("force", p.force), ("drag", p.drag)] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(ConfigError::ModeParameter { mode, field, value });
                }
            }
        }
        for (field, value) in [
            ("dt_clamp", self.dt_clamp),
            ("mean_state_duration", self.mean_state_duration),
            ("initial_location_std", self.initial_location_std),
            ("initial_speed_std", self.initial_speed_std),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mode chain
// ---------------------------------------------------------------------------

/// Continuous-time rate matrix with equal exit rates and equal
/// destination probabilities.
pub fn rate_matrix(mean_state_duration: f64) -> ModeMatrix {
    let exit = 1.0 / mean_state_duration;
    let off = exit / (N_MODES - 1) as f64;
    ModeMatrix::from_fn(|i, j| if i == j { -exit } else { off })
}

/// M(Δt) = exp(Q·Δt), cleaned of rounding so that each row is a
/// probability distribution.
pub fn transition_matrix(rate: &ModeMatrix, dt: f64) -> ModeMatrix {
    if dt <= 0.0 {
        return ModeMatrix::identity();
    }
    let mut m = (rate * dt).exp();
    for mut row in m.row_iter_mut() {
        row.apply(|v| *v = v.max(0.0));
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        }
    }
    m
}

// ---------------------------------------------------------------------------
// Filter bank (read-only, shareable across streams)
// ---------------------------------------------------------------------------

/// Per-mode filters and the mode chain. Immutable once built.
#[derive(Clone, Debug)]
pub struct FilterBank {
    pub filters: [DragKalmanFilter; N_MODES],
    pub rate: ModeMatrix,
    /// Prior covariance, also the reset target after a process-noise overflow
    pub initial_cov: StateCov,
    pub initial_position: Option<[f64; 2]>,
}

impl FilterBank {
    pub fn new(config: &ImmConfig) -> Self {
        let loc_var = config.initial_location_std.powi(2);
        let speed_var = config.initial_speed_std.powi(2);
        Self {
            filters: config
                .mode_parameters
                .to_array()
                .map(|p| DragKalmanFilter::new(p, config.dt_clamp)),
            rate: rate_matrix(config.mean_state_duration),
            initial_cov: StateCov::from_diagonal(&StateVec::new(
                loc_var, loc_var, speed_var, speed_var,
            )),
            initial_position: config.initial_position,
        }
    }

    pub fn transition_matrix(&self, dt: f64) -> ModeMatrix {
        transition_matrix(&self.rate, dt)
    }
}

// ---------------------------------------------------------------------------
// IMM state
// ---------------------------------------------------------------------------

/// Estimate of one mode's filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImmModel {
    pub mode: Mode,
    pub state: StateVec,
    pub cov: StateCov,
}

/// Everything the IMM produced at one step. Kept per step so that a
/// backward smoothing pass can be run over a finished trip.
#[derive(Clone, Debug)]
pub struct ImmStep {
    /// Step length used for M(Δt) (s)
    pub dt: f64,
    pub transition: ModeMatrix,
    /// Posterior mode probabilities μ
    pub mode_probs: ModeVec,
    /// Observation likelihood Λ per mode
    pub likelihoods: ModeVec,
    pub fused_state: StateVec,
    pub fused_cov: StateCov,
    /// Posterior per-mode estimates
    pub models: [ImmModel; N_MODES],
    /// Accumulated log-likelihood of the stream so far
    pub log_likelihood: f64,
    /// Number of mode filters whose covariance was reset this step
    pub covariance_resets: u32,
    /// Number of mode filters with a degenerate innovation this step
    pub degenerate_updates: u32,
}

/// Per-stream IMM state: per-mode (m, S), μ and the accumulated
/// log-likelihood. Owned by the worker processing the stream.
#[derive(Clone, Debug)]
pub struct ImmState {
    pub models: [ImmModel; N_MODES],
    pub mode_probs: ModeVec,
    pub fused_state: StateVec,
    pub fused_cov: StateCov,
    pub log_likelihood: f64,
}

impl ImmState {
    /// Start every mode at the same wide prior, with uniform μ.
    pub fn new(state: StateVec, cov: StateCov) -> Self {
        Self {
            models: Mode::ALL.map(|mode| ImmModel { mode, state, cov }),
            mode_probs: ModeVec::repeat(1.0 / N_MODES as f64),
            fused_state: state,
            fused_cov: cov,
            log_likelihood: 0.0,
        }
    }

    /// Prior for a trip whose first fix is `first_fix`.
    pub fn from_bank(bank: &FilterBank, first_fix: &MeasVec) -> Self {
        let [x, y] = bank.initial_position.unwrap_or([first_fix[0], first_fix[1]]);
        Self::new(StateVec::new(x, y, 0.0, 0.0), bank.initial_cov)
    }

    /// Advance by `dt` seconds and absorb the fix `z` with noise `r`.
    /// `prior` is an external categorical distribution over modes.
    pub fn step(
        &mut self,
        bank: &FilterBank,
        dt: f64,
        z: &MeasVec,
        r: &MeasCov,
        prior: Option<&ModeVec>,
    ) -> ImmStep {
        let dt = dt.max(0.0);
        let transition = bank.transition_matrix(dt);
        // c̄ⱼ = Σᵢ Mᵢⱼ·μᵢ
        let c_bar = transition.transpose() * self.mode_probs;
        let mixed = self.interaction(&transition, &c_bar);

        let mut likelihoods = ModeVec::zeros();
        let mut covariance_resets = 0;
        let mut degenerate_updates = 0;

        for (j, (x_mix, p_mix)) in mixed.into_iter().enumerate() {
            let kf = &bank.filters[j];
            let mode = self.models[j].mode;

            let (x_pred, p_pred) = match kf.predict(&x_mix, &p_mix, dt) {
                Ok(pred) => pred,
                Err(err @ FilterError::ProcessNoiseOverflow { .. }) => {
                    warn!(%mode, %err, "resetting covariance to prior");
                    covariance_resets += 1;
                    (x_mix, bank.initial_cov)
                }
                Err(err) => {
                    warn!(%mode, %err, "prediction failed, keeping mixed estimate");
                    (x_mix, p_mix)
                }
            };

            let res = kf.update(&x_pred, &p_pred, z, r);
            if res.degenerate {
                debug!(%mode, "degenerate innovation covariance, likelihood floored");
                degenerate_updates += 1;
            }
            likelihoods[j] = res.likelihood;
            self.models[j].state = res.state;
            self.models[j].cov = res.cov;
        }

        // μⱼ ∝ c̄ⱼ · pⱼ · Λⱼ
        let mut weights = c_bar;
        if let Some(p) = prior {
            weights.component_mul_assign(p);
        }
        let joint = weights.component_mul(&likelihoods);
        self.log_likelihood += joint.sum().max(f64::MIN_POSITIVE).ln();

        self.mode_probs = joint.map(|v| v.max(f64::EPSILON));
        self.normalise_probs();
        self.fuse();

        ImmStep {
            dt,
            transition,
            mode_probs: self.mode_probs,
            likelihoods,
            fused_state: self.fused_state,
            fused_cov: self.fused_cov,
            models: self.models,
            log_likelihood: self.log_likelihood,
            covariance_resets,
            degenerate_updates,
        }
    }

    fn interaction(&self, transition: &ModeMatrix, c_bar: &ModeVec) -> Vec<(StateVec, StateCov)> {
        let mut mixed = Vec::with_capacity(N_MODES);
        for j in 0..N_MODES {
            let c_j = c_bar[j].max(1e-300);
            let weights: Vec<f64> = (0..N_MODES)
                .map(|i| transition[(i, j)] * self.mode_probs[i] / c_j)
                .collect();

            let mut x_mix = StateVec::zeros();
            for (model, w) in self.models.iter().zip(&weights) {
                x_mix += model.state * *w;
            }

            let mut p_mix = StateCov::zeros();
            for (model, w) in self.models.iter().zip(&weights) {
                let dx = model.state - x_mix;
                p_mix += (model.cov + dx * dx.transpose()) * *w;
            }
            mixed.push((x_mix, p_mix));
        }
        mixed
    }

    fn fuse(&mut self) {
        let mut x_fused = StateVec::zeros();
        for (m, p) in self.models.iter().zip(self.mode_probs.iter()) {
            x_fused += m.state * *p;
        }

        let mut p_fused = StateCov::zeros();
        for (m, p) in self.models.iter().zip(self.mode_probs.iter()) {
            let dx = m.state - x_fused;
            p_fused += (m.cov + dx * dx.transpose()) * *p;
        }
        self.fused_state = x_fused;
        self.fused_cov = p_fused;
    }

    fn normalise_probs(&mut self) {
        let sum = self.mode_probs.sum();
        self.mode_probs /= sum;
    }

    pub fn dominant_mode(&self) -> Mode {
        Mode::from_index(self.mode_probs.imax()).unwrap_or(Mode::Still)
    }
}
