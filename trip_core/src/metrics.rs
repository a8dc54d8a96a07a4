//! Decoding metrics: mode accuracy, fused-position RMSE, switch offsets.

use crate::{pipeline::TraceStep, types::Mode};
use serde::{Deserialize, Serialize};

/// Time tolerance when pairing trace steps with ground truth (s).
const TIME_TOLERANCE: f64 = 1e-6;

/// True state of the traveller at a sample time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub mode: Mode,
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DecodingMetrics {
    /// Number of trace steps paired with ground truth
    pub n_matched: u64,
    /// Steps whose decoded mode equals the true mode
    pub n_mode_correct: u64,
    /// Sum of squared fused-position errors (for RMSE)
    pub sum_sq_pos_err: f64,
    /// True mode switches seen
    pub true_switches: u64,
    /// True switches with a decoded switch into the same mode
    pub detected_switches: u64,
    /// Sum of |decoded − true| switch index offsets over detected switches
    pub sum_switch_offset: u64,
}

impl DecodingMetrics {
    /// Share of paired steps with the correct decoded mode.
    pub fn mode_accuracy(&self) -> f64 {
        if self.n_matched == 0 {
            return 0.0;
        }
        self.n_mode_correct as f64 / self.n_matched as f64
    }

    /// Root-mean-square position error (meters, 2D).
    pub fn rmse_position(&self) -> f64 {
        if self.n_matched == 0 {
            return 0.0;
        }
        (self.sum_sq_pos_err / self.n_matched as f64).sqrt()
    }

    /// Mean offset (samples) of detected mode switches.
    pub fn mean_switch_offset(&self) -> f64 {
        if self.detected_switches == 0 {
            return 0.0;
        }
        self.sum_switch_offset as f64 / self.detected_switches as f64
    }

    /// Accumulate one decoded stream. Both slices are in time order; steps
    /// without ground truth at the same time are ignored.
    pub fn accumulate(&mut self, trace: &[TraceStep], truth: &[GroundTruth]) {
        let mut pairs: Vec<(&TraceStep, &GroundTruth)> = Vec::with_capacity(trace.len());
        let mut j = 0;
        for step in trace {
            while j < truth.len() && truth[j].time < step.time - TIME_TOLERANCE {
                j += 1;
            }
            if let Some(gt) = truth.get(j) {
                if (gt.time - step.time).abs() <= TIME_TOLERANCE {
                    pairs.push((step, gt));
                }
            }
        }

        for (step, gt) in &pairs {
            let dx = step.fused_state[0] - gt.x;
            let dy = step.fused_state[1] - gt.y;
            self.sum_sq_pos_err += dx * dx + dy * dy;
            self.n_matched += 1;
            if step.mode == gt.mode {
                self.n_mode_correct += 1;
            }
        }

        let switches = |modes: Vec<Mode>| -> Vec<(usize, Mode)> {
            modes
                .windows(2)
                .enumerate()
                .filter(|(_, w)| w[0] != w[1])
                .map(|(i, w)| (i + 1, w[1]))
                .collect()
        };
        let true_switches = switches(pairs.iter().map(|(_, gt)| gt.mode).collect());
        let decoded_switches = switches(pairs.iter().map(|(step, _)| step.mode).collect());

        for (index, mode) in true_switches {
            self.true_switches += 1;
            let nearest = decoded_switches
                .iter()
                .filter(|(_, m)| *m == mode)
                .map(|(i, _)| i.abs_diff(index))
                .min();
            if let Some(offset) = nearest {
                self.detected_switches += 1;
                self.sum_switch_offset += offset as u64;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModeVec, StateCov, StateVec, TripId};
    use approx::assert_abs_diff_eq;

    fn step(time: f64, x: f64, mode: Mode) -> TraceStep {
        TraceStep {
            trip_id: TripId(0),
            time,
            fused_state: StateVec::new(x, 0.0, 0.0, 0.0),
            fused_cov: StateCov::identity(),
            mode_probs: ModeVec::repeat(0.25),
            log_likelihood: 0.0,
            mode,
        }
    }

    fn truth(time: f64, mode: Mode) -> GroundTruth {
        GroundTruth { time, x: 0.0, y: 0.0, mode }
    }

    #[test]
    fn empty_metrics_are_zero() {
        let m = DecodingMetrics::default();
        assert_eq!(m.mode_accuracy(), 0.0);
        assert_eq!(m.rmse_position(), 0.0);
        assert_eq!(m.mean_switch_offset(), 0.0);
    }

    #[test]
    fn accuracy_rmse_and_switch_offset() {
        let modes = [Mode::Walking, Mode::Walking, Mode::Walking, Mode::Cycling, Mode::Cycling, Mode::Cycling];
        let decoded = [Mode::Walking, Mode::Walking, Mode::Walking, Mode::Walking, Mode::Cycling, Mode::Cycling];
        let trace: Vec<TraceStep> = decoded
            .iter()
            .enumerate()
            .map(|(i, m)| step(i as f64, 3.0, *m))
            .collect();
        let gt: Vec<GroundTruth> = modes.iter().enumerate().map(|(i, m)| truth(i as f64, *m)).collect();

        let mut metrics = DecodingMetrics::default();
        metrics.accumulate(&trace, &gt);
        assert_eq!(metrics.n_matched, 6);
        assert_abs_diff_eq!(metrics.mode_accuracy(), 5.0 / 6.0);
        assert_abs_diff_eq!(metrics.rmse_position(), 3.0);
        assert_eq!(metrics.true_switches, 1);
        assert_eq!(metrics.detected_switches, 1);
        assert_abs_diff_eq!(metrics.mean_switch_offset(), 1.0);
    }

    #[test]
    fn unpaired_steps_are_ignored() {
        let trace = vec![step(0.0, 0.0, Mode::Walking), step(1.5, 0.0, Mode::Walking), step(2.0, 0.0, Mode::Walking)];
        let gt = vec![truth(0.0, Mode::Walking), truth(1.0, Mode::Walking), truth(2.0, Mode::Walking)];
        let mut metrics = DecodingMetrics::default();
        metrics.accumulate(&trace, &gt);
        assert_eq!(metrics.n_matched, 2);
        assert_eq!(metrics.mode_accuracy(), 1.0);
    }
}
