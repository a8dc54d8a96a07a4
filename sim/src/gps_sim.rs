//! GPS location sample simulator.
//!
//! Generates a device's location stream from a traveller's plan with:
//! - Uniform position noise
//! - Per-sample reported `loc_error`
//! - Sample dropouts
//! - Optional activity hints from the segment's mode
//! - Upload batching (`created_at` per batch of samples)

use crate::traveller::{PlanItem, Traveller};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use trip_core::{metrics::GroundTruth, types::Observation};

/// Noise and device behaviour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsParams {
    /// Half-width of the uniform noise on each axis (m)
    pub position_noise: f64,
    /// Reported 1σ error (m)
    pub loc_error: f64,
    /// Probability that a sample is lost
    pub dropout_probability: f64,
    /// Samples per upload batch; 0 leaves `created_at` unset
    pub upload_batch: usize,
    /// Seconds between the last sample of a batch and its upload
    pub upload_delay: f64,
}

impl Default for GpsParams {
    fn default() -> Self {
        Self {
            position_noise: 4.0,
            loc_error: 5.0,
            dropout_probability: 0.0,
            upload_batch: 0,
            upload_delay: 30.0,
        }
    }
}

/// A generated stream and its ground truth, sample for sample.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Recording {
    pub observations: Vec<Observation>,
    pub ground_truth: Vec<GroundTruth>,
}

/// Turns a traveller's plan into noisy location samples.
pub struct GpsSimulator {
    pub params: GpsParams,
    rng: ChaCha8Rng,
}

impl GpsSimulator {
    pub fn new(params: GpsParams, seed: u64) -> Self {
        Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn noise(&mut self) -> f64 {
        let a = self.params.position_noise;
        self.rng.gen::<f64>() * a * 2.0 - a
    }

    /// Follow the whole plan starting at `start_time`.
    pub fn record(&mut self, traveller: &mut Traveller, start_time: f64) -> Recording {
        let mut out = Recording::default();
        let mut time = start_time;
        let mut first = true;

        for item in traveller.plan.clone() {
            let segment = match item {
                PlanItem::Move(segment) => segment,
                PlanItem::Pause { duration } => {
                    time += duration;
                    continue;
                }
                PlanItem::Relocate { duration, dx, dy } => {
                    time += duration;
                    traveller.state[0] += dx;
                    traveller.state[1] += dy;
                    continue;
                }
            };

            for k in 0..segment.samples() {
                let elapsed = k as f64 * segment.sample_interval;
                traveller.set_velocity(&segment.motion, elapsed);
                if !first {
                    traveller.step(segment.sample_interval);
                    time += segment.sample_interval;
                }
                first = false;

                if self.rng.gen::<f64>() < self.params.dropout_probability {
                    continue;
                }

                let (x, y) = traveller.pos_2d();
                let mut obs = Observation::new(time, x + self.noise(), y + self.noise(), self.params.loc_error);
                if let Some(confidence) = segment.hint_confidence {
                    obs = obs.with_hint(segment.mode, confidence);
                }
                out.observations.push(obs);
                out.ground_truth.push(GroundTruth {
                    time,
                    x,
                    y,
                    mode: segment.mode,
                });
            }
        }

        self.assign_uploads(&mut out.observations);
        out
    }

    fn assign_uploads(&self, observations: &mut [Observation]) {
        let batch = self.params.upload_batch;
        if batch == 0 {
            return;
        }
        for chunk in observations.chunks_mut(batch) {
            let uploaded = chunk.last().map_or(0.0, |o| o.time) + self.params.upload_delay;
            for obs in chunk {
                obs.created_at = Some(uploaded);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traveller::{MotionSpec, Segment};
    use trip_core::types::Mode;

    fn walker() -> Traveller {
        Traveller::new(
            "d",
            [0.0, 0.0],
            vec![
                PlanItem::Move(Segment::new(Mode::Walking, MotionSpec::Straight { speed: 1.0, heading: 0.0 }, 20.0, 2.0)),
                PlanItem::Pause { duration: 100.0 },
                PlanItem::Move(Segment::new(Mode::Walking, MotionSpec::Straight { speed: 1.0, heading: 0.0 }, 20.0, 2.0).with_hint(0.7)),
            ],
        )
    }

    #[test]
    fn follows_the_plan() {
        let mut sim = GpsSimulator::new(GpsParams { position_noise: 0.0, ..Default::default() }, 1);
        let rec = sim.record(&mut walker(), 1000.0);
        assert_eq!(rec.observations.len(), 20);
        assert_eq!(rec.observations[0].time, 1000.0);
        assert_eq!(rec.observations[9].time, 1018.0);
        // The pause adds its duration on top of the next sample interval.
        assert_eq!(rec.observations[10].time, 1120.0);
        assert_eq!(rec.observations[9].x, 18.0);
        assert!(rec.observations[..10].iter().all(|o| o.hint.is_none()));
        assert!(rec.observations[10..].iter().all(|o| o.hint.is_some()));
    }

    #[test]
    fn deterministic_per_seed() {
        let a = GpsSimulator::new(GpsParams::default(), 9).record(&mut walker(), 0.0);
        let b = GpsSimulator::new(GpsParams::default(), 9).record(&mut walker(), 0.0);
        let c = GpsSimulator::new(GpsParams::default(), 10).record(&mut walker(), 0.0);
        assert_eq!(a.observations, b.observations);
        assert_ne!(a.observations, c.observations);
    }

    #[test]
    fn noise_is_bounded() {
        let mut sim = GpsSimulator::new(GpsParams { position_noise: 3.0, ..Default::default() }, 5);
        let rec = sim.record(&mut walker(), 0.0);
        for (obs, gt) in rec.observations.iter().zip(&rec.ground_truth) {
            assert!((obs.x - gt.x).abs() <= 3.0 && (obs.y - gt.y).abs() <= 3.0);
        }
    }

    #[test]
    fn uploads_in_batches() {
        let params = GpsParams {
            upload_batch: 8,
            upload_delay: 10.0,
            ..Default::default()
        };
        let rec = GpsSimulator::new(params, 2).record(&mut walker(), 0.0);
        assert_eq!(rec.observations[0].created_at, Some(rec.observations[7].time + 10.0));
        let last = rec.observations.last().unwrap();
        assert_eq!(last.created_at, Some(last.time + 10.0));
    }

    #[test]
    fn dropouts_remove_samples() {
        let params = GpsParams {
            dropout_probability: 0.5,
            ..Default::default()
        };
        let rec = GpsSimulator::new(params, 4).record(&mut walker(), 0.0);
        assert!(rec.observations.len() < 20);
        assert_eq!(rec.observations.len(), rec.ground_truth.len());
    }
}
