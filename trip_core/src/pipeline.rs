//! Pipeline orchestrator: trip inference for one user's location stream.
//!
//! # Processing steps per stream
//! 1. Admit, normalise and segment samples into candidate trips
//! 2. Drop trips without enough displaced low-error samples
//! 3. Run the IMM filter bank over each kept trip (one step per sample)
//! 4. Decode the most likely mode sequence with Viterbi
//! 5. Split the decoded trip into legs, drop still and short legs
//! 6. Emit trip records with WGS84 legs
//!
//! Independent users are processed in parallel by [`process_users`]; the
//! filter bank and projection are shared read-only, all filter state is
//! owned by the worker running the stream.

use crate::{
    error::{ConfigError, PipelineError},
    imm::{FilterBank, ImmConfig, ImmState, ImmStep},
    legs::{LegConfig, LegSegmenter},
    preprocess::{withhold_latest_upload, CandidateTrip, PreprocessConfig, PreprocessReport, TripSplitter},
    records::TripRecord,
    types::{Mode, ModeMatrix, ModeVec, Observation, StateCov, StateVec, TripId, N_MODES},
    viterbi::{DecoderConfig, ViterbiDecoder},
};
use location_models::{categorical_prior, ObservationModel, PositionFix, TransverseMercator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the trip inference pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub imm: ImmConfig,
    pub decoder: DecoderConfig,
    pub legs: LegConfig,
    /// Local planar CRS of the observations
    pub projection: TransverseMercator,
    /// Keep the per-step IMM output on [`StreamOutput::trace`]
    pub collect_trace: bool,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.imm.validate()?;

        let p = &self.preprocess;
        for (field, value) in [
            ("min_gap_between_trips", p.min_gap_between_trips),
            ("min_trip_displacement", p.min_trip_displacement),
            ("preprocess.good_loc_error", p.good_loc_error),
            ("loc_error_floor", p.loc_error_floor),
            ("default_loc_error", p.default_loc_error),
            ("legs.good_loc_error", self.legs.good_loc_error),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if self.legs.min_samples_per_leg == 0 {
            return Err(ConfigError::ZeroCount("min_samples_per_leg"));
        }
        for (mode, value) in self.legs.emission_factors.iter() {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(ConfigError::ModeParameter {
                    mode,
                    field: "emission_factor",
                    value: *value,
                });
            }
        }
        self.projection
            .projector()
            .map_err(|e| ConfigError::Projection(e.to_string()))?;
        if let Some(dt) = self.decoder.reference_dt {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(ConfigError::NonPositive {
                    field: "reference_dt",
                    value: dt,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared stop request, checked between samples.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Per-sample filter output, kept when `collect_trace` is set. Holds what a
/// backward smoothing pass needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub trip_id: TripId,
    pub time: f64,
    pub fused_state: StateVec,
    pub fused_cov: StateCov,
    pub mode_probs: ModeVec,
    pub log_likelihood: f64,
    /// Decoded mode
    pub mode: Mode,
}

/// Everything produced for one user's stream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StreamOutput {
    pub device: String,
    /// Trips with at least one retained leg, in time order
    pub trips: Vec<TripRecord>,
    pub preprocess: PreprocessReport,
    /// Filter steps run
    pub steps: usize,
    pub covariance_resets: u32,
    pub degenerate_updates: u32,
    /// Kept trips that produced no leg
    pub trips_without_legs: usize,
    /// Sum of the trips' IMM log-likelihoods
    pub log_likelihood: f64,
    pub trace: Vec<TraceStep>,
    /// Wall-clock processing time
    pub total_time_us: u64,
}

/// IMM and decoder output for one trip, aligned with its samples.
#[derive(Clone, Debug)]
pub struct TripEstimate {
    pub steps: Vec<ImmStep>,
    pub modes: Vec<Mode>,
}

impl TripEstimate {
    pub fn fused_states(&self) -> Vec<StateVec> {
        self.steps.iter().map(|s| s.fused_state).collect()
    }

    pub fn log_likelihood(&self) -> f64 {
        self.steps.last().map_or(0.0, |s| s.log_likelihood)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The trip inference pipeline. Immutable once built and shareable across
/// worker threads.
#[derive(Clone, Debug)]
pub struct TripPipeline {
    pub config: PipelineConfig,
    pub bank: FilterBank,
    segmenter: LegSegmenter,
    reference_transition: Option<ModeMatrix>,
}

impl TripPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let bank = FilterBank::new(&config.imm);
        let reference_transition = config.decoder.reference_dt.map(|dt| bank.transition_matrix(dt));
        let segmenter = LegSegmenter::new(config.legs.clone(), config.projection.clone());
        Ok(Self {
            config,
            bank,
            segmenter,
            reference_transition,
        })
    }

    /// Withhold the latest upload if configured, then process the stream.
    pub fn process_batch(
        &self,
        device: &str,
        mut observations: Vec<Observation>,
        cancel: &CancelFlag,
    ) -> Result<StreamOutput, PipelineError> {
        let withheld = if self.config.preprocess.drop_latest_upload {
            withhold_latest_upload(&mut observations)
        } else {
            0
        };
        let mut out = self.process_stream(device, observations, cancel)?;
        out.preprocess.withheld_latest = withheld;
        Ok(out)
    }

    /// Run the whole pipeline over one user's time-ordered stream. Only the
    /// currently open trip is buffered.
    pub fn process_stream(
        &self,
        device: &str,
        observations: impl IntoIterator<Item = Observation>,
        cancel: &CancelFlag,
    ) -> Result<StreamOutput, PipelineError> {
        let start = Instant::now();
        let mut out = StreamOutput {
            device: device.to_owned(),
            ..Default::default()
        };
        let mut splitter = TripSplitter::new(self.config.preprocess.clone());

        for (processed, obs) in observations.into_iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(device, processed, "stream cancelled, discarding open trips");
                return Err(PipelineError::Cancelled { processed });
            }
            match splitter.push(obs) {
                Ok(Some(trip)) => self.process_trip(trip, cancel, &mut out)?,
                Ok(None) => {}
                Err(err) => warn!(device, %err, "skipping observation"),
            }
        }
        if let Some(trip) = splitter.finish() {
            self.process_trip(trip, cancel, &mut out)?;
        }

        out.preprocess = splitter.report;
        out.total_time_us = start.elapsed().as_micros() as u64;
        Ok(out)
    }

    fn process_trip(
        &self,
        trip: CandidateTrip,
        cancel: &CancelFlag,
        out: &mut StreamOutput,
    ) -> Result<(), PipelineError> {
        let estimate = self.estimate_trip(&trip, cancel)?;
        out.steps += estimate.steps.len();
        out.log_likelihood += estimate.log_likelihood();
        for step in &estimate.steps {
            out.covariance_resets += step.covariance_resets;
            out.degenerate_updates += step.degenerate_updates;
        }

        if self.config.collect_trace {
            out.trace.extend(trip.samples.iter().zip(&estimate.steps).zip(&estimate.modes).map(
                |((sample, step), mode)| TraceStep {
                    trip_id: trip.id,
                    time: sample.obs.time,
                    fused_state: step.fused_state,
                    fused_cov: step.fused_cov,
                    mode_probs: step.mode_probs,
                    log_likelihood: step.log_likelihood,
                    mode: *mode,
                },
            ));
        }

        let legs = self
            .segmenter
            .segment(trip.id, &trip.samples, &estimate.fused_states(), &estimate.modes)?;
        match TripRecord::from_legs(&out.device, trip.id, legs) {
            Some(record) => {
                debug!(
                    device = %out.device,
                    trip = %trip.id,
                    legs = record.legs.len(),
                    length = record.length,
                    "trip generated"
                );
                out.trips.push(record);
            }
            None => {
                debug!(device = %out.device, trip = %trip.id, "no legs for trip");
                out.trips_without_legs += 1;
            }
        }
        Ok(())
    }

    /// Filter and decode one trip. The IMM starts from the prior at the
    /// trip's first fix. `cancel` is checked before every sample.
    pub fn estimate_trip(
        &self,
        trip: &CandidateTrip,
        cancel: &CancelFlag,
    ) -> Result<TripEstimate, PipelineError> {
        let Some(first) = trip.samples.first() else {
            return Ok(TripEstimate {
                steps: Vec::new(),
                modes: Vec::new(),
            });
        };

        let mut imm = ImmState::from_bank(&self.bank, &first.obs.position());
        let mut decoder = ViterbiDecoder::default();
        let mut steps = Vec::with_capacity(trip.samples.len());

        for (processed, sample) in trip.samples.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(trip = %trip.id, processed, "trip estimation cancelled");
                return Err(PipelineError::Cancelled { processed });
            }
            let obs = &sample.obs;
            let r = PositionFix::new(obs.loc_error).r_matrix();
            let prior = obs
                .hint
                .and_then(|h| categorical_prior::<N_MODES>(h.mode.index(), h.confidence));
            let step = imm.step(&self.bank, sample.dt, &obs.position(), &r, prior.as_ref());

            if !step.fused_state.iter().all(|v| v.is_finite()) {
                return Err(PipelineError::NonFinite {
                    what: "fused state",
                    time: obs.time,
                });
            }

            let transition = self.reference_transition.as_ref().unwrap_or(&step.transition);
            decoder.push(&step.mode_probs, transition);
            steps.push(step);
        }

        Ok(TripEstimate {
            steps,
            modes: decoder.finish(),
        })
    }
}

// ---------------------------------------------------------------------------
// Multi-user driver
// ---------------------------------------------------------------------------

/// Process independent users in parallel. Results come back sorted by
/// device; a failed stream does not affect the others.
pub fn process_users(
    streams: BTreeMap<String, Vec<Observation>>,
    pipeline: &TripPipeline,
    cancel: &CancelFlag,
) -> Vec<(String, Result<StreamOutput, PipelineError>)> {
    streams
        .into_par_iter()
        .map(|(device, observations)| {
            let n = observations.len();
            let result = pipeline.process_batch(&device, observations, cancel);
            match &result {
                Ok(out) => info!(
                    device = %device,
                    samples = n,
                    trips = out.trips.len(),
                    elapsed_us = out.total_time_us,
                    "user processed"
                ),
                Err(err) => error!(device = %device, %err, "stream aborted"),
            }
            (device, result)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::split_trips;
    use crate::types::ActivityHint;
    use approx::assert_abs_diff_eq;

    const T0: f64 = 1_700_000_000.0;
    const X0: f64 = 385_000.0;
    const Y0: f64 = 6_672_000.0;

    /// Deterministic pseudo-noise in [−0.5, 0.5).
    fn jitter(i: usize, k: usize) -> f64 {
        let v = (i as f64 * 12.9898 + k as f64 * 78.233).sin() * 43758.5453;
        v - v.floor() - 0.5
    }

    struct Walk {
        n: usize,
        dt: f64,
        speed: f64,
        t0: f64,
        x0: f64,
        amp: f64,
        k0: usize,
    }

    impl Walk {
        fn new(n: usize, dt: f64, speed: f64) -> Self {
            Self {
                n,
                dt,
                speed,
                t0: 0.0,
                x0: 0.0,
                amp: 4.0,
                k0: 0,
            }
        }

        fn observations(&self) -> Vec<Observation> {
            (0..self.n)
                .map(|i| {
                    let j = i + self.k0;
                    Observation::new(
                        T0 + self.t0 + i as f64 * self.dt,
                        X0 + self.x0 + self.speed * self.dt * i as f64 + self.amp * jitter(j, 0),
                        Y0 + self.amp * jitter(j, 1),
                        5.0,
                    )
                })
                .collect()
        }

        fn end_time(&self) -> f64 {
            self.t0 + (self.n - 1) as f64 * self.dt
        }

        fn end_x(&self) -> f64 {
            self.x0 + self.speed * self.dt * (self.n - 1) as f64
        }
    }

    fn pipeline() -> TripPipeline {
        TripPipeline::new(PipelineConfig::default()).unwrap()
    }

    fn run(obs: Vec<Observation>) -> StreamOutput {
        pipeline().process_stream("device", obs, &CancelFlag::new()).unwrap()
    }

    fn all_finite(out: &StreamOutput) -> bool {
        out.trips.iter().flat_map(|t| &t.legs).all(|leg| {
            leg.length.is_finite()
                && leg.start_loc.iter().chain(&leg.end_loc).all(|v| v.is_finite())
                && leg.points.iter().all(|p| p.lon.is_finite() && p.lat.is_finite() && p.speed.is_finite())
        })
    }

    #[test]
    fn single_walk() {
        let obs: Vec<Observation> = Walk { amp: 2.0, ..Walk::new(600, 2.0, 1.4) }
            .observations()
            .into_iter()
            .map(|o| o.with_hint(Mode::Walking, 0.8))
            .collect();
        let out = run(obs);
        assert_eq!(out.trips.len(), 1);
        let trip = &out.trips[0];
        assert_eq!(trip.modes(), vec![Mode::Walking]);
        let truth = 599.0 * 2.0 * 1.4;
        assert!(
            (trip.legs[0].length - truth).abs() < 0.05 * truth,
            "length {} vs {truth}",
            trip.legs[0].length
        );
        assert_eq!(trip.carbon_footprint, 0.0);
    }

    /// 300 samples at `first` m/s then 300 at `second` m/s, 3 s apart.
    fn two_speed_run(first: f64, second: f64) -> Vec<Observation> {
        (0..600)
            .map(|i| {
                let x = if i < 300 {
                    first * 3.0 * i as f64
                } else {
                    first * 3.0 * 299.0 + second * 3.0 * (i - 299) as f64
                };
                Observation::new(T0 + 3.0 * i as f64, X0 + x + 4.0 * jitter(i, 0), Y0 + 4.0 * jitter(i, 1), 5.0)
            })
            .collect()
    }

    #[test]
    fn mode_switch() {
        let out = run(two_speed_run(1.5, 6.0));
        assert_eq!(out.trips.len(), 1);
        let legs = &out.trips[0].legs;
        assert_eq!(out.trips[0].modes(), vec![Mode::Walking, Mode::Cycling]);

        let switch_time = legs[1].points[0].time.timestamp() as f64;
        let switch_index = ((switch_time - T0) / 3.0).round() as i64;
        assert!((switch_index - 300).abs() <= 15, "switch at {switch_index}");
    }

    #[test]
    fn brisk_walk_then_fast_ride_decodes_as_one_ride() {
        // 4 m/s already lies in the cycling basin of the default mode
        // parameters, so no switch is found.
        let out = run(two_speed_run(4.0, 15.0));
        assert_eq!(out.trips.len(), 1);
        assert_eq!(out.trips[0].modes(), vec![Mode::Cycling]);
    }

    #[test]
    fn trip_split() {
        let first = Walk::new(100, 3.0, 2.0);
        let second = Walk {
            t0: first.end_time() + 1500.0,
            ..Walk::new(100, 3.0, 2.0)
        };
        let mut obs = first.observations();
        obs.extend(second.observations());
        let out = run(obs);
        assert_eq!(out.trips.len(), 2);
        assert_eq!(out.trips[0].trip_id, TripId(0));
        assert_eq!(out.trips[1].trip_id, TripId(1));
        for trip in &out.trips {
            assert_eq!(trip.modes(), vec![Mode::Walking]);
        }
    }

    #[test]
    fn jitter_only_trip_is_dropped() {
        let obs: Vec<Observation> = (0..20)
            .map(|i| Observation::new(T0 + 5.0 * i as f64, X0 + 30.0 * jitter(i, 0), Y0 + 30.0 * jitter(i, 1), 5.0))
            .collect();
        let out = run(obs);
        assert!(out.trips.is_empty());
        assert_eq!(out.preprocess.trips_dropped, 1);
        assert_eq!(out.steps, 0);
    }

    #[test]
    fn large_gap_inside_trip() {
        let first = Walk::new(100, 2.0, 1.4);
        let second = Walk {
            t0: first.end_time() + 600.0,
            x0: first.end_x() + 50.0,
            k0: 100,
            ..Walk::new(100, 2.0, 1.4)
        };
        let mut obs = first.observations();
        obs.extend(second.observations());
        let out = run(obs);
        assert_eq!(out.trips.len(), 1);
        assert!(all_finite(&out));
        assert!(out.log_likelihood.is_finite());
        assert_eq!(out.trips[0].modes(), vec![Mode::Walking]);
    }

    #[test]
    fn still_interval_splits_walk() {
        let a = Walk::new(150, 2.0, 1.4);
        let s = Walk {
            t0: a.end_time() + 2.0,
            x0: a.end_x(),
            amp: 2.0,
            k0: 150,
            ..Walk::new(150, 2.0, 0.0)
        };
        let c = Walk {
            t0: s.end_time() + 2.0,
            x0: s.end_x(),
            k0: 300,
            ..Walk::new(150, 2.0, 1.4)
        };
        let mut obs = a.observations();
        obs.extend(s.observations());
        obs.extend(c.observations());
        let out = run(obs);
        assert_eq!(out.trips.len(), 1);
        assert_eq!(out.trips[0].modes(), vec![Mode::Walking, Mode::Walking]);
        let legs = &out.trips[0].legs;
        assert!(legs[0].end_time < legs[1].start_time);
        assert_eq!(legs[1].leg_index, 1);
    }

    #[test]
    fn reprocessing_is_identical() {
        let mut obs = Walk::new(150, 2.0, 1.4).observations();
        obs.extend(
            Walk {
                t0: 302.0,
                x0: 418.6,
                k0: 150,
                ..Walk::new(150, 2.0, 6.0)
            }
            .observations(),
        );
        let config = PipelineConfig {
            collect_trace: true,
            ..Default::default()
        };
        let p = TripPipeline::new(config).unwrap();
        let a = p.process_stream("device", obs.clone(), &CancelFlag::new()).unwrap();
        let b = p.process_stream("device", obs, &CancelFlag::new()).unwrap();
        assert_eq!(a.trips, b.trips);
        assert_eq!(a.trace, b.trace);
        assert_eq!(a.log_likelihood.to_bits(), b.log_likelihood.to_bits());
    }

    #[test]
    fn trace_is_well_formed() {
        let config = PipelineConfig {
            collect_trace: true,
            ..Default::default()
        };
        let p = TripPipeline::new(config).unwrap();
        let out = p
            .process_stream("device", Walk::new(200, 2.0, 1.4).observations(), &CancelFlag::new())
            .unwrap();
        assert_eq!(out.trace.len(), 200);
        assert_eq!(out.steps, 200);
        for step in &out.trace {
            assert_abs_diff_eq!(step.mode_probs.sum(), 1.0, epsilon = 1e-9);
            assert!(step.mode_probs.iter().all(|p| *p >= 0.0));
            assert!((step.fused_cov - step.fused_cov.transpose()).amax() < 1e-9);
        }
    }

    #[test]
    fn activity_hint_raises_its_mode() {
        let config = PipelineConfig {
            collect_trace: true,
            ..Default::default()
        };
        let p = TripPipeline::new(config).unwrap();
        let plain = Walk::new(300, 2.0, 1.4).observations();
        for k in [1, 30, 90] {
            let mut hinted = plain.clone();
            hinted[k].hint = Some(ActivityHint {
                mode: Mode::Cycling,
                confidence: 0.9,
            });
            let a = p.process_stream("device", plain.clone(), &CancelFlag::new()).unwrap();
            let b = p.process_stream("device", hinted, &CancelFlag::new()).unwrap();
            let cycling = Mode::Cycling.index();
            assert!(b.trace[k].mode_probs[cycling] >= a.trace[k].mode_probs[cycling]);
        }
    }

    #[test]
    fn reference_dt_decoder_still_runs() {
        let config = PipelineConfig {
            decoder: DecoderConfig { reference_dt: Some(5.0) },
            ..Default::default()
        };
        let p = TripPipeline::new(config).unwrap();
        let out = p
            .process_stream("device", Walk::new(300, 2.0, 1.4).observations(), &CancelFlag::new())
            .unwrap();
        assert_eq!(out.trips.len(), 1);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let out = run(Vec::new());
        assert!(out.trips.is_empty());
        assert_eq!(out.preprocess, PreprocessReport::default());
    }

    #[test]
    fn cancelled_stream_discards_everything() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = pipeline()
            .process_stream("device", Walk::new(100, 2.0, 1.4).observations(), &cancel)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { processed: 0 }));
    }

    #[test]
    fn cancelled_trip_estimate_stops() {
        let p = pipeline();
        let (trips, _) = split_trips(Walk::new(300, 2.0, 1.4).observations(), &p.config.preprocess);
        assert_eq!(trips.len(), 1);
        let estimate = p.estimate_trip(&trips[0], &CancelFlag::new()).unwrap();
        assert_eq!(estimate.modes.len(), 300);

        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = p.estimate_trip(&trips[0], &cancel).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { processed: 0 }));
    }

    #[test]
    fn latest_upload_is_withheld() {
        let mut obs = Walk::new(300, 2.0, 1.4).observations();
        for (i, o) in obs.iter_mut().enumerate() {
            o.created_at = Some(if i < 200 { T0 + 1000.0 } else { T0 + 2000.0 });
        }
        let out = pipeline().process_batch("device", obs, &CancelFlag::new()).unwrap();
        assert_eq!(out.preprocess.withheld_latest, 100);
        assert_eq!(out.preprocess.admitted, 200);
        let leg = &out.trips[0].legs[0];
        assert_eq!(leg.received_at, crate::records::utc_from_unix(T0 + 1000.0));
    }

    #[test]
    fn users_are_independent() {
        let mut streams = BTreeMap::new();
        streams.insert("b".to_owned(), Walk::new(200, 2.0, 1.4).observations());
        streams.insert("a".to_owned(), Walk::new(200, 2.0, 1.4).observations());
        streams.insert("c".to_owned(), Vec::new());
        let results = process_users(streams, &pipeline(), &CancelFlag::new());
        let devices: Vec<&str> = results.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(devices, vec!["a", "b", "c"]);
        let a = results[0].1.as_ref().unwrap();
        let b = results[1].1.as_ref().unwrap();
        assert_eq!(a.trips.len(), 1);
        assert_eq!(a.trips[0].legs, b.trips[0].legs);
        assert_eq!(a.trips[0].device, "a");
        assert!(results[2].1.as_ref().unwrap().trips.is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.legs.min_samples_per_leg = 0;
        assert_eq!(
            TripPipeline::new(config).unwrap_err(),
            ConfigError::ZeroCount("min_samples_per_leg")
        );

        let mut config = PipelineConfig::default();
        config.imm.mode_parameters.walking.drag = 0.0;
        assert!(matches!(
            TripPipeline::new(config).unwrap_err(),
            ConfigError::ModeParameter { mode: Mode::Walking, .. }
        ));

        let config: PipelineConfig = serde_json::from_str(r#"{"legs": {"min_samples_per_leg": 5}}"#).unwrap();
        assert_eq!(config.legs.min_samples_per_leg, 5);
        assert_eq!(config.preprocess.min_gap_between_trips, 1200.0);
    }
}
