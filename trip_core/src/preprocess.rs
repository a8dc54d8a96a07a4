//! Sample preprocessing: admission, normalisation and gap-based trip
//! segmentation.
//!
//! # Steps per sample
//! 1. Admission: non-finite fields and samples older than their predecessor
//!    are rejected (the filter is not restarted).
//! 2. Normalisation: `loc_error ≤ 0` becomes the default error, then the
//!    error is floored; a hint confidence of exactly 1 is halved and one
//!    outside [0, 1] drops the hint.
//! 3. Segmentation: a gap longer than `min_gap_between_trips` closes the
//!    current trip. Trip ids count the boundaries seen so far.
//!
//! A closed trip is kept only if enough low-error samples lie further than
//! `min_trip_displacement` from the centroid of its low-error samples.

use crate::{
    error::InputError,
    records::utc_from_unix,
    types::{Observation, TripId},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Trip boundary threshold (s)
    pub min_gap_between_trips: f64,
    /// Required distance from the trip centroid (m)
    pub min_trip_displacement: f64,
    /// Required number of displaced low-error samples
    pub min_displaced_samples: usize,
    /// Samples with a smaller `loc_error` count as low-error (m)
    pub good_loc_error: f64,
    /// Lower bound on `loc_error` (m)
    pub loc_error_floor: f64,
    /// Replacement for non-positive `loc_error` (m)
    pub default_loc_error: f64,
    /// Withhold the samples of the most recent upload
    pub drop_latest_upload: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_gap_between_trips: 1200.0,
            min_trip_displacement: 200.0,
            min_displaced_samples: 10,
            good_loc_error: 100.0,
            loc_error_floor: 0.1,
            default_loc_error: 10.0,
            drop_latest_upload: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Samples and trips
// ---------------------------------------------------------------------------

/// An admitted, normalised observation with its segmentation columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub obs: Observation,
    pub trip_id: TripId,
    /// Time since the previous admitted sample (s), 0 for the first
    pub dt: f64,
    /// Planar distance from the previous admitted sample (m)
    pub distance: f64,
    /// This sample opens a new trip
    pub new_trip: bool,
}

/// A run of samples with no gap above the trip threshold.
#[derive(Clone, Debug, Default)]
pub struct CandidateTrip {
    pub id: TripId,
    pub samples: Vec<Sample>,
}

impl CandidateTrip {
    /// Number of low-error samples further than `min_trip_displacement`
    /// from the centroid of the low-error samples.
    pub fn displaced_samples(&self, config: &PreprocessConfig) -> usize {
        let good: Vec<&Observation> = self
            .samples
            .iter()
            .map(|s| &s.obs)
            .filter(|o| o.loc_error < config.good_loc_error)
            .collect();
        if good.is_empty() {
            return 0;
        }
        let n = good.len() as f64;
        let cx = good.iter().map(|o| o.x).sum::<f64>() / n;
        let cy = good.iter().map(|o| o.y).sum::<f64>() / n;
        good.iter()
            .filter(|o| (o.x - cx).hypot(o.y - cy) > config.min_trip_displacement)
            .count()
    }

    /// Whether the trip moved enough to be more than GPS jitter.
    pub fn is_displaced(&self, config: &PreprocessConfig) -> bool {
        self.displaced_samples(config) >= config.min_displaced_samples
    }
}

// ---------------------------------------------------------------------------
// Admission + normalisation
// ---------------------------------------------------------------------------

/// Clean one observation in place. Returns an input-shape error for samples
/// that cannot enter the filter.
pub fn normalise(obs: &mut Observation, config: &PreprocessConfig) -> Result<(), InputError> {
    for (field, value) in [("time", obs.time), ("x", obs.x), ("y", obs.y)] {
        if !value.is_finite() {
            return Err(InputError::NonFinite(field));
        }
    }
    if utc_from_unix(obs.time).is_none() {
        return Err(InputError::Malformed(format!("time {} out of range", obs.time)));
    }

    if !obs.loc_error.is_finite() || obs.loc_error <= 0.0 {
        obs.loc_error = config.default_loc_error;
    }
    obs.loc_error = obs.loc_error.max(config.loc_error_floor);

    // Confidences are fractions here; percentages are rescaled on ingestion.
    if let Some(hint) = obs.hint.as_mut() {
        if hint.confidence == 1.0 {
            hint.confidence = 0.5;
        }
    }
    if obs.hint.is_some_and(|h| !(0.0..=1.0).contains(&h.confidence)) {
        obs.hint = None;
    }

    obs.speed = obs.speed.filter(|v| v.is_finite());
    obs.heading = obs.heading.filter(|v| v.is_finite());
    Ok(())
}

/// Remove the samples of the latest upload, whose trip may still be in
/// progress. Returns how many were withheld.
pub fn withhold_latest_upload(observations: &mut Vec<Observation>) -> usize {
    let latest = observations
        .iter()
        .filter_map(|o| o.created_at)
        .max_by(|a, b| a.total_cmp(b));
    let Some(latest) = latest else {
        return 0;
    };
    let before = observations.len();
    observations.retain(|o| o.created_at.map_or(true, |c| c < latest));
    before - observations.len()
}

// ---------------------------------------------------------------------------
// Trip splitter
// ---------------------------------------------------------------------------

/// Counters of the preprocessing stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub admitted: usize,
    pub skipped_malformed: usize,
    pub skipped_out_of_order: usize,
    pub withheld_latest: usize,
    pub trips_found: usize,
    pub trips_dropped: usize,
}

/// Incremental segmenter: push samples in time order, receive each trip
/// when the gap after it is seen. Holds at most one open trip.
#[derive(Debug)]
pub struct TripSplitter {
    config: PreprocessConfig,
    current: CandidateTrip,
    last: Option<Observation>,
    boundaries: u32,
    pub report: PreprocessReport,
}

impl TripSplitter {
    pub fn new(config: PreprocessConfig) -> Self {
        Self {
            config,
            current: CandidateTrip::default(),
            last: None,
            boundaries: 0,
            report: PreprocessReport::default(),
        }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Admit one observation. Returns the previous trip if this sample
    /// closed it and it passed the displacement filter.
    pub fn push(&mut self, mut obs: Observation) -> Result<Option<CandidateTrip>, InputError> {
        if let Err(err) = normalise(&mut obs, &self.config) {
            self.report.skipped_malformed += 1;
            return Err(err);
        }

        let (dt, distance) = match &self.last {
            Some(prev) if obs.time < prev.time => {
                self.report.skipped_out_of_order += 1;
                return Err(InputError::OutOfOrder {
                    time: obs.time,
                    previous: prev.time,
                });
            }
            Some(prev) => (obs.time - prev.time, obs.distance_to(prev)),
            None => (0.0, 0.0),
        };

        let new_trip = dt > self.config.min_gap_between_trips;
        let closed = if new_trip {
            self.boundaries += 1;
            let next = CandidateTrip {
                id: TripId(self.boundaries),
                samples: Vec::new(),
            };
            let previous = std::mem::replace(&mut self.current, next);
            self.close(previous)
        } else {
            None
        };

        self.report.admitted += 1;
        self.last = Some(obs.clone());
        self.current.samples.push(Sample {
            obs,
            trip_id: self.current.id,
            dt,
            distance,
            new_trip,
        });
        Ok(closed)
    }

    /// Close the open trip at the end of the stream.
    pub fn finish(&mut self) -> Option<CandidateTrip> {
        let trip = std::mem::take(&mut self.current);
        self.last = None;
        self.close(trip)
    }

    fn close(&mut self, trip: CandidateTrip) -> Option<CandidateTrip> {
        if trip.samples.is_empty() {
            return None;
        }
        self.report.trips_found += 1;
        let displaced = trip.displaced_samples(&self.config);
        if displaced < self.config.min_displaced_samples {
            debug!(
                trip = %trip.id,
                samples = trip.samples.len(),
                displaced,
                "dropping trip without enough displaced samples"
            );
            self.report.trips_dropped += 1;
            return None;
        }
        Some(trip)
    }
}

/// Batch helper: split a whole stream into the kept candidate trips.
pub fn split_trips(
    observations: impl IntoIterator<Item = Observation>,
    config: &PreprocessConfig,
) -> (Vec<CandidateTrip>, PreprocessReport) {
    let mut splitter = TripSplitter::new(config.clone());
    let mut trips = Vec::new();
    for obs in observations {
        if let Ok(Some(trip)) = splitter.push(obs) {
            trips.push(trip);
        }
    }
    trips.extend(splitter.finish());
    (trips, splitter.report)
}
