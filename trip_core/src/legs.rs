//! Leg segmentation: split a decoded trip into mode-homogeneous legs.
//!
//! A new leg starts whenever the decoded mode changes or a trip boundary
//! is flagged. Legs with too few low-error samples and legs of the `still`
//! mode are discarded. The length of a retained leg is measured on the
//! filtered trajectory, not on the raw fixes.

use crate::{
    error::PipelineError,
    preprocess::Sample,
    records::{utc_from_unix, LegPoint, LegRecord},
    types::{Mode, ModeTable, StateVec, TripId},
};
use location_models::{Projector, TransverseMercator};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegConfig {
    /// Required number of low-error samples in a leg
    pub min_samples_per_leg: usize,
    /// Samples with a smaller `loc_error` count as low-error (m)
    pub good_loc_error: f64,
    /// g CO₂e per passenger-km
    pub emission_factors: ModeTable<f64>,
}

impl Default for LegConfig {
    fn default() -> Self {
        Self {
            min_samples_per_leg: 10,
            good_loc_error: 100.0,
            emission_factors: ModeTable {
                still: 0.0,
                walking: 0.0,
                cycling: 0.0,
                driving: 160.0,
            },
        }
    }
}

impl LegConfig {
    pub fn carbon_footprint(&self, mode: Mode, length: f64) -> f64 {
        self.emission_factors.get(mode) * length / 1000.0
    }
}

/// A run of samples with a constant decoded mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegSpan {
    pub mode: Mode,
    /// Sample indices within the trip
    pub range: Range<usize>,
    pub good_samples: usize,
}

/// Cut the decoded sequence at every mode change and trip boundary.
pub fn split_spans(modes: &[Mode], samples: &[Sample], good_loc_error: f64) -> Vec<LegSpan> {
    let mut spans: Vec<LegSpan> = Vec::new();
    for (i, (mode, sample)) in modes.iter().zip(samples).enumerate() {
        let good = usize::from(sample.obs.loc_error < good_loc_error);
        match spans.last_mut() {
            Some(span) if span.mode == *mode && !sample.new_trip => {
                span.range.end = i + 1;
                span.good_samples += good;
            }
            _ => spans.push(LegSpan {
                mode: *mode,
                range: i..i + 1,
                good_samples: good,
            }),
        }
    }
    spans
}

/// Sum of planar step lengths along a sequence of filtered states.
pub fn filtered_length(states: &[StateVec]) -> f64 {
    states
        .windows(2)
        .map(|w| (w[1][0] - w[0][0]).hypot(w[1][1] - w[0][1]))
        .sum()
}

/// Turns one decoded trip into leg records.
#[derive(Clone, Debug)]
pub struct LegSegmenter {
    pub config: LegConfig,
    pub projection: TransverseMercator,
}

impl LegSegmenter {
    pub fn new(config: LegConfig, projection: TransverseMercator) -> Self {
        Self { config, projection }
    }

    /// Spans worth reporting: travel modes with enough low-error samples.
    pub fn retained_spans(&self, modes: &[Mode], samples: &[Sample]) -> Vec<LegSpan> {
        split_spans(modes, samples, self.config.good_loc_error)
            .into_iter()
            .filter(|span| {
                let keep = span.mode.is_travel() && span.good_samples >= self.config.min_samples_per_leg;
                if !keep {
                    debug!(
                        mode = %span.mode,
                        samples = span.range.len(),
                        good = span.good_samples,
                        "discarding leg"
                    );
                }
                keep
            })
            .collect()
    }

    /// Build the leg records of one trip. `fused[i]` and `modes[i]` belong
    /// to `samples[i]`.
    pub fn segment(
        &self,
        trip_id: TripId,
        samples: &[Sample],
        fused: &[StateVec],
        modes: &[Mode],
    ) -> Result<Vec<LegRecord>, PipelineError> {
        for (what, got) in [("fused states", fused.len()), ("decoded modes", modes.len())] {
            if got != samples.len() {
                return Err(PipelineError::DimensionMismatch {
                    what,
                    got,
                    expected: samples.len(),
                });
            }
        }

        let projector = self.projection.projector()?;
        self.retained_spans(modes, samples)
            .into_iter()
            .enumerate()
            .map(|(leg_index, span)| self.build(&projector, trip_id, leg_index, span, samples, fused))
            .collect()
    }

    fn build(
        &self,
        projector: &Projector,
        trip_id: TripId,
        leg_index: usize,
        span: LegSpan,
        samples: &[Sample],
        fused: &[StateVec],
    ) -> Result<LegRecord, PipelineError> {
        let samples = &samples[span.range.clone()];
        let states = &fused[span.range];
        let length = filtered_length(states);

        let points = samples
            .iter()
            .zip(states)
            .map(|(s, x)| -> Result<LegPoint, PipelineError> {
                let (lon, lat) = projector.to_wgs84(x[0], x[1])?;
                Ok(LegPoint {
                    time: utc_from_unix(s.obs.time).unwrap_or_default(),
                    lon,
                    lat,
                    speed: s.obs.speed.unwrap_or_else(|| x[2].hypot(x[3])),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let start = points.first().map(|p| (p.time, [p.lon, p.lat])).unwrap_or_default();
        let end = points.last().map(|p| (p.time, [p.lon, p.lat])).unwrap_or_default();
        let received_at = samples
            .iter()
            .filter_map(|s| s.obs.created_at)
            .max_by(|a, b| a.total_cmp(b))
            .and_then(utc_from_unix);

        Ok(LegRecord {
            trip_id,
            leg_index,
            mode: span.mode,
            start_time: start.0,
            end_time: end.0,
            start_loc: start.1,
            end_loc: end.1,
            length,
            carbon_footprint: self.config.carbon_footprint(span.mode, length),
            received_at,
            points,
        })
    }
}
