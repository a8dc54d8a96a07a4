//! Trip and leg records emitted for persistence.
//!
//! Records are plain values in WGS84 with UTC timestamps. A trip record is
//! only built when at least one leg survived segmentation.

use crate::types::{Mode, TripId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// UNIX seconds to a UTC instant (nanosecond resolution).
/// `None` for non-finite or out-of-range values.
pub fn utc_from_unix(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

/// UTC instant to UNIX seconds.
pub fn unix_from_utc(time: &DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9
}

/// One sample of a leg's trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegPoint {
    pub time: DateTime<Utc>,
    pub lon: f64,
    pub lat: f64,
    /// Observed speed when reported, otherwise the filtered speed (m/s)
    pub speed: f64,
}

/// A mode-homogeneous part of a trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegRecord {
    pub trip_id: TripId,
    /// Position within the trip, counting only retained legs
    pub leg_index: usize,
    pub mode: Mode,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// [lon, lat]
    pub start_loc: [f64; 2],
    /// [lon, lat]
    pub end_loc: [f64; 2],
    /// Length along the filtered trajectory (m)
    pub length: f64,
    /// Grams of CO₂e
    pub carbon_footprint: f64,
    /// Latest arrival time of the leg's samples at the backend
    pub received_at: Option<DateTime<Utc>>,
    pub points: Vec<LegPoint>,
}

impl LegRecord {
    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// Mean speed over the leg (m/s), 0 for an instantaneous leg.
    pub fn average_speed(&self) -> f64 {
        let duration = self.duration_secs();
        if duration > 0.0 {
            self.length / duration
        } else {
            0.0
        }
    }
}

/// A completed trip with its retained legs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub device: String,
    pub trip_id: TripId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub length: f64,
    pub carbon_footprint: f64,
    pub legs: Vec<LegRecord>,
}

impl TripRecord {
    /// Assemble a trip from its legs; a trip without legs is not a trip.
    pub fn from_legs(device: &str, trip_id: TripId, legs: Vec<LegRecord>) -> Option<Self> {
        let first = legs.first()?;
        let last = legs.last()?;
        Some(Self {
            device: device.to_owned(),
            trip_id,
            start_time: first.start_time,
            end_time: last.end_time,
            length: legs.iter().map(|l| l.length).sum(),
            carbon_footprint: legs.iter().map(|l| l.carbon_footprint).sum(),
            legs,
        })
    }

    /// Mode of each leg, in trip order.
    pub fn modes(&self) -> Vec<Mode> {
        self.legs.iter().map(|l| l.mode).collect()
    }
}
