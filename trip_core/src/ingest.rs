//! Ingestion adapter: raw location records to per-device observation
//! streams.
//!
//! Records are JSON objects, either one per line or as a single array.
//! Positions come as local planar `x`/`y` or as WGS84 `lon`/`lat`, which
//! are projected to the local CRS. Records that cannot be turned into an
//! observation are skipped and counted.

use crate::{
    error::InputError,
    records::{unix_from_utc, utc_from_unix},
    types::{ActivityHint, Mode, Observation},
};
use chrono::{DateTime, Utc};
use location_models::Projector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A time given as UNIX seconds or as an RFC 3339 string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Unix(f64),
    Text(String),
}

impl Timestamp {
    pub fn to_unix(&self) -> Result<f64, InputError> {
        let secs = match self {
            Timestamp::Unix(secs) => *secs,
            Timestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|t| unix_from_utc(&t.with_timezone(&Utc)))
                .map_err(|e| InputError::Malformed(format!("time {text:?}: {e}")))?,
        };
        if utc_from_unix(secs).is_none() {
            return Err(InputError::NonFinite("time"));
        }
        Ok(secs)
    }
}

/// One stored location record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLocation {
    pub device: Option<String>,
    pub time: Option<Timestamp>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub loc_error: Option<f64>,
    pub atype: Option<String>,
    pub aconf: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub created_at: Option<Timestamp>,
}

impl RawLocation {
    pub fn to_observation(&self, projector: &Projector) -> Result<Observation, InputError> {
        let time = self.time.as_ref().ok_or(InputError::MissingField("time"))?.to_unix()?;

        let (x, y) = match (self.x, self.y, self.lon, self.lat) {
            (Some(x), Some(y), _, _) => (x, y),
            (_, _, Some(lon), Some(lat)) => {
                if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                    return Err(InputError::Malformed(format!("position ({lon}, {lat}) out of range")));
                }
                projector
                    .from_wgs84(lon, lat)
                    .map_err(|e| InputError::Malformed(e.to_string()))?
            }
            _ => return Err(InputError::MissingField("position")),
        };
        for (field, value) in [("x", x), ("y", y)] {
            if !value.is_finite() {
                return Err(InputError::NonFinite(field));
            }
        }

        // Stored confidences are integer percentages.
        let hint = match (self.atype.as_deref().and_then(Mode::from_activity), self.aconf) {
            (Some(mode), Some(percent)) if percent.is_finite() => Some(ActivityHint {
                mode,
                confidence: percent / 100.0,
            }),
            _ => None,
        };

        Ok(Observation {
            time,
            x,
            y,
            // Non-positive errors are replaced during preprocessing.
            loc_error: self.loc_error.unwrap_or(0.0),
            hint,
            speed: self.speed,
            heading: self.heading,
            created_at: self.created_at.as_ref().and_then(|t| t.to_unix().ok()),
        })
    }
}

/// Counters of one ingestion run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub records: usize,
    pub accepted: usize,
    pub malformed: usize,
    pub devices: usize,
}

/// Parse JSON Lines or a JSON array into raw records. Unparseable entries
/// are returned as errors in place.
pub fn parse_records(text: &str) -> Vec<Result<RawLocation, InputError>> {
    let malformed = |e: serde_json::Error| InputError::Malformed(e.to_string());
    if text.trim_start().starts_with('[') {
        return match serde_json::from_str::<Vec<serde_json::Value>>(text) {
            Ok(values) => values
                .into_iter()
                .map(|v| serde_json::from_value(v).map_err(malformed))
                .collect(),
            Err(e) => vec![Err(malformed(e))],
        };
    }
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(malformed))
        .collect()
}

/// Group records per device, each stream stably sorted by time.
pub fn group_by_device(
    records: impl IntoIterator<Item = Result<RawLocation, InputError>>,
    projector: &Projector,
) -> (BTreeMap<String, Vec<Observation>>, IngestReport) {
    let mut report = IngestReport::default();
    let mut streams: BTreeMap<String, Vec<Observation>> = BTreeMap::new();

    for (line, record) in records.into_iter().enumerate() {
        report.records += 1;
        let converted = record.and_then(|raw| {
            let device = raw.device.clone().ok_or(InputError::MissingField("device"))?;
            Ok((device, raw.to_observation(projector)?))
        });
        match converted {
            Ok((device, obs)) => {
                report.accepted += 1;
                streams.entry(device).or_default().push(obs);
            }
            Err(err) => {
                warn!(record = line, %err, "skipping location record");
                report.malformed += 1;
            }
        }
    }

    for stream in streams.values_mut() {
        stream.sort_by(|a, b| a.time.total_cmp(&b.time));
    }
    report.devices = streams.len();
    (streams, report)
}
