//! Fundamental types used across the entire workspace.

use nalgebra::{Matrix2, Matrix4, SMatrix, SVector, Vector2, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Linear algebra aliases: f64 throughout, fixed sizes everywhere.
// ---------------------------------------------------------------------------

/// Drag-model state vector: [px, py, vx, vy]
pub type StateVec = Vector4<f64>;

/// 4×4 state covariance matrix
pub type StateCov = Matrix4<f64>;

/// Position measurement [x, y]
pub type MeasVec = Vector2<f64>;

/// 2×2 measurement / innovation covariance
pub type MeasCov = Matrix2<f64>;

/// Number of transport modes tracked by the filter bank.
pub const N_MODES: usize = 4;

/// A value per mode, indexed by [`Mode::index`].
pub type ModeVec = SVector<f64, N_MODES>;

/// Mode transition matrix, `M[(i, j)]` = P(mode j at k+1 | mode i at k).
pub type ModeMatrix = SMatrix<f64, N_MODES, N_MODES>;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

/// Index of a trip within one user's stream (cumulative boundary count).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TripId(pub u32);

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trip{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Transport mode
// ---------------------------------------------------------------------------

/// Transport mode. The declaration order is the index order of every
/// per-mode array (μ, transition matrices, filter bank).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Still,
    Walking,
    Cycling,
    Driving,
}

impl Mode {
    pub const ALL: [Mode; N_MODES] = [Mode::Still, Mode::Walking, Mode::Cycling, Mode::Driving];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Mode> {
        Self::ALL.get(idx).copied()
    }

    /// Map an activity label reported by a device classifier.
    /// `unknown` and unrecognised labels give `None`.
    pub fn from_activity(label: &str) -> Option<Mode> {
        match label.trim().to_ascii_lowercase().as_str() {
            "still" => Some(Mode::Still),
            "walking" | "on_foot" | "running" => Some(Mode::Walking),
            "cycling" | "on_bicycle" => Some(Mode::Cycling),
            "driving" | "in_vehicle" => Some(Mode::Driving),
            _ => None,
        }
    }

    /// Whether a leg of this mode is a movement worth reporting.
    pub fn is_travel(self) -> bool {
        self != Mode::Still
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Still => "still",
            Mode::Walking => "walking",
            Mode::Cycling => "cycling",
            Mode::Driving => "driving",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per transport mode, serialised as a table keyed by mode name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeTable<T> {
    pub still: T,
    pub walking: T,
    pub cycling: T,
    pub driving: T,
}

impl<T> ModeTable<T> {
    pub fn get(&self, mode: Mode) -> &T {
        match mode {
            Mode::Still => &self.still,
            Mode::Walking => &self.walking,
            Mode::Cycling => &self.cycling,
            Mode::Driving => &self.driving,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Mode, &T)> {
        Mode::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

impl<T: Copy> ModeTable<T> {
    /// Values in mode index order.
    pub fn to_array(&self) -> [T; N_MODES] {
        Mode::ALL.map(|m| *self.get(m))
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// External activity classification attached to a sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityHint {
    pub mode: Mode,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// One admitted location sample, already projected to the local CRS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// UNIX time in seconds
    pub time: f64,
    /// Easting in the local planar CRS (meters)
    pub x: f64,
    /// Northing in the local planar CRS (meters)
    pub y: f64,
    /// 1σ radial position error (meters)
    pub loc_error: f64,
    #[serde(default)]
    pub hint: Option<ActivityHint>,
    /// Reported ground speed (m/s)
    #[serde(default)]
    pub speed: Option<f64>,
    /// Reported heading (degrees); carried through, not filtered
    #[serde(default)]
    pub heading: Option<f64>,
    /// UNIX time (seconds) at which the sample reached the backend
    #[serde(default)]
    pub created_at: Option<f64>,
}

impl Observation {
    /// Bare position sample without hint or device metadata.
    pub fn new(time: f64, x: f64, y: f64, loc_error: f64) -> Self {
        Self {
            time,
            x,
            y,
            loc_error,
            hint: None,
            speed: None,
            heading: None,
            created_at: None,
        }
    }

    pub fn with_hint(mut self, mode: Mode, confidence: f64) -> Self {
        self.hint = Some(ActivityHint { mode, confidence });
        self
    }

    pub fn position(&self) -> MeasVec {
        MeasVec::new(self.x, self.y)
    }

    /// Planar distance to another sample (meters)
    pub fn distance_to(&self, other: &Observation) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_index_roundtrip() {
        for m in Mode::ALL {
            assert_eq!(Mode::from_index(m.index()), Some(m));
        }
        assert_eq!(Mode::from_index(N_MODES), None);
    }

    #[test]
    fn mode_table_follows_index_order() {
        let table = ModeTable {
            still: 0,
            walking: 1,
            cycling: 2,
            driving: 3,
        };
        assert_eq!(table.to_array(), [0, 1, 2, 3]);
        assert_eq!(*table.get(Mode::Cycling), 2);
    }

    #[test]
    fn activity_labels() {
        assert_eq!(Mode::from_activity("on_foot"), Some(Mode::Walking));
        assert_eq!(Mode::from_activity("running"), Some(Mode::Walking));
        assert_eq!(Mode::from_activity("IN_VEHICLE"), Some(Mode::Driving));
        assert_eq!(Mode::from_activity("on_bicycle"), Some(Mode::Cycling));
        assert_eq!(Mode::from_activity("unknown"), None);
        assert_eq!(Mode::from_activity("tilting"), None);
    }
}
