//! Traveller motion models and ground-truth propagation.
//!
//! A traveller has a true planar state [px, py, vx, vy] and follows a plan
//! of segments. Each segment has a transport mode, a motion model and a
//! duration; pauses are stretches without any samples.

use serde::{Deserialize, Serialize};
use trip_core::types::Mode;

/// Describes traveller motion during one segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Standing at the current position.
    Still,
    /// Constant speed (m/s) along `heading` (radians from east).
    Straight { speed: f64, heading: f64 },
    /// Constant speed with a constant turn rate `omega` (rad/s).
    Turning { speed: f64, heading: f64, omega: f64 },
}

/// A stretch of the plan with one transport mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub mode: Mode,
    pub motion: MotionSpec,
    /// Seconds
    pub duration: f64,
    /// Seconds between location samples
    pub sample_interval: f64,
    /// Confidence of the device activity hint, `None` for no hint
    pub hint_confidence: Option<f64>,
}

impl Segment {
    pub fn new(mode: Mode, motion: MotionSpec, duration: f64, sample_interval: f64) -> Self {
        Self {
            mode,
            motion,
            duration,
            sample_interval,
            hint_confidence: None,
        }
    }

    pub fn with_hint(mut self, confidence: f64) -> Self {
        self.hint_confidence = Some(confidence);
        self
    }

    /// Number of samples taken during the segment.
    pub fn samples(&self) -> usize {
        (self.duration / self.sample_interval).round().max(1.0) as usize
    }
}

/// One entry of a journey plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlanItem {
    Move(Segment),
    /// No samples for this many seconds; the traveller stays in place.
    Pause { duration: f64 },
    /// No samples; the traveller is moved by (dx, dy) meters.
    Relocate { duration: f64, dx: f64, dy: f64 },
}

/// A simulated traveller with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Traveller {
    pub device: String,
    /// True state [px, py, vx, vy]
    pub state: [f64; 4],
    pub plan: Vec<PlanItem>,
}

impl Traveller {
    pub fn new(device: impl Into<String>, origin: [f64; 2], plan: Vec<PlanItem>) -> Self {
        Self {
            device: device.into(),
            state: [origin[0], origin[1], 0.0, 0.0],
            plan,
        }
    }

    /// Set the velocity for a motion at `elapsed` seconds into its segment.
    pub fn set_velocity(&mut self, motion: &MotionSpec, elapsed: f64) {
        let (vx, vy) = match motion {
            MotionSpec::Still => (0.0, 0.0),
            MotionSpec::Straight { speed, heading } => (speed * heading.cos(), speed * heading.sin()),
            MotionSpec::Turning { speed, heading, omega } => {
                let h = heading + omega * elapsed;
                (speed * h.cos(), speed * h.sin())
            }
        };
        self.state[2] = vx;
        self.state[3] = vy;
    }

    /// Propagate the true state by `dt` seconds at the current velocity.
    pub fn step(&mut self, dt: f64) {
        self.state[0] += self.state[2] * dt;
        self.state[1] += self.state[3] * dt;
    }

    pub fn pos_2d(&self) -> (f64, f64) {
        (self.state[0], self.state[1])
    }

    pub fn speed(&self) -> f64 {
        self.state[2].hypot(self.state[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn straight_motion() {
        let mut t = Traveller::new("d", [10.0, 20.0], Vec::new());
        t.set_velocity(&MotionSpec::Straight { speed: 2.0, heading: std::f64::consts::FRAC_PI_2 }, 0.0);
        t.step(5.0);
        let (x, y) = t.pos_2d();
        assert_abs_diff_eq!(x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 30.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.speed(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn turning_keeps_speed() {
        let mut t = Traveller::new("d", [0.0, 0.0], Vec::new());
        let motion = MotionSpec::Turning { speed: 5.0, heading: 0.0, omega: 0.1 };
        for k in 0..20 {
            t.set_velocity(&motion, k as f64);
            t.step(1.0);
        }
        assert_abs_diff_eq!(t.speed(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn sample_count() {
        let s = Segment::new(Mode::Walking, MotionSpec::Still, 600.0, 2.0);
        assert_eq!(s.samples(), 300);
    }
}
