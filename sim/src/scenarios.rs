//! Scenario definitions.
//!
//! Each scenario is a named journey plan for one traveller plus the GPS
//! behaviour of the device. All scenarios are deterministic given the same
//! seed.

use crate::{
    gps_sim::{GpsParams, GpsSimulator, Recording},
    traveller::{MotionSpec, PlanItem, Segment, Traveller},
};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use trip_core::types::Mode;

/// Central Helsinki in ETRS-TM35FIN.
const ORIGIN: [f64; 2] = [385_000.0, 6_672_000.0];
/// 2023-11-14T22:13:20Z
const START_TIME: f64 = 1_700_000_000.0;

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// 20 minutes of walking with activity hints
    SingleWalk,
    /// 15 minutes of walking, then 15 minutes of cycling
    ModeSwitch,
    /// Two short walks 25 minutes apart
    TripSplit,
    /// GPS jitter around a fixed point, no movement
    Jitter,
    /// A walk with a 10 minute sampling gap inside the trip
    LargeGap,
    /// Walk, stand still for 5 minutes, walk on
    StillInterval,
    /// Walk, cycle, walk; then a drive home two hours later
    Commute,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub start_time: f64,
    pub traveller: Traveller,
    pub gps: GpsParams,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        let (name, plan, gps) = match kind {
            ScenarioKind::SingleWalk => Self::single_walk(),
            ScenarioKind::ModeSwitch => Self::mode_switch(),
            ScenarioKind::TripSplit => Self::trip_split(),
            ScenarioKind::Jitter => Self::jitter(),
            ScenarioKind::LargeGap => Self::large_gap(),
            ScenarioKind::StillInterval => Self::still_interval(),
            ScenarioKind::Commute => Self::commute(),
        };
        Scenario {
            name: name.into(),
            seed,
            start_time: START_TIME,
            traveller: Traveller::new(format!("{name}-{seed}"), ORIGIN, plan),
            gps,
        }
    }

    /// Generate the location stream and its ground truth.
    pub fn record(&self) -> Recording {
        let mut traveller = self.traveller.clone();
        GpsSimulator::new(self.gps.clone(), self.seed).record(&mut traveller, self.start_time)
    }

    pub fn device(&self) -> &str {
        &self.traveller.device
    }

    // -----------------------------------------------------------------------
    // Scenarios
    // -----------------------------------------------------------------------

    fn single_walk() -> (&'static str, Vec<PlanItem>, GpsParams) {
        let plan = vec![walk(1.4, 0.0, 1200.0, 2.0).with_hint(0.8).into()];
        let gps = GpsParams {
            position_noise: 2.0,
            ..Default::default()
        };
        ("single_walk", plan, gps)
    }

    fn mode_switch() -> (&'static str, Vec<PlanItem>, GpsParams) {
        let plan = vec![walk(1.5, 0.0, 900.0, 3.0).into(), cycle(6.0, 0.0, 900.0, 3.0).into()];
        ("mode_switch", plan, GpsParams::default())
    }

    fn trip_split() -> (&'static str, Vec<PlanItem>, GpsParams) {
        let plan = vec![
            walk(2.0, 0.0, 300.0, 3.0).into(),
            PlanItem::Pause { duration: 1500.0 },
            walk(2.0, FRAC_PI_2, 300.0, 3.0).into(),
        ];
        ("trip_split", plan, GpsParams::default())
    }

    fn jitter() -> (&'static str, Vec<PlanItem>, GpsParams) {
        let plan = vec![Segment::new(Mode::Still, MotionSpec::Still, 100.0, 5.0).into()];
        let gps = GpsParams {
            position_noise: 20.0,
            loc_error: 15.0,
            ..Default::default()
        };
        ("jitter", plan, gps)
    }

    fn large_gap() -> (&'static str, Vec<PlanItem>, GpsParams) {
        let plan = vec![
            walk(1.4, 0.0, 200.0, 2.0).into(),
            PlanItem::Relocate {
                duration: 600.0,
                dx: 50.0,
                dy: 0.0,
            },
            walk(1.4, 0.0, 200.0, 2.0).into(),
        ];
        ("large_gap", plan, GpsParams::default())
    }

    fn still_interval() -> (&'static str, Vec<PlanItem>, GpsParams) {
        let plan = vec![
            walk(1.4, 0.0, 300.0, 2.0).into(),
            Segment::new(Mode::Still, MotionSpec::Still, 300.0, 2.0).into(),
            walk(1.4, 0.0, 300.0, 2.0).into(),
        ];
        ("still_interval", plan, GpsParams::default())
    }

    fn commute() -> (&'static str, Vec<PlanItem>, GpsParams) {
        let plan = vec![
            walk(1.4, FRAC_PI_2, 300.0, 2.0).into(),
            Segment::new(
                Mode::Cycling,
                MotionSpec::Turning {
                    speed: 6.0,
                    heading: FRAC_PI_4,
                    omega: 0.0005,
                },
                900.0,
                2.0,
            )
            .into(),
            walk(1.4, 0.0, 180.0, 2.0).into(),
            PlanItem::Pause { duration: 7200.0 },
            Segment::new(
                Mode::Driving,
                MotionSpec::Straight {
                    speed: 14.0,
                    heading: -3.0 * FRAC_PI_4,
                },
                900.0,
                5.0,
            )
            .with_hint(0.7)
            .into(),
        ];
        let gps = GpsParams {
            dropout_probability: 0.05,
            upload_batch: 60,
            ..Default::default()
        };
        ("commute", plan, gps)
    }
}

impl From<Segment> for PlanItem {
    fn from(segment: Segment) -> Self {
        PlanItem::Move(segment)
    }
}

fn walk(speed: f64, heading: f64, duration: f64, interval: f64) -> Segment {
    Segment::new(Mode::Walking, MotionSpec::Straight { speed, heading }, duration, interval)
}

fn cycle(speed: f64, heading: f64, duration: f64, interval: f64) -> Segment {
    Segment::new(Mode::Cycling, MotionSpec::Straight { speed, heading }, duration, interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trip_core::pipeline::{CancelFlag, PipelineConfig, TripPipeline};

    fn run(kind: ScenarioKind) -> trip_core::StreamOutput {
        let scenario = Scenario::build(kind, 42);
        let rec = scenario.record();
        TripPipeline::new(PipelineConfig::default())
            .unwrap()
            .process_batch(scenario.device(), rec.observations, &CancelFlag::new())
            .unwrap()
    }

    #[test]
    fn scenarios_are_reproducible() {
        for kind in [ScenarioKind::SingleWalk, ScenarioKind::Commute] {
            let a = Scenario::build(kind, 7).record();
            let b = Scenario::build(kind, 7).record();
            assert_eq!(a.observations, b.observations);
        }
    }

    #[test]
    fn sample_counts() {
        assert_eq!(Scenario::build(ScenarioKind::SingleWalk, 1).record().observations.len(), 600);
        assert_eq!(Scenario::build(ScenarioKind::ModeSwitch, 1).record().observations.len(), 600);
        assert_eq!(Scenario::build(ScenarioKind::Jitter, 1).record().observations.len(), 20);
    }

    #[test]
    fn single_walk_gives_one_walking_leg() {
        let out = run(ScenarioKind::SingleWalk);
        assert_eq!(out.trips.len(), 1);
        assert_eq!(out.trips[0].modes(), vec![Mode::Walking]);
    }

    #[test]
    fn trip_split_gives_two_trips() {
        let out = run(ScenarioKind::TripSplit);
        assert_eq!(out.trips.len(), 2);
    }

    #[test]
    fn jitter_is_not_a_trip() {
        let out = run(ScenarioKind::Jitter);
        assert!(out.trips.is_empty());
        assert_eq!(out.preprocess.trips_dropped, 1);
    }
}
