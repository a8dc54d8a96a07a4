//! Replay: serialize/deserialize recorded location streams for offline
//! evaluation.

use crate::{gps_sim::Recording, scenarios::Scenario};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use trip_core::{metrics::GroundTruth, types::Observation};

/// A full recorded location stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    pub device: String,
    /// All samples in chronological order
    pub observations: Vec<Observation>,
    /// True position and mode at each sample
    pub ground_truth: Vec<GroundTruth>,
}

impl ReplayLog {
    pub fn from_recording(scenario: &Scenario, recording: Recording) -> Self {
        Self {
            scenario_name: scenario.name.clone(),
            seed: scenario.seed,
            device: scenario.device().to_owned(),
            observations: recording.observations,
            ground_truth: recording.ground_truth,
        }
    }
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)?;
    Ok(log)
}
