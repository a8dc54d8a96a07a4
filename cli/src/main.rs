//! `tripgen` CLI: scenario runs, location file processing, replay evaluation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{Scenario, ScenarioKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use trip_core::ingest::{group_by_device, parse_records};
use trip_core::metrics::{DecodingMetrics, GroundTruth};
use trip_core::pipeline::{process_users, CancelFlag, PipelineConfig, StreamOutput, TripPipeline};
use trip_core::types::Observation;

#[derive(Parser)]
#[command(name = "tripgen", about = "Trip and transport mode inference from location streams")]
struct Cli {
    /// Pipeline configuration (JSON); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a named scenario, run the pipeline and report metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the generated stream as a replay log
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Process a file of stored location records (JSON array or JSON Lines).
    Process {
        /// Path to the location records
        input: PathBuf,
        /// Write the generated trips to a JSON file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load and evaluate a previously recorded replay log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            output,
            save_replay: save_path,
        } => {
            run_scenario(config, scenario, seed, output.as_deref(), save_path.as_deref())?;
        }
        Commands::Process { input, output } => {
            run_process(config, &input, output.as_deref())?;
        }
        Commands::Replay { input, output } => {
            run_replay(config, &input, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: PipelineConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded pipeline config");
    Ok(config)
}

/// Run one device's stream with trace collection on and score it.
fn evaluate(
    mut config: PipelineConfig,
    device: &str,
    observations: Vec<Observation>,
    ground_truth: &[GroundTruth],
) -> Result<(StreamOutput, DecodingMetrics)> {
    config.collect_trace = true;
    let pipeline = TripPipeline::new(config)?;
    let out = pipeline.process_batch(device, observations, &CancelFlag::new())?;
    let mut metrics = DecodingMetrics::default();
    metrics.accumulate(&out.trace, ground_truth);
    Ok((out, metrics))
}

fn summary(name: &str, seed: u64, out: &StreamOutput, metrics: &DecodingMetrics) -> serde_json::Value {
    serde_json::json!({
        "scenario": name,
        "seed": seed,
        "elapsed_s": out.total_time_us as f64 * 1e-6,
        "samples": out.preprocess.admitted,
        "trips": out.trips.len(),
        "legs": out.trips.iter().map(|t| t.legs.len()).sum::<usize>(),
        "modes": out.trips.iter().map(|t| t.modes()).collect::<Vec<_>>(),
        "mode_accuracy": metrics.mode_accuracy(),
        "rmse_position_m": metrics.rmse_position(),
        "switches_detected": format!("{}/{}", metrics.detected_switches, metrics.true_switches),
        "mean_switch_offset": metrics.mean_switch_offset(),
        "log_likelihood": out.log_likelihood,
        "covariance_resets": out.covariance_resets,
    })
}

fn print_trips(out: &StreamOutput) {
    for trip in &out.trips {
        println!(
            "  {} {} → {}: {:.0} m, {:.0} g CO₂e",
            trip.trip_id, trip.start_time, trip.end_time, trip.length, trip.carbon_footprint
        );
        for leg in &trip.legs {
            println!(
                "    leg {} {:<8} {} → {}  {:>7.0} m  {:>5.1} m/s",
                leg.leg_index,
                leg.mode.name(),
                leg.start_time.format("%H:%M:%S"),
                leg.end_time.format("%H:%M:%S"),
                leg.length,
                leg.average_speed()
            );
        }
    }
}

fn run_scenario(
    config: PipelineConfig,
    kind: ScenarioKind,
    seed: u64,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    let recording = scenario.record();

    println!(
        "Running scenario '{}' (seed={}, {} samples)...",
        scenario.name,
        seed,
        recording.observations.len()
    );

    let (out, metrics) = evaluate(
        config,
        scenario.device(),
        recording.observations.clone(),
        &recording.ground_truth,
    )?;

    println!(
        "Done: {} trips, mode accuracy {:.1}%, position RMSE {:.1} m, elapsed={:.3}s",
        out.trips.len(),
        metrics.mode_accuracy() * 100.0,
        metrics.rmse_position(),
        out.total_time_us as f64 * 1e-6,
    );
    print_trips(&out);

    if let Some(rpath) = replay_path {
        let log = ReplayLog::from_recording(&scenario, recording);
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }

    if let Some(opath) = output_path {
        let json = summary(&scenario.name, seed, &out, &metrics);
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)?;
        println!("Metrics saved to {}", opath.display());
    }

    Ok(())
}

fn run_process(config: PipelineConfig, input: &Path, output_path: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let projector = config.projection.projector()?;
    let (streams, report) = group_by_device(parse_records(&text), &projector);
    println!(
        "Read {} records ({} accepted, {} skipped) for {} devices",
        report.records, report.accepted, report.malformed, report.devices
    );

    let pipeline = TripPipeline::new(config)?;
    let results = process_users(streams, &pipeline, &CancelFlag::new());

    let mut trips = BTreeMap::new();
    for (device, result) in results {
        match result {
            Ok(out) => {
                println!("{device}: {} trips", out.trips.len());
                print_trips(&out);
                trips.insert(device, out.trips);
            }
            Err(err) => eprintln!("{device}: stream aborted: {err}"),
        }
    }

    let json = serde_json::to_string_pretty(&trips)?;
    match output_path {
        Some(opath) => {
            std::fs::write(opath, json)?;
            println!("Trips saved to {}", opath.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_replay(config: PipelineConfig, input: &Path, output_path: Option<&Path>) -> Result<()> {
    let log = load_replay(input)?;
    println!(
        "Replaying '{}' ({} samples)...",
        log.scenario_name,
        log.observations.len()
    );

    let (out, metrics) = evaluate(config, &log.device, log.observations, &log.ground_truth)?;

    println!(
        "Replay done: {} trips, mode accuracy {:.1}%, elapsed={:.3}s",
        out.trips.len(),
        metrics.mode_accuracy() * 100.0,
        out.total_time_us as f64 * 1e-6
    );
    print_trips(&out);

    if let Some(opath) = output_path {
        let json = summary(&log.scenario_name, log.seed, &out, &metrics);
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)?;
    }

    Ok(())
}
