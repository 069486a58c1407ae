use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use stride_cycles::{
    CycleDetector, PhaseBounds, Polarity, RepeatabilityConfig, TimeNormalizer, stack,
};
use stride_io::{ExperimentName, ResultWriter, TimeSeriesReader};
use stride_series::TimeSeries;

#[derive(Parser)]
#[command(name = "stride")]
#[command(about = "Cycle detection, time normalization and repeatability analysis for motion data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,
}

/// Input and cycle detection parameters shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct DetectArgs {
    /// Path to the input CSV file
    #[arg(long)]
    data: PathBuf,

    /// Header of the time column in the input CSV
    #[arg(long, default_value = "Time")]
    time_column: String,

    /// Scalar channel the detector scans
    #[arg(long)]
    channel: String,

    /// Level that opens phase 1 when reached
    #[arg(long, allow_hyphen_values = true)]
    threshold1: f64,

    /// Level that opens phase 2 when reached back
    #[arg(long, allow_hyphen_values = true)]
    threshold2: f64,

    /// Side of threshold1 that opens phase 1: "rising" (at or above) or "falling" (at or below)
    #[arg(long, default_value = "rising")]
    polarity: String,

    /// Name of the event marking the start of phase 1
    #[arg(long, default_value = "phase1")]
    event1: String,

    /// Name of the event marking the start of phase 2
    #[arg(long, default_value = "phase2")]
    event2: String,

    /// Minimum phase 1 duration
    #[arg(long, default_value_t = 0.0)]
    min_duration1: f64,

    /// Maximum phase 1 duration
    #[arg(long, default_value_t = f64::INFINITY)]
    max_duration1: f64,

    /// Minimum phase 2 duration
    #[arg(long, default_value_t = 0.0)]
    min_duration2: f64,

    /// Maximum phase 2 duration
    #[arg(long, default_value_t = f64::INFINITY)]
    max_duration2: f64,

    /// Minimum phase 1 peak height
    #[arg(long, default_value_t = f64::NEG_INFINITY, allow_hyphen_values = true)]
    min_peak_height1: f64,

    /// Maximum phase 1 peak height
    #[arg(long, default_value_t = f64::INFINITY, allow_hyphen_values = true)]
    max_peak_height1: f64,

    /// Minimum phase 2 peak height
    #[arg(long, default_value_t = f64::NEG_INFINITY, allow_hyphen_values = true)]
    min_peak_height2: f64,

    /// Maximum phase 2 peak height
    #[arg(long, default_value_t = f64::INFINITY, allow_hyphen_values = true)]
    max_peak_height2: f64,

    /// Minimum full cycle duration
    #[arg(long, default_value_t = 0.0)]
    min_cycle: f64,

    /// Maximum full cycle duration
    #[arg(long, default_value_t = f64::INFINITY)]
    max_cycle: f64,

    /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
    #[arg(long)]
    experiment: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Detect cycles and write the resulting events
    Detect {
        #[command(flatten)]
        detect: DetectArgs,
    },

    /// Detect, time normalize and stack cycles, then select the most repeatable ones
    Analyze {
        #[command(flatten)]
        detect: DetectArgs,

        /// Number of points per normalized cycle
        #[arg(long, default_value_t = 100)]
        n_points: usize,

        /// Multiple of the median mean dissimilarity above which a cycle is rejected
        #[arg(long, default_value_t = 2.0)]
        tolerance: f64,

        /// Number of cycles below which no more cycles are rejected
        #[arg(long, default_value_t = 2)]
        min_cycles: usize,

        /// Channel compared across cycles (defaults to the detection channel)
        #[arg(long)]
        analysis_channel: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Stdout summaries
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DetectOutput {
    experiment: String,
    n_samples: usize,
    n_cycles: usize,
    cycle_starts: Vec<f64>,
    events_file: PathBuf,
}

#[derive(Serialize)]
struct AnalyzeOutput {
    experiment: String,
    n_samples: usize,
    n_cycles: usize,
    n_points: usize,
    channel: String,
    selected: Vec<usize>,
    rejected: Vec<usize>,
    nan_cycles: Vec<usize>,
    bound: Option<f64>,
    normalized_file: PathBuf,
    cycles_file: PathBuf,
}

fn parse_polarity(s: &str) -> Result<Polarity> {
    match s {
        "rising" => Ok(Polarity::Rising),
        "falling" => Ok(Polarity::Falling),
        other => anyhow::bail!("unknown polarity: {other} (expected rising or falling)"),
    }
}

fn build_detector(args: &DetectArgs) -> Result<CycleDetector> {
    Ok(
        CycleDetector::new(args.channel.as_str(), args.threshold1, args.threshold2)
            .with_event_names(args.event1.as_str(), args.event2.as_str())
            .with_polarity(parse_polarity(&args.polarity)?)
            .with_phase1(
                PhaseBounds::new()
                    .with_duration(args.min_duration1, args.max_duration1)
                    .with_peak_height(args.min_peak_height1, args.max_peak_height1),
            )
            .with_phase2(
                PhaseBounds::new()
                    .with_duration(args.min_duration2, args.max_duration2)
                    .with_peak_height(args.min_peak_height2, args.max_peak_height2),
            )
            .with_cycle_bounds(args.min_cycle, args.max_cycle),
    )
}

/// Read the input, run the detector and return the annotated series.
fn read_and_detect(args: &DetectArgs) -> Result<(TimeSeries, CycleDetector)> {
    let ts = TimeSeriesReader::new(&args.data)
        .with_time_column(args.time_column.as_str())
        .read()
        .context("failed to read input CSV")?;
    info!(samples = ts.len(), channels = ts.data().len(), "series loaded");

    let detector = build_detector(args)?;
    let detected = detector.detect(&ts).context("cycle detection failed")?;
    Ok((detected, detector))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Detect { detect } => {
            let experiment_name = ExperimentName::new(detect.experiment.clone())?;
            let (detected, detector) = read_and_detect(&detect)?;

            let writer = ResultWriter::new(&detect.output_dir, experiment_name)?;
            let events_file = writer.write_events(&detected)?;

            let (start_event, _) = detector.event_names();
            let cycle_starts: Vec<f64> = (0..detected.event_count(start_event))
                .map(|k| detected.get_event_time(start_event, k))
                .collect::<Result<_, _>>()?;

            let output = DetectOutput {
                experiment: detect.experiment,
                n_samples: detected.len(),
                n_cycles: cycle_starts.len(),
                cycle_starts,
                events_file,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Analyze {
            detect,
            n_points,
            tolerance,
            min_cycles,
            analysis_channel,
        } => {
            let experiment_name = ExperimentName::new(detect.experiment.clone())?;
            let (detected, detector) = read_and_detect(&detect)?;

            // cycles run from one phase 1 start to the next
            let (start_event, _) = detector.event_names();
            let normalizer = TimeNormalizer::new(start_event, start_event).with_n_points(n_points);
            let bounds = normalizer.cycle_bounds(&detected);
            let normalized = normalizer
                .normalize(&detected)
                .context("time normalization failed")?;
            let ensemble = stack(&normalized, None).context("stacking cycles failed")?;
            info!(n_cycles = ensemble.n_cycles(), "cycles stacked");

            let channel = analysis_channel.unwrap_or_else(|| detect.channel.clone());
            let result = RepeatabilityConfig::new()
                .with_tolerance(tolerance)
                .with_min_cycles(min_cycles)
                .select(ensemble.channel(&channel)?)
                .context("repeatability selection failed")?;

            let writer = ResultWriter::new(&detect.output_dir, experiment_name)?;
            let normalized_file = writer.write_normalized(&normalized)?;
            let cycles_file = writer.write_cycles(&channel, n_points, &bounds, &result)?;

            let output = AnalyzeOutput {
                experiment: detect.experiment,
                n_samples: detected.len(),
                n_cycles: ensemble.n_cycles(),
                n_points,
                channel,
                bound: Some(result.bound).filter(|b| !b.is_nan()),
                selected: result.selected,
                rejected: result.rejected,
                nan_cycles: result.nan_cycles,
                normalized_file,
                cycles_file,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
