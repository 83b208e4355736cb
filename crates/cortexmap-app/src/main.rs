//! Cortexmap Application
//!
//! Command-line entry point: commits the built-in network to brain regions
//! and prints prediction tables as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Layers of the built-in network
//! cortexmap layers
//!
//! # Direct commitment of IT to two layers
//! cortexmap predict --region IT --layer linear --layer relu2 --stimuli stimuli.json
//!
//! # Fitted commitment against a reference assembly
//! cortexmap fit --region IT --candidate linear --candidate relu2 \
//!     --assembly assembly.json --stratify category_name --window 70:170
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use cortexmap_core::{NeuroidAssembly, StimulusSet, TimeWindow};
use cortexmap_native::{
    ActivationSource, CachedActivations, CommitmentConfig, RecordingModel, RegionCommitmentStrategy,
    SequentialNetwork,
};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Cortexmap
#[derive(Parser, Debug)]
#[command(name = "cortexmap")]
#[command(author, version, about = "Commit layered activation models to brain regions", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// JSON configuration file (defaults apply when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the built-in network weights
    #[arg(long, default_value = "0")]
    seed: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List layers of the built-in network
    Layers,

    /// Commit a region directly to layers and predict responses
    Predict {
        /// Region to commit and record
        #[arg(short, long)]
        region: String,

        /// Layer to commit (repeat for several)
        #[arg(short = 'L', long = "layer", required = true)]
        layers: Vec<String>,

        /// Stimulus set JSON file
        #[arg(short, long)]
        stimuli: PathBuf,

        /// Write the table here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit a region to the best candidate layer and predict responses
    Fit {
        /// Region to commit and record
        #[arg(short, long)]
        region: String,

        /// Candidate layer, in preference order (repeat for several)
        #[arg(short = 'C', long = "candidate", required = true)]
        candidates: Vec<String>,

        /// Reference assembly JSON file
        #[arg(short, long)]
        assembly: PathBuf,

        /// Stimulus attribute used to stratify cross-validation
        #[arg(long, default_value = "category_name")]
        stratify: String,

        /// Recording window as `start:end` in ms (repeat for several)
        #[arg(short, long = "window", value_parser = parse_window)]
        windows: Vec<TimeWindow>,

        /// Average repeated presentations before fitting
        #[arg(long)]
        average_repetition: bool,

        /// Stimulus set to predict (defaults to the assembly's)
        #[arg(short, long)]
        stimuli: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Cortexmap v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => CommitmentConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CommitmentConfig::default(),
    };

    match cli.command {
        Commands::Layers => list_layers(cli.seed),
        Commands::Predict {
            region,
            layers,
            stimuli,
            output,
        } => run_predict(&config, cli.seed, &region, &layers, &stimuli, output.as_deref()),
        Commands::Fit {
            region,
            candidates,
            assembly,
            stratify,
            windows,
            average_repetition,
            stimuli,
            output,
        } => {
            let assembly = NeuroidAssembly::from_json_file(&assembly, average_repetition)
                .with_context(|| format!("loading assembly {}", assembly.display()))?;
            let stimuli = match stimuli {
                Some(path) => StimulusSet::from_json_file(&path)
                    .with_context(|| format!("loading stimuli {}", path.display()))?,
                None => assembly.stimulus_set().clone(),
            };
            let fit = FitRequest {
                region: &region,
                candidates,
                assembly: &assembly,
                stratify: &stratify,
                windows: &windows,
                stimuli: &stimuli,
            };
            run_fit(&config, cli.seed, &fit, output.as_deref())
        }
    }
}

/// Built-in network with the configured batch size
fn network(config: &CommitmentConfig, seed: u64) -> anyhow::Result<SequentialNetwork> {
    let mut network = SequentialNetwork::custom(seed)?;
    network.set_batch_size(config.recording.batch_size);
    Ok(network)
}

/// Print every layer with its width
fn list_layers(seed: u64) -> anyhow::Result<()> {
    let network = SequentialNetwork::custom(seed)?;
    info!("Network {} has {} layers", network.identifier(), network.layers().len());
    for layer in network.layers() {
        println!("{}\t{}", layer, network.width(layer).unwrap_or(0));
    }
    Ok(())
}

/// Direct commit → record → look_at
fn run_predict(
    config: &CommitmentConfig,
    seed: u64,
    region: &str,
    layers: &[String],
    stimuli: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let stimuli =
        StimulusSet::from_json_file(stimuli).with_context(|| format!("loading stimuli {}", stimuli.display()))?;

    let network = network(config, seed)?;
    let identifier = network.identifier().to_owned();
    let mut model = RecordingModel::new(
        identifier,
        network,
        RegionCommitmentStrategy::Direct,
        config.clone(),
    )?;

    let layers: Vec<&str> = layers.iter().map(String::as_str).collect();
    model.commit(region, layers)?;
    model.start_recording(region, &[])?;
    let table = model.look_at(&stimuli)?;

    info!(
        "Predicted {} rows for {} stimuli in {}",
        table.len(),
        stimuli.len(),
        region
    );
    emit(&table, output)
}

struct FitRequest<'a> {
    region: &'a str,
    candidates: Vec<String>,
    assembly: &'a NeuroidAssembly,
    stratify: &'a str,
    windows: &'a [TimeWindow],
    stimuli: &'a StimulusSet,
}

#[derive(Serialize)]
struct FitReport<'a> {
    selection: &'a cortexmap_native::LayerSelection,
    predictions: &'a cortexmap_core::PredictionTable,
}

/// Fitted commit_region → record → look_at
fn run_fit(
    config: &CommitmentConfig,
    seed: u64,
    request: &FitRequest<'_>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let network = CachedActivations::new(network(config, seed)?);
    let identifier = network.identifier().to_owned();
    let candidates: Vec<&str> = request.candidates.iter().map(String::as_str).collect();
    let strategy = RegionCommitmentStrategy::fitted(candidates, config);

    let mut model = RecordingModel::new(identifier, network, strategy, config.clone())?;
    let selection = model
        .commit_region(request.region, request.assembly, request.stratify)?
        .clone();

    let windows: Vec<(f64, f64)> = request.windows.iter().map(|w| (w.start_ms, w.end_ms)).collect();
    model.start_recording(request.region, &windows)?;
    let predictions = model.look_at(request.stimuli)?;

    info!(
        "Region {} committed to {} ({} prediction rows)",
        request.region,
        selection.selected,
        predictions.len()
    );
    emit(
        &FitReport {
            selection: &selection,
            predictions: &predictions,
        },
        output,
    )
}

/// Write JSON to `output` or stdout
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn parse_window(text: &str) -> Result<TimeWindow, String> {
    TimeWindow::parse(text).map_err(|e| e.to_string())
}
