use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use labelwise_io::{DatasetReader, ExperimentName, LabelReader, SuggestionReport, SuggestionWriter};
use labelwise_suggest::{
    BuilderConfig, CallbackToken, ReferenceBuilder, SuggestionEvent, SuggestionModel, SuggestionRequest,
    SuggestionScheduler,
};

#[derive(Parser)]
#[command(name = "labelwise")]
#[command(about = "DTW-based label suggestion for multivariate sensor recordings")]
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

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Tuning parameters for reference building.
#[derive(Args, Debug, Clone)]
struct BuildArgs {
    /// Samples the longest label is resampled to; fixes the model sample rate
    #[arg(long, default_value_t = 100)]
    samples_per_longest_label: usize,

    /// Calibration margin as a fraction of each label's duration
    #[arg(long, default_value_t = 0.1)]
    calibration_margin: f64,

    /// Number of prototypes clustered per class
    #[arg(long, default_value_t = 1)]
    prototypes_per_class: usize,

    /// Maximum K-means rounds per class
    #[arg(long, default_value_t = 10)]
    max_iter: usize,

    /// DBA iterations per centroid update
    #[arg(long, default_value_t = 10)]
    dba_max_iter: usize,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Build a suggestion model from confirmed labels
    Build {
        /// Path to the recording CSV (timestamp column first)
        #[arg(long)]
        dataset: PathBuf,

        /// Path to the labels CSV (class,start,end[,state])
        #[arg(long)]
        labels: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        tuning: BuildArgs,
    },

    /// Suggest labels over a time range of a recording
    Suggest {
        /// Path to the recording CSV
        #[arg(long)]
        dataset: PathBuf,

        /// Path to a model written by `build`
        #[arg(long)]
        model: PathBuf,

        /// Start of the range in seconds (defaults to the first timestamp)
        #[arg(long)]
        start: Option<f64>,

        /// End of the range in seconds (defaults to the last timestamp)
        #[arg(long)]
        end: Option<f64>,

        /// Minimum confidence in (0, 1] a suggestion must reach
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,

        /// Generation tag copied into every suggestion
        #[arg(long, default_value_t = 1)]
        generation: u64,

        /// Samples fed per chunk across all references (defaults to the model's)
        #[arg(long)]
        chunk_budget: Option<usize>,

        /// Experiment name for output files; suggestions are only printed when omitted
        #[arg(long)]
        experiment: Option<String>,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Generate microcontroller source code for a model
    Deploy {
        /// Path to a model written by `build`
        #[arg(long)]
        model: PathBuf,

        /// Target platform: "arduino" or "microbit"
        #[arg(long)]
        platform: String,

        /// Write the code here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct BuildOutput {
    experiment: String,
    n_labels: usize,
    n_confirmed: usize,
    sample_rate: f64,
    n_references: usize,
    n_active_references: usize,
    skipped_exemplars: usize,
    model_path: PathBuf,
}

#[derive(Serialize)]
struct SuggestOutput {
    generation: u64,
    timestamp_start: f64,
    timestamp_end: f64,
    n_candidates: usize,
    n_chunks: usize,
    confidence_histogram: Option<[u32; 10]>,
}

/// Drain a finished run's events into a report, failing on an error event.
fn collect_report(
    events: impl IntoIterator<Item = SuggestionEvent>,
    request: &SuggestionRequest,
) -> Result<(SuggestionReport, usize)> {
    let mut report = SuggestionReport {
        generation: request.generation,
        timestamp_start: request.timestamp_start,
        timestamp_end: request.timestamp_end,
        confidence_threshold: request.confidence_threshold,
        candidates: Vec::new(),
        confidence_histogram: None,
    };
    let mut n_chunks = 0;
    for event in events {
        match event {
            SuggestionEvent::Update(update) => {
                report.timestamp_start = update.progress.timestamp_start;
                report.timestamp_end = update.progress.timestamp_end;
                report.confidence_histogram = update.progress.confidence_histogram;
                report.candidates.extend(update.candidates);
                if !update.completed {
                    n_chunks += 1;
                }
            }
            SuggestionEvent::Failed { generation, error } => {
                return Err(error).with_context(|| format!("suggestion generation {generation} failed"));
            }
        }
    }
    Ok((report, n_chunks))
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

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Build {
            dataset,
            labels,
            experiment,
            output_dir,
            tuning,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            let recording = DatasetReader::new(&dataset)
                .read()
                .context("failed to read recording CSV")?;
            let all_labels = LabelReader::new(&labels)
                .read()
                .context("failed to read labels CSV")?;
            let confirmed: Vec<_> = all_labels.iter().filter(|l| l.state.is_confirmed()).cloned().collect();
            info!(n_labels = all_labels.len(), n_confirmed = confirmed.len(), "labels loaded");

            let config = BuilderConfig::default()
                .with_samples_per_longest_label(tuning.samples_per_longest_label)
                .with_calibration_margin(tuning.calibration_margin)
                .with_prototypes_per_class(tuning.prototypes_per_class)
                .with_max_iter(tuning.max_iter)
                .with_dba_max_iter(tuning.dba_max_iter)
                .with_seed(tuning.seed);
            let built = ReferenceBuilder::new(config)?
                .build(&recording, &confirmed)
                .context("reference building failed")?;
            let skipped_exemplars = built.skipped_exemplars;
            let model = built.into_model();

            let writer = SuggestionWriter::new(&output_dir, experiment_name)?;
            let model_path = writer.model_path();
            model.save(&model_path).context("failed to save model")?;

            let output = BuildOutput {
                experiment,
                n_labels: all_labels.len(),
                n_confirmed: confirmed.len(),
                sample_rate: model.sample_rate(),
                n_references: model.references().len(),
                n_active_references: model.active_references().count(),
                skipped_exemplars,
                model_path,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Suggest {
            dataset,
            model,
            start,
            end,
            confidence,
            generation,
            chunk_budget,
            experiment,
            output_dir,
        } => {
            let experiment_name = experiment.map(ExperimentName::new).transpose()?;

            let recording = DatasetReader::new(&dataset)
                .read()
                .context("failed to read recording CSV")?;
            let mut model = SuggestionModel::load(&model).context("failed to load model")?;
            if let Some(budget) = chunk_budget {
                model = model.with_chunk_budget(budget);
            }

            let (first, last) = recording.time_range();
            let request = SuggestionRequest::new(start.unwrap_or(first), end.unwrap_or(last), confidence, generation);

            let (tx, rx) = mpsc::channel();
            let mut scheduler = SuggestionScheduler::new();
            scheduler.compute_suggestion(&model, Arc::new(recording), request, CallbackToken::new(generation), tx);
            let steps = scheduler.run_until_idle();
            info!(steps, "suggestion run drained");

            let (report, n_chunks) = collect_report(rx.try_iter(), &request)?;
            if report.candidates.is_empty() {
                warn!("no suggestions above the confidence threshold");
            }

            if let Some(experiment_name) = experiment_name {
                let writer = SuggestionWriter::new(&output_dir, experiment_name)?;
                writer.write_suggestions(&report)?;
                writer.write_labels(&report.candidates)?;
            }

            let output = SuggestOutput {
                generation: report.generation,
                timestamp_start: report.timestamp_start,
                timestamp_end: report.timestamp_end,
                n_candidates: report.candidates.len(),
                n_chunks,
                confidence_histogram: report.confidence_histogram,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Deploy {
            model,
            platform,
            output,
        } => {
            let model = SuggestionModel::load(&model).context("failed to load model")?;
            let code = model
                .deployment_code(&platform)
                .with_context(|| format!("cannot generate code for {platform}"))?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &code)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "deployment code written");
                }
                None => print!("{code}"),
            }
        }
    }

    Ok(())
}
