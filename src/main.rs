use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hybrid_outlier_engine::arrow_handler::{
    build_detection_result, build_score_result, parse_arrow_ipc,
};
use hybrid_outlier_engine::{
    Dataset, DetectorConfig, HybridDetector, Result, ScalingMethod, SplitMode,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hybrid-outlier-engine")]
#[command(version = "0.1.0")]
#[command(
    about = "Two-stage outlier detection: isolation forest candidates re-ranked by LOF",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run forest scoring and LOF refinement
    Detect {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: DetectorArgs,

        /// Number of final outliers (defaults to the candidate count)
        #[arg(long)]
        final_count: Option<usize>,
    },

    /// Forest scores only, plus the top-N forest ranking
    Score {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: DetectorArgs,

        /// Number of top-scored points to report
        #[arg(short = 'n', long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input file: CSV with a header row, or Arrow IPC stream (.arrow / .ipc)
    #[arg(short, long)]
    file: PathBuf,

    /// CSV column holding ground-truth labels (1 = outlier); never used for scoring
    #[arg(short, long)]
    label_column: Option<String>,

    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Output path (required for arrow; stdout for json when absent)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct DetectorArgs {
    #[arg(long)]
    trees: Option<usize>,

    #[arg(long)]
    sample_size: Option<usize>,

    #[arg(long)]
    split: Option<SplitMode>,

    /// LOF neighborhood size
    #[arg(short, long)]
    k: Option<usize>,

    #[arg(long)]
    alpha: Option<f64>,

    /// Dimensions averaged by the dispersion threshold
    #[arg(long)]
    top_dimensions: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    scale: Option<ScalingMethod>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Arrow,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hybrid_outlier_engine=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            input,
            params,
            final_count,
        } => {
            let mut config = load_config(&input, &params)?;
            if final_count.is_some() {
                config.refiner.final_count = final_count;
            }
            let dataset = load_dataset(&input)?;
            let detector = HybridDetector::new(config)?;
            let report = detector.detect(&dataset)?;

            match input.format {
                OutputFormat::Json => write_json(&report, input.output.as_deref())?,
                OutputFormat::Arrow => {
                    let bytes = build_detection_result(&dataset, &report)?;
                    write_arrow(&bytes, input.output.as_deref())?;
                }
            }
        }

        Commands::Score { input, params, top } => {
            let config = load_config(&input, &params)?;
            let dataset = load_dataset(&input)?;
            let detector = HybridDetector::new(config)?;
            let report = detector.score(&dataset, top.min(dataset.len()))?;

            match input.format {
                OutputFormat::Json => write_json(&report, input.output.as_deref())?,
                OutputFormat::Arrow => {
                    let bytes = build_score_result(&dataset, &report)?;
                    write_arrow(&bytes, input.output.as_deref())?;
                }
            }
        }
    }

    Ok(())
}

fn load_config(input: &InputArgs, params: &DetectorArgs) -> Result<DetectorConfig> {
    let mut config = match &input.config {
        Some(path) => DetectorConfig::from_file(path)?,
        None => DetectorConfig::default(),
    };

    if let Some(trees) = params.trees {
        config.forest.tree_count = trees;
    }
    if let Some(sample_size) = params.sample_size {
        config.forest.sample_size = sample_size;
    }
    if let Some(split) = params.split {
        config.forest.split_mode = split;
    }
    if params.seed.is_some() {
        config.forest.seed = params.seed;
    }
    if let Some(k) = params.k {
        config.refiner.k = k;
    }
    if let Some(alpha) = params.alpha {
        config.refiner.alpha = alpha;
    }
    if let Some(top_dimensions) = params.top_dimensions {
        config.refiner.top_dimensions = top_dimensions;
    }
    if let Some(scale) = params.scale {
        config.scaling = scale;
    }

    Ok(config)
}

fn load_dataset(input: &InputArgs) -> Result<Dataset> {
    let name = input
        .file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());

    let is_arrow = matches!(
        input.file.extension().and_then(|e| e.to_str()),
        Some("arrow") | Some("ipc")
    );

    let dataset = if is_arrow {
        let bytes = fs::read(&input.file)
            .with_context(|| format!("failed to read {}", input.file.display()))?;
        parse_arrow_ipc(name, &bytes)?
    } else {
        let content = fs::read_to_string(&input.file)
            .with_context(|| format!("failed to read {}", input.file.display()))?;
        Dataset::from_csv(name, &content, input.label_column.as_deref())?
    };

    tracing::info!(
        file = %input.file.display(),
        points = dataset.len(),
        dimensions = dataset.dimensions(),
        "dataset loaded"
    );
    Ok(dataset)
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}

fn write_arrow(bytes: &[u8], output: Option<&Path>) -> Result<()> {
    let path = output.context("--output is required with --format arrow")?;
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "arrow result written");
    Ok(())
}
