//! `drape` command-line entry point.
//!
//! Creates checkpoints, inspects them, and runs single steps or rollouts
//! on frames stored as JSON.

mod grid;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use drape_core::TrajectoryFrame;
use drape_net::checkpoint;
use drape_net::normalizer::NormalizerSet;
use drape_net::params::ModelParams;
use drape_net::rollout::rollout;
use drape_net::{ClothModel, EncodeProcessDecode, ExecutionContext, ModelConfig, NumericCheck};

use grid::Pin;

#[derive(Parser)]
#[command(name = "drape")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Learned cloth simulation on triangle meshes")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a checkpoint with freshly initialised weights
    Init {
        /// Model configuration as JSON; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seed for weight initialisation
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        /// Checkpoint to create
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Print the configuration and parameter counts of a checkpoint
    Inspect {
        checkpoint: PathBuf,
    },
    /// Predict the next positions for one frame
    Step {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Predict several steps, feeding each prediction back in
    Rollout {
        #[command(flatten)]
        run: RunArgs,
        /// Number of steps
        #[arg(short = 'n', long, default_value_t = 10)]
        steps: usize,
    },
    /// Write a hanging cloth sheet as a frame JSON
    Grid {
        /// Nodes per row
        #[arg(long, default_value_t = 16)]
        width: usize,
        /// Number of rows
        #[arg(long, default_value_t = 16)]
        height: usize,
        /// Rest distance between neighbouring nodes
        #[arg(long, default_value_t = 0.1)]
        spacing: f32,
        #[arg(long, value_enum, default_value_t = Pin::Corners)]
        pin: Pin,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Checkpoint written by `drape init` or a trainer
    #[arg(short, long)]
    checkpoint: PathBuf,
    /// Frame JSON
    #[arg(short, long)]
    frame: PathBuf,
    /// Normalizer statistics JSON
    #[arg(long)]
    normalizers: Option<PathBuf>,
    /// What to do when a stage produces NaN or infinity: off, warn or fail
    #[arg(long, default_value = "warn")]
    numeric_check: NumericCheck,
    /// Output file; stdout when omitted
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct CheckpointSummary<'a> {
    config: &'a ModelConfig,
    total_params: usize,
    sub_networks: Vec<(String, usize)>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid {what} {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn load_model(run: &RunArgs) -> Result<ClothModel> {
    let (config, params) = checkpoint::load_from_path(&run.checkpoint)
        .with_context(|| format!("failed to load checkpoint {}", run.checkpoint.display()))?;
    let mut model = ClothModel::new(EncodeProcessDecode::from_params(config, params)?);
    if let Some(path) = &run.normalizers {
        let stats: NormalizerSet = read_json(path, "normalizers")?;
        model = model.with_normalizers(stats)?;
    }
    Ok(model)
}

/// Logs every recorded numeric issue and returns how many there were.
fn report_issues(ctx: &ExecutionContext) -> usize {
    for issue in ctx.issues() {
        warn!(
            stage = %issue.stage,
            non_finite = issue.non_finite,
            "non-finite values in model output"
        );
    }
    ctx.issues().len()
}

fn init(config: Option<&Path>, seed: u64, out: &Path) -> Result<()> {
    let config = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            ModelConfig::from_json(&text)?
        }
        None => ModelConfig::default(),
    };
    config.validate()?;
    let params = ModelParams::new_random(&config, seed)?;
    checkpoint::save_to_path(out, &config, &params)?;
    println!(
        "wrote {} ({} parameters, seed {seed})",
        out.display(),
        params.param_count()
    );
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let (config, params) = checkpoint::load_from_path(path)
        .with_context(|| format!("failed to load checkpoint {}", path.display()))?;
    let mut sub_networks = vec![
        ("node_encoder".to_string(), params.node_encoder.param_count()),
        ("edge_encoder".to_string(), params.edge_encoder.param_count()),
    ];
    for (i, block) in params.blocks.iter().enumerate() {
        sub_networks.push((format!("block{i}.edge"), block.edge_net.param_count()));
        sub_networks.push((format!("block{i}.node"), block.node_net.param_count()));
    }
    sub_networks.push(("pool_expand".to_string(), params.expand.param_count()));
    sub_networks.push(("pool_reduce".to_string(), params.reduce.param_count()));
    sub_networks.push(("decoder".to_string(), params.decoder.param_count()));
    write_json(
        &CheckpointSummary {
            config: &config,
            total_params: params.param_count(),
            sub_networks,
        },
        None,
    )
}

fn step(run: &RunArgs) -> Result<()> {
    let model = load_model(run)?;
    let frame: TrajectoryFrame = read_json(&run.frame, "frame")?;
    let mut ctx = ExecutionContext::new(run.numeric_check);
    let next = model.predict_next(&frame, &mut ctx)?;
    report_issues(&ctx);
    write_json(&next, run.out.as_deref())
}

fn run_rollout(run: &RunArgs, steps: usize) -> Result<()> {
    let model = load_model(run)?;
    let frame: TrajectoryFrame = read_json(&run.frame, "frame")?;
    let mut ctx = ExecutionContext::new(run.numeric_check);
    let result = rollout(&model, &frame, steps, &mut ctx)?;
    report_issues(&ctx);
    write_json(&result, run.out.as_deref())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init { config, seed, out } => init(config.as_deref(), seed, &out),
        Commands::Inspect { checkpoint } => inspect(&checkpoint),
        Commands::Step { run } => step(&run),
        Commands::Rollout { run, steps } => run_rollout(&run, steps),
        Commands::Grid {
            width,
            height,
            spacing,
            pin,
            out,
        } => {
            if width < 2 || height < 2 {
                bail!("a sheet needs at least 2×2 nodes, got {width}×{height}");
            }
            let frame = grid::hanging_sheet(width, height, spacing, pin)?;
            write_json(&frame, out.as_deref())
        }
    }
}
