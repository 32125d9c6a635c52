mod dataset;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use warpnn_distance::{
    BandConstraint, Dtw, ElasticDistance, ElasticKernel, Erp, Lcss, Msm, Twed, Wdtw,
};
use warpnn_loocv::{
    EngineState, IncrementalLoocv, LoocvCheckpoint, LoocvConfig, LoocvResults, LoocvStats,
    NeighbourOrder,
};

use crate::dataset::{LabelledDataset, SequenceReader};

#[derive(Parser)]
#[command(name = "warpnn")]
#[command(about = "Elastic-distance nearest-neighbour leave-one-out evaluation")]
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

#[derive(Subcommand)]
enum Command {
    /// Leave-one-out k-NN evaluation, resumable through a checkpoint file
    Loocv(LoocvArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Measure {
    Dtw,
    Wdtw,
    Erp,
    Lcss,
    Msm,
    Twed,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderArg {
    Linear,
    Shuffled,
}

/// Elastic distance parameters. Each measure reads only the ones it needs.
#[derive(Args, Debug, Clone)]
struct KernelArgs {
    /// Distance measure
    #[arg(long, value_enum, default_value = "dtw")]
    measure: Measure,

    /// Warping window as a fraction of the longest series (dtw, erp, lcss); unset = unconstrained
    #[arg(long)]
    window: Option<f64>,

    /// Logistic weight decay (wdtw) or gap reference value (erp)
    #[arg(long, default_value_t = 0.0)]
    g: f64,

    /// Match tolerance (lcss)
    #[arg(long, default_value_t = 0.05)]
    epsilon: f64,

    /// Split/merge cost (msm)
    #[arg(long, default_value_t = 1.0)]
    c: f64,

    /// Deletion penalty (twed)
    #[arg(long, default_value_t = 1.0)]
    lambda: f64,

    /// Stiffness (twed)
    #[arg(long, default_value_t = 0.001)]
    nu: f64,

    /// Compare first derivatives instead of raw values
    #[arg(long, default_value_t = false)]
    derivative: bool,
}

#[derive(Args, Debug, Clone)]
struct LoocvArgs {
    /// Path to a CSV of `label,t0,t1,...` rows
    #[arg(long)]
    data: PathBuf,

    /// The CSV starts with a header row
    #[arg(long, default_value_t = false)]
    header: bool,

    #[command(flatten)]
    kernel: KernelArgs,

    /// Number of neighbours that vote
    #[arg(long, default_value_t = 1)]
    k: usize,

    /// Pause after this many instances have been revealed
    #[arg(long)]
    neighbour_limit: Option<usize>,

    /// Pause before a round that would cross this many milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Instance visiting order
    #[arg(long, value_enum, default_value = "linear")]
    order: OrderArg,

    /// RNG seed for the shuffled order
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Checkpoint file: resumed from when present, written when the run pauses
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Leave cached distances out of the checkpoint
    #[arg(long, default_value_t = false)]
    compact_checkpoint: bool,

    /// Recompute every cache hit and fail on disagreement
    #[arg(long, default_value_t = false)]
    verify_cache_hits: bool,

    /// Write per-instance predictions as JSON to this path
    #[arg(long)]
    predictions: Option<PathBuf>,
}

/// Printed to stdout after every invocation.
#[derive(Serialize)]
struct LoocvSummary {
    measure: &'static str,
    kernel: String,
    n_instances: usize,
    processed: usize,
    state: String,
    accuracy: Option<f64>,
    macro_f1: Option<f64>,
    class_names: Vec<String>,
    stats: LoocvStats,
    train_ms: f64,
    estimate_ms: f64,
    checkpoint: Option<PathBuf>,
}

fn build_kernel(args: &KernelArgs, dataset: &LabelledDataset) -> Result<ElasticKernel> {
    let constraint = match args.window {
        Some(fraction) => BandConstraint::from_fraction(fraction, dataset.max_len())?,
        None => BandConstraint::Unconstrained,
    };
    let base: ElasticKernel = match args.measure {
        Measure::Dtw => Dtw::from_constraint(constraint).into(),
        Measure::Wdtw => Wdtw::new(args.g)?.into(),
        Measure::Erp => Erp::new(constraint, args.g)?.into(),
        Measure::Lcss => Lcss::new(constraint, args.epsilon)?.into(),
        Measure::Msm => Msm::new(args.c)?.into(),
        Measure::Twed => Twed::new(args.lambda, args.nu)?.into(),
    };
    Ok(if args.derivative {
        ElasticKernel::derivative(base)
    } else {
        base
    })
}

fn build_config(args: &LoocvArgs) -> Result<LoocvConfig> {
    let order = match args.order {
        OrderArg::Linear => NeighbourOrder::Linear,
        OrderArg::Shuffled => NeighbourOrder::Shuffled { seed: args.seed },
    };
    Ok(LoocvConfig::new(args.k)?
        .with_neighbour_limit(args.neighbour_limit)
        .with_train_time_limit(args.time_limit_ms.map(Duration::from_millis))
        .with_order(order)
        .with_verify_cache_hits(args.verify_cache_hits))
}

fn nanos_to_ms(nanos: u64) -> f64 {
    nanos as f64 / 1e6
}

fn run_loocv(args: LoocvArgs, quiet: bool) -> Result<()> {
    let dataset = SequenceReader::new(&args.data)
        .with_header(args.header)
        .read()
        .context("failed to read input CSV")?;
    let kernel = build_kernel(&args.kernel, &dataset).context("invalid kernel parameters")?;
    let config = build_config(&args).context("invalid evaluation parameters")?;
    info!(kernel = %kernel.fingerprint(), k = args.k, "kernel configured");

    let existing = args.checkpoint.as_ref().filter(|p| p.exists());
    let mut engine = match existing {
        Some(path) => {
            let checkpoint = LoocvCheckpoint::load(path).context("failed to load checkpoint")?;
            IncrementalLoocv::resume(&dataset.sequences, kernel, config, checkpoint)
                .context("checkpoint does not belong to this run")?
        }
        None => IncrementalLoocv::new(&dataset.sequences, kernel, config)?,
    };

    let state = engine.run().context("leave-one-out evaluation failed")?;

    let mut results: Option<LoocvResults> = None;
    let mut saved = None;
    match state {
        EngineState::Finished => {
            results = Some(engine.finish()?);
            if let Some(path) = existing {
                std::fs::remove_file(path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
                info!(path = %path.display(), "stale checkpoint removed");
            }
        }
        EngineState::Paused(reason) => {
            info!(?reason, processed = engine.processed(), "run paused");
            if let Some(path) = &args.checkpoint {
                let mut checkpoint = engine.checkpoint()?;
                if args.compact_checkpoint {
                    checkpoint = checkpoint.without_cache();
                }
                checkpoint.save(path).context("failed to save checkpoint")?;
                saved = Some(path.clone());
            }
        }
        EngineState::Idle | EngineState::Building { .. } => {}
    }

    let confusion = results.as_ref().map(LoocvResults::confusion_matrix).transpose()?;
    if let Some(cm) = &confusion
        && !quiet
    {
        eprintln!("{cm}");
    }

    if let (Some(path), Some(results)) = (&args.predictions, &results) {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &results.predictions)
            .context("failed to write predictions")?;
        info!(path = %path.display(), "predictions written");
    }

    let summary = LoocvSummary {
        measure: engine.kernel().name(),
        kernel: engine.kernel().fingerprint(),
        n_instances: dataset.sequences.len(),
        processed: engine.processed(),
        state: format!("{state:?}"),
        accuracy: results.as_ref().map(LoocvResults::accuracy),
        macro_f1: confusion.as_ref().map(|cm| cm.macro_f1()),
        class_names: dataset.class_names.clone(),
        stats: engine.stats(),
        train_ms: nanos_to_ms(engine.train_nanos()),
        estimate_ms: nanos_to_ms(engine.estimate_nanos()),
        checkpoint: saved,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
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
        Command::Loocv(args) => run_loocv(args, cli.quiet),
    }
}
