//! Sharded text pipeline runner
//!
//! Prints one worker's shard of one or more text files, optionally shuffled
//! and windowed. Useful for checking how a dataset splits across workers
//! before wiring it into a training job.
//!
//! # Usage
//!
//! ```bash
//! # Lines owned by worker 1 of 4
//! sdp corpus.txt --worker-id 1 --num-workers 4
//!
//! # Parallel source/target files, first 10 rows
//! sdp train.src train.tgt --layout zip --limit 10
//!
//! # Contiguous shard, shuffled in units of 1000 lines
//! sdp corpus.txt --layout indexed --shuffle-buffer 1000 --seed 7
//! ```

mod pipeline;

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeline::{Layout, PipelineOptions};
use pipeline_core::{Dataset, PipelineConfig, WorkerContext};

/// Sharded text pipeline runner
#[derive(Parser, Debug)]
#[command(name = "sdp")]
#[command(about = "Print one worker's shard of a text dataset")]
struct Args {
    /// Input text files
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// How multiple files combine (lines, concat, zip, indexed)
    #[arg(short, long, value_enum, default_value = "lines")]
    layout: Layout,

    /// 0-based worker index
    #[arg(long)]
    worker_id: Option<usize>,

    /// Total number of workers
    #[arg(long)]
    num_workers: Option<usize>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shuffle in units of this many records
    #[arg(long, conflicts_with = "shuffle_all")]
    shuffle_buffer: Option<usize>,

    /// Shuffle the whole shard in memory
    #[arg(long)]
    shuffle_all: bool,

    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,

    /// Group records into windows of this size
    #[arg(short, long)]
    window: Option<usize>,

    /// Distance between window starts (defaults to the window size)
    #[arg(long, requires = "window")]
    shift: Option<usize>,

    /// Stop after this many output rows
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    config.validate()?;

    let ctx = match (args.worker_id, args.num_workers) {
        (None, None) => config.worker.context()?,
        (id, n) => WorkerContext::from_parts(id, n)?,
    };

    let options = PipelineOptions {
        layout: args.layout,
        shuffle: args.shuffle_all || args.shuffle_buffer.is_some() || config.shuffle.buffer_size.is_some(),
        shuffle_buffer: if args.shuffle_all {
            None
        } else {
            args.shuffle_buffer.or(config.shuffle.buffer_size)
        },
        seed: args.seed.or(config.shuffle.seed),
        window: args.window,
        shift: args.shift,
    };

    tracing::info!(
        files = args.paths.len(),
        layout = ?options.layout,
        ?ctx,
        "Starting pipeline"
    );

    let dataset = pipeline::build(&args.paths, &options, &config.text)?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = pipeline::write_rows(dataset.iter_with(ctx)?, &mut out, args.limit)?;
    out.flush()?;

    tracing::info!(
        printed = summary.printed,
        skipped = summary.skipped,
        "Pipeline finished"
    );
    Ok(())
}
