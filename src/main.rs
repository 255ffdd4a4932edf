use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use keystats::{process, reader, write_summary, Config, MalformedPolicy};

/// Computes per-key min/mean/max statistics over a `key;value` text file
/// and writes a sorted summary.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Input file, one `key;value` record per line.
    input: PathBuf,

    /// Where to write the summary.
    #[arg(long, default_value = "results.txt")]
    output: PathBuf,

    /// Read block size in bytes. Must be at least 1.
    #[arg(
        long,
        default_value_t = reader::DEFAULT_BLOCK_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    block_size: usize,

    /// Number of worker threads. Defaults to the available cores.
    #[arg(long)]
    workers: Option<usize>,

    /// What to do with records lacking a `;` separator.
    #[arg(long, value_enum, default_value_t = MalformedArg::Skip)]
    malformed: MalformedArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MalformedArg {
    Skip,
    Warn,
    Fail,
}

impl From<MalformedArg> for MalformedPolicy {
    fn from(arg: MalformedArg) -> Self {
        match arg {
            MalformedArg::Skip => MalformedPolicy::Skip,
            MalformedArg::Warn => MalformedPolicy::Warn,
            MalformedArg::Fail => MalformedPolicy::Fail,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = Config {
        block_size: args.block_size,
        malformed: args.malformed.into(),
        ..Config::default()
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    #[cfg(feature = "timings")]
    let duration = std::time::Instant::now();

    let file =
        File::open(&args.input).with_context(|| format!("open {}", args.input.display()))?;
    let entries = process(file, &config)
        .with_context(|| format!("aggregate {}", args.input.display()))?;

    #[cfg(feature = "timings")]
    println!("aggregating: {:?}", duration.elapsed());

    #[cfg(feature = "timings")]
    let duration = std::time::Instant::now();

    let out = File::create(&args.output)
        .with_context(|| format!("create {}", args.output.display()))?;
    let mut out = BufWriter::new(out);
    write_summary(&mut out, &entries)?;
    out.flush()?;

    #[cfg(feature = "timings")]
    println!("writing: {:?}", duration.elapsed());

    info!(
        keys = entries.len(),
        output = %args.output.display(),
        "summary written"
    );
    Ok(())
}
