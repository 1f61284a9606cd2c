//! starmelt: Rebuild the star schema from raw song and event JSON
//!
//! Usage:
//!   # Read dl.toml from the working directory
//!   starmelt
//!
//!   # Explicit config and storage roots
//!   starmelt --config conf/dl.toml --input ./data/raw --output ./data/lake
//!
//!   # Tolerate case and spacing differences in artist names
//!   starmelt --join-key normalized
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use starmelt::config::{DEFAULT_CONFIG_PATH, JoinKeyMode, PipelineConfig};
use starmelt::{JsonDirectorySource, ParquetDirectorySink, Pipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "starmelt")]
#[command(about = "Rebuild songs, artists, users, time and songplays tables from raw JSON", long_about = None)]
struct Args {
    /// TOML file with the [aws] credentials section
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Root holding song_data/ and log_data/ (overrides the config file)
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Root the five table directories are written under (overrides the config file)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// How event artist names are matched to song metadata
    #[arg(long, value_enum)]
    join_key: Option<JoinKeyMode>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = PipelineConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    if let Some(input) = args.input {
        config.input_root = input;
    }
    if let Some(output) = args.output {
        config.output_root = output;
    }
    if let Some(join_key) = args.join_key {
        config.join_key = join_key;
    }

    info!(
        "Reading from {} and writing to {}",
        config.input_root.display(),
        config.output_root.display()
    );

    let source = JsonDirectorySource::new(&config.input_root).with_credentials(config.credentials.clone());
    let sink = ParquetDirectorySink::new(&config.output_root)
        .with_compression(config.compression)
        .with_credentials(config.credentials.clone());

    let summary = Pipeline::from_config(source, sink, &config)
        .run()
        .context("Pipeline run failed")?;

    info!(
        "Wrote {} songs, {} artists, {} users, {} time rows and {} songplays",
        summary.songs, summary.artists, summary.users, summary.time, summary.songplays
    );
    Ok(())
}
