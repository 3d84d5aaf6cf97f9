//! sfxkit - pooled one-shot sound playback with background music rotation
//!
//! Headless driver: loads a sound manifest and replays a tick-based command script.

mod command_script;
mod config;
mod headless;

use anyhow::Result;
use clap::Parser;
use config::AudioConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless sound playback driver", long_about = None)]
struct Args {
    /// Audio configuration (TOML); defaults are used when missing
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sound manifest file or directory, overriding the config
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Command script (JSON) replayed tick by tick
    #[arg(long)]
    script: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Seed for variant selection and variance, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Sleep one tick length between ticks
    #[arg(long)]
    realtime: bool,
}

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting sfxkit v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut audio = match args.config.as_deref() {
        Some(path) => AudioConfig::load_from_path(path),
        None => AudioConfig::load(),
    };
    if let Some(manifest) = args.manifest {
        audio.manifest = manifest;
    }
    if args.seed.is_some() {
        audio.seed = args.seed;
    }

    let summary = headless::run(headless::HeadlessConfig {
        audio,
        command_script: args.script,
        max_ticks: args.max_ticks,
        realtime: args.realtime,
    })?;
    println!(
        "ticks={} played={} dropped={}",
        summary.ticks, summary.played, summary.dropped
    );
    Ok(())
}
