//! streampool daemon
//!
//! Runs a worker pool with the synthetic workload and drives it from
//! line-delimited JSON on stdin, writing session events to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use poolconf::{ConfigSources, PoolConfig};
use streampool::{bridge, detected_parallelism, pool_size, telemetry, StreamPool, SyntheticWorkload};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Least-loaded worker pool for realtime stream sessions", long_about = None)]
struct Cli {
    /// Config file (replaces ./streampool.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cap on worker count
    #[arg(long, global = true)]
    max_workers: Option<usize>,

    /// Log filter, e.g. "debug" or "streampool=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pool, reading control requests from stdin (default)
    Serve,
    /// Print the effective configuration
    Config,
    /// Print detected cores and the resulting pool size
    Plan,
}

fn load_config(cli: &Cli) -> Result<(PoolConfig, ConfigSources)> {
    let (mut config, sources) = PoolConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(max_workers) = cli.max_workers {
        config.pool.max_workers = max_workers;
    }
    if let Some(level) = &cli.log_level {
        config.telemetry.log_level = level.clone();
    }

    Ok((config, sources))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, sources) = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Config => {
            print!("{}", config.to_toml());
            Ok(())
        }
        Command::Plan => {
            let cores = detected_parallelism();
            println!("cores:       {cores}");
            println!("max_workers: {}", config.pool.max_workers);
            println!("pool size:   {}", pool_size(cores, config.pool.max_workers));
            Ok(())
        }
        Command::Serve => serve(config, sources).await,
    }
}

async fn serve(config: PoolConfig, sources: ConfigSources) -> Result<()> {
    telemetry::init(&config.telemetry.log_level).context("Failed to initialize logging")?;
    info!("streampool {} starting", env!("CARGO_PKG_VERSION"));
    for file in &sources.files {
        info!("config loaded from {}", file.display());
    }
    if !sources.env_overrides.is_empty() {
        info!(overrides = ?sources.env_overrides, "environment overrides applied");
    }

    let pool = StreamPool::spawn(&config, Arc::new(SyntheticWorkload::new()))
        .context("Failed to start worker pool")?;
    info!(workers = pool.size(), "worker pool ready");

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            ctrl_c.cancel();
        }
    });

    let input = bridge::spawn_line_reader(std::io::stdin(), config.events.control_buffer)
        .context("Failed to start control input reader")?;
    let result = bridge::run(pool.handle(), input, tokio::io::stdout(), shutdown).await;

    pool.shutdown().await.context("Failed to shut down worker pool")?;
    info!("streampool shutdown complete");
    result
}
