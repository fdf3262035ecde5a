//! Channelbot CLI: inspect bot state and history without running a bot.
//!
//! Commands:
//! - `positions`: print the persisted position snapshot of an instance
//! - `stats`: performance statistics from a position history CSV, as JSON
//! - `check-config`: load and validate a bot config file

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use channelbot_core::bot::BotStrategy;
use channelbot_core::logging::init_logging;
use channelbot_core::store::PositionSnapshot;
use channelbot_core::strategy::{ChannelStrategy, SignalSource};
use channelbot_core::{load_config, BotConfig};
use channelbot_runner::{save_report, ContractKind, PerformanceStats, StatsReport};

#[derive(Parser)]
#[command(name = "channelbot", about = "Channelbot CLI: position state and performance statistics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the persisted open positions of a bot instance as JSON.
    Positions {
        /// Path to the bot's TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Compute performance statistics from a position history CSV.
    Stats {
        /// History CSV. Defaults to the history of the instance in --config.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Path to a TOML config file (used to locate the history).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Results of an inverse contract (base-currency P&L).
        #[arg(long, default_value_t = false)]
        inverse: bool,

        /// Also write stats.json and stats.csv into this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Load and validate a config file.
    CheckConfig {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Positions { config } => run_positions(&config),
        Commands::Stats {
            history,
            config,
            inverse,
            output_dir,
        } => run_stats(history, config, inverse, output_dir),
        Commands::CheckConfig { config } => run_check_config(&config),
    }
}

fn load(path: &Path) -> Result<BotConfig> {
    let config = load_config(path).with_context(|| format!("failed to load config {}", path.display()))?;
    init_logging(&config.logging.level, config.logging.dir.as_deref(), "channelbot-cli")?;
    Ok(config)
}

fn run_positions(config_path: &Path) -> Result<()> {
    let config = load(config_path)?;
    let Some(storage) = config.bot_storage() else {
        bail!("config has no storage.instance_id, nothing is persisted");
    };
    let path = storage.snapshot_path();
    if !path.exists() {
        bail!("no snapshot for {} at {}", storage.key(), path.display());
    }

    let snapshot = PositionSnapshot::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    info!("{} positions in snapshot of {}", snapshot.positions.len(), storage.key());
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn run_stats(
    history: Option<PathBuf>,
    config_path: Option<PathBuf>,
    inverse: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => Some(load(path)?),
        None => {
            init_logging("warn", None, "channelbot-cli")?;
            None
        }
    };
    let path = resolve_history_path(history, config.as_ref())?;
    let kind = if inverse || config.as_ref().is_some_and(|c| c.instrument.is_inverse) {
        ContractKind::Inverse
    } else {
        ContractKind::Linear
    };

    let stats = PerformanceStats::from_history_file(&path, kind)
        .with_context(|| format!("failed to read history {}", path.display()))?;
    if stats.trade_count() == 0 {
        warn!("no completed trades in {}", path.display());
    }
    let report = StatsReport::new(stats);

    if let Some(dir) = output_dir {
        save_report(&report, &dir)?;
        println!("Saved to {}", dir.display());
    }
    let summary = serde_json::json!({
        "history": path.display().to_string(),
        "kind": report.stats.kind,
        "tradeCount": report.trade_count,
        "totalResult": report.total_result,
        "startEquity": report.stats.start_equity,
        "latest": report.latest,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// An explicit `--history` wins; otherwise the history of the configured instance.
fn resolve_history_path(history: Option<PathBuf>, config: Option<&BotConfig>) -> Result<PathBuf> {
    if let Some(path) = history {
        return Ok(path);
    }
    let Some(config) = config else {
        bail!("either --history or --config is required");
    };
    match config.bot_storage() {
        Some(storage) => Ok(storage.history_path()),
        None => bail!("config has no storage.instance_id, pass --history"),
    }
}

fn run_check_config(config_path: &Path) -> Result<()> {
    let config = load(config_path)?;
    let strategy = ChannelStrategy::from_config(&config);

    println!("Config OK: {}", config_path.display());
    println!(
        "  instrument: {} (tick {}, {})",
        config.instrument.symbol,
        config.instrument.tick_size,
        if config.instrument.is_inverse { "inverse" } else { "linear" }
    );
    match config.bot_storage() {
        Some(storage) => println!("  storage:    {}", storage.snapshot_path().display()),
        None => println!("  storage:    none (no instance_id)"),
    }
    println!(
        "  strategy:   {} on {}, needs {} bars",
        strategy.name(),
        strategy.signal().name(),
        strategy.min_bars_needed()
    );
    Ok(())
}
