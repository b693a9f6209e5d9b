use std::path::{Path, PathBuf};

use anyhow::Context;
use chain_dqn::checkpoint::{CheckpointManager, CheckpointManagerConfig};
use chain_dqn::config::AppConfig;
use chain_dqn::device::{select_device, wgpu_probe};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::prelude::*;

/// Operator tools for DQN training runs.
#[derive(Debug, Parser)]
#[command(name = "chain-dqn", version)]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect configuration files.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Inspect saved checkpoints.
    #[command(subcommand)]
    Checkpoints(CheckpointCommand),

    /// Pick a compute device from the configured preferences.
    Device {
        /// Config file; defaults apply when absent.
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the default configuration as TOML.
    Default,
    /// Parse and validate a configuration file.
    Check { path: PathBuf },
}

#[derive(Debug, Subcommand)]
enum CheckpointCommand {
    /// List checkpoints in a directory.
    List { dir: PathBuf },
    /// Print metadata of one checkpoint, or of the latest in a directory.
    Show { dir: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .init();

    match cli.command {
        Command::Config(ConfigCommand::Default) => {
            print!("{}", AppConfig::default_toml().context("serializing default config")?);
        }
        Command::Config(ConfigCommand::Check { path }) => {
            AppConfig::load(&path)
                .with_context(|| format!("checking {}", path.display()))?;
            println!("{}: ok", path.display());
        }
        Command::Checkpoints(CheckpointCommand::List { dir }) => list_checkpoints(&dir)?,
        Command::Checkpoints(CheckpointCommand::Show { dir }) => show_checkpoint(&dir)?,
        Command::Device { config } => {
            let config = AppConfig::load_or_default(&config)?;
            let kind = select_device(&config.device.preferences, wgpu_probe);
            println!("{kind}");
        }
    }
    Ok(())
}

fn manager_for(dir: &Path) -> CheckpointManager {
    CheckpointManager::new(CheckpointManagerConfig {
        checkpoint_dir: dir.to_path_buf(),
        ..Default::default()
    })
}

fn list_checkpoints(dir: &Path) -> anyhow::Result<()> {
    let checkpoints = manager_for(dir)
        .list_checkpoints()
        .with_context(|| format!("listing {}", dir.display()))?;
    if checkpoints.is_empty() {
        println!("no checkpoints in {}", dir.display());
        return Ok(());
    }
    println!(
        "{:>12}  {:>10}  {:>10}  {:>8}  path",
        "tick", "loss", "reward", "epsilon"
    );
    for (path, meta) in checkpoints {
        println!(
            "{:>12}  {:>10.4}  {:>10.3}  {:>8.3}  {}",
            meta.tick,
            meta.metrics.average_loss,
            meta.metrics.average_reward,
            meta.metrics.epsilon,
            path.display()
        );
    }
    Ok(())
}

fn show_checkpoint(dir: &Path) -> anyhow::Result<()> {
    let loaded = if dir.join("metadata.json").exists() {
        let parent = dir.parent().unwrap_or(dir);
        manager_for(parent).load(dir)
    } else {
        manager_for(dir).load_latest()
    };
    let data = loaded.with_context(|| format!("loading checkpoint from {}", dir.display()))?;

    println!("path: {}", data.path.display());
    println!("{}", serde_json::to_string_pretty(&data.metadata)?);
    println!("training state: {}", data.training_state_json.trim());
    Ok(())
}
