//! SRL CLI - Command line interface for the safe-RL core
//!
//! Drives penalty controllers over recorded cost traces, runs synthetic
//! rollouts through the virtual environment and manages configuration.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use srl_core::Config;

mod commands;

use commands::{algorithms, config, control, rollout};

#[derive(Parser)]
#[command(name = "srl")]
#[command(author, version, about = "SRL - safe reinforcement learning toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to SRL_CONFIG, ./srl.toml, ~/.config/srl/srl.toml)
    #[arg(short, long, global = true, env = "SRL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured penalty controller over a cost trace
    Control(control::ControlArgs),

    /// Roll out a synthetic ensemble through the virtual environment
    Rollout(rollout::RolloutArgs),

    /// List registered algorithms
    Algorithms,

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

/// Filter for the workspace crates at `level`
fn crate_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("srl={level},srl_core={level},srl_rl={level}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG and --verbose pin the level; otherwise the config file may change it
    let env_filter = EnvFilter::try_from_default_env().ok();
    let pinned = cli.verbose || env_filter.is_some();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let initial = env_filter.unwrap_or_else(|| crate_filter(default_level));
    let (filter, filter_handle) = reload::Layer::new(initial);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // `config init` must work even when the current file is broken
    let loaded = match &cli.command {
        Commands::Config(config::ConfigCommands::Init { .. }) => None,
        _ => Some(match &cli.config {
            Some(path) => Config::load_from(Some(path.as_path()))?,
            None => Config::load()?,
        }),
    };

    if let Some(cfg) = loaded.as_ref().filter(|_| !pinned) {
        filter_handle
            .reload(crate_filter(&cfg.run.log_level))
            .context("Failed to apply configured log level")?;
    }

    let cfg = loaded.unwrap_or_default();
    match cli.command {
        Commands::Control(args) => control::run(&args, &cfg),
        Commands::Rollout(args) => rollout::run(&args, &cfg),
        Commands::Algorithms => algorithms::run(),
        Commands::Config(cmd) => config::run(cmd, &cfg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_filter_covers_config_loading() {
        let filter = crate_filter("debug").to_string();
        for target in ["srl=debug", "srl_core=debug", "srl_rl=debug"] {
            assert!(filter.contains(target), "{filter} lacks {target}");
        }
    }
}
