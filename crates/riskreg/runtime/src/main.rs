//! riskreg: score a register snapshot from the command line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use riskreg_runtime::{init_tracing, RegisterConfig, RiskRegister};
use riskreg_scoring::{AppetiteStatus, RowScore};
use riskreg_storage::Snapshot;
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "riskreg")]
#[command(about = "Risk register scoring and review core")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "RISKREG_CONFIG")]
    config: Option<String>,

    /// Log level (overrides config)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a snapshot and print every row's gross and net score
    Scores {
        /// Snapshot JSON file (rows, hubControls, links)
        #[arg(long)]
        seed: PathBuf,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreLine<'a> {
    #[serde(flatten)]
    score: &'a RowScore,
    appetite_status: AppetiteStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RegisterConfig::load(cli.config.as_deref()).context("failed to load config")?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, cli.json || config.logging.json)?;

    match cli.command {
        Command::Scores { seed } => {
            let raw = tokio::fs::read_to_string(&seed)
                .await
                .with_context(|| format!("failed to read {}", seed.display()))?;
            let snapshot: Snapshot = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a register snapshot", seed.display()))?;

            let register = RiskRegister::from_config(&config).await?;
            register.seed(snapshot).await?;

            let scores = register.scores().await?;
            info!(rows = scores.len(), "Scores computed");
            let lines: Vec<ScoreLine<'_>> = scores
                .iter()
                .map(|score| ScoreLine {
                    score,
                    appetite_status: score.appetite_status(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&lines)?);
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
