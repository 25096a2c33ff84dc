//! cardiofit - Main Entry Point
//!
//! Trains the heart-disease pipeline and writes its artifacts.

use clap::Parser;
use cardiofit::cli::{Cli, Commands, TrainArgs, cmd_train, cmd_predict, cmd_inspect};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardiofit=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train(args)) => {
            cmd_train(&args)?;
        }
        Some(Commands::Predict { checkpoint, data }) => {
            cmd_predict(&checkpoint, &data)?;
        }
        Some(Commands::Inspect { graph }) => {
            cmd_inspect(&graph)?;
        }
        None => {
            // Default: train on ./heart.csv with default settings
            cmd_train(&TrainArgs::default())?;
        }
    }

    Ok(())
}
