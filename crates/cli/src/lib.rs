pub mod catalog;
pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use haggle_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "haggle",
    about = "Cart price negotiation over an LLM agent",
    long_about = "Negotiate a discount on a demo cart with an automated pricing agent. \
                  Only the agent's structured finalize action can commit a discount, and \
                  every proposed price is re-validated against the pricing floor.",
    after_help = "Examples:\n  haggle negotiate\n  haggle cart\n  haggle doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to haggle.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Open an interactive negotiation over the demo cart")]
    Negotiate,
    #[command(about = "Show the demo cart, its total, and the derived negotiation floor")]
    Cart,
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Validate configuration and agent gateway readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn init_logging(config: &AppConfig) {
    use haggle_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(LoadOptions {
        config_path: cli.config.clone(),
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);

    let result = match cli.command {
        Command::Negotiate => commands::negotiate::run(&config).await,
        Command::Cart => {
            println!("{}", commands::cart::run(&config));
            Ok(())
        }
        Command::Config => {
            println!("{}", commands::config::run(&config));
            Ok(())
        }
        Command::Doctor { json } => {
            println!("{}", commands::doctor::run(&config, json));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
