//! Steward CLI: the main entry point.
//!
//! Commands:
//! - `run`    : Feed JSON-lines message events through the full pipeline
//! - `ask`    : One-shot answer for a single question
//! - `config` : Show, validate or locate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use steward_config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "steward",
    about = "Steward: answers community questions from your docs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.steward/config.toml)
    #[arg(short, long, global = true, env = "STEWARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read message events (one JSON object per line) from stdin and
    /// print every reply the bot posts
    Run {
        /// Log replies instead of posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a single question against the knowledge base
    Ask {
        question: String,

        /// Print the full result, diagnostics included, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Check the configuration for problems
    Validate,
    /// Print the default config file path
    Path,
    /// Print a config file with every default filled in
    Default,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config {
            action: ConfigAction::Path,
        } => return commands::config_cmd::path(),
        Commands::Config {
            action: ConfigAction::Default,
        } => return commands::config_cmd::print_default(),
        Commands::Config {
            action: ConfigAction::Validate,
        } => return commands::config_cmd::validate(cli.config.as_deref()),
        _ => {}
    }

    let config = commands::load_config(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Run { dry_run } => commands::run::run(config, dry_run).await?,
        Commands::Ask { question, json } => commands::ask::run(config, question, json).await?,
        Commands::Config { .. } => commands::config_cmd::show(&config)?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
