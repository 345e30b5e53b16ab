//! worldsnap - consistent snapshot backups of live world directories
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use worldsnap::cli::args::{ConfigAction, ConfigArgs};
use worldsnap::cli::{Cli, Commands};
use worldsnap::config::{Config, ConfigManager};
use worldsnap::error::WorldsnapResult;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> WorldsnapResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await;

    // Logging comes up before a config error is reported, in the default format
    let json = config
        .as_ref()
        .is_ok_and(|c| c.general.log_format.eq_ignore_ascii_case("json"));
    init_tracing(cli.verbose, json);

    // Path and init still work when the existing file is broken
    let config = match (&cli.command, config) {
        (
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Path | ConfigAction::Init { .. }),
            }),
            Err(e),
        ) => {
            warn!("Ignoring unreadable config: {}", e);
            Config::default()
        }
        (_, config) => config?,
    };
    debug!("Loaded configuration from {}", config_manager.path().display());

    match cli.command {
        Commands::Backup(args) => worldsnap::cli::commands::backup(args, &config).await,
        Commands::Cache(args) => worldsnap::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            worldsnap::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("worldsnap=warn"),
        1 => EnvFilter::new("worldsnap=info"),
        _ => EnvFilter::new("worldsnap=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
