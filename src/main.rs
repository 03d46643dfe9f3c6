// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use transferd::config::{default_config_dir, Config};
use transferd::download::WgetDownloader;
use transferd::telemetry::init_logging;
use transferd::transfers::ManagerSettings;
use transferd::utils::mask_sensitive;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// Service unavailable - the downloader program is missing
    pub const SERVICE_UNAVAILABLE: i32 = 69;
    /// Configuration error - invalid or missing config
    pub const CONFIG: i32 = 78;
}

use exit_codes::*;

/// transferd - finished cloud transfers, landed on local disk.
#[derive(Parser)]
#[command(name = "transferd")]
#[command(version = VERSION)]
#[command(about = "Polls a cloud transfer service for finished items and mirrors them to local disk.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Logging level: info, debug, trace
    #[arg(long = "log", env = "TRANSFERD_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Directory config.json is located in
    #[arg(long = "config", env = "TRANSFERD_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Directory logs are written to (stderr when unset)
    #[arg(long = "logging-dir", env = "TRANSFERD_LOGGING_DIR", global = true)]
    logging_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate config, downloads directory and downloader (default)
    Check,

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the configuration with secrets masked
    Show,
    /// Print the config file location
    Path,
}

fn load_config(config_dir: &Path) -> Config {
    match Config::load_or_create(config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            std::process::exit(CONFIG);
        }
    }
}

fn show_config(config: &Config) {
    println!("{}", "=== transferd configuration ===".cyan().bold());
    println!("  Config file:            {}", config.config_path().display());
    println!("  Remote API key:         {}", mask_sensitive(&config.remote_api_key, 4));
    println!(
        "  Downloads directory:    {}",
        if config.downloads_directory.is_empty() { "(temp dir)" } else { config.downloads_directory.as_str() }
    );
    println!("  Simultaneous downloads: {}", config.simultaneous_downloads);
    println!("  Poll interval:          {}s", config.transfer_poll_interval_seconds);
    println!("  Arr history refresh:    {}s", config.arr_history_update_interval_seconds);
    for arr in &config.arrs {
        println!(
            "  Arr:                    {} ({:?}) {} key {}",
            arr.name,
            arr.kind,
            arr.url,
            mask_sensitive(&arr.api_key, 4)
        );
    }
}

async fn check(config: &Config) -> Result<()> {
    let settings = match ManagerSettings::from_config(config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "[✗]".red(), e);
            std::process::exit(CONFIG);
        }
    };
    println!(
        "{} Downloads directory: {}",
        "[✓]".green(),
        settings.downloads_directory.display()
    );
    println!(
        "{} Admission cap {} every {}s",
        "[✓]".green(),
        settings.simultaneous_downloads,
        settings.poll_interval.as_secs()
    );

    let downloader = WgetDownloader::new();
    if let Err(e) = downloader.check_available().await {
        eprintln!("{} Downloader unavailable: {:#}", "[✗]".red(), e);
        std::process::exit(SERVICE_UNAVAILABLE);
    }
    println!("{} Downloader: {}", "[✓]".green(), downloader.program());

    tracing::info!("Configuration check passed");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.logging_dir.as_deref())?;
    tracing::info!(version = VERSION, "transferd starting");

    let config_dir = cli.config_dir.unwrap_or_else(default_config_dir);

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => {
            let config = load_config(&config_dir);
            let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            runtime.block_on(check(&config))?;
        }
        Commands::Config { command: ConfigCommands::Show } => {
            let config = load_config(&config_dir);
            show_config(&config);
        }
        Commands::Config { command: ConfigCommands::Path } => {
            println!("{}", config_dir.join(transferd::config::CONFIG_FILE_NAME).display());
        }
    }

    Ok(())
}
