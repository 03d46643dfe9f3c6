// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging setup.

use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing::Level;

/// Log file written when a logging directory is configured.
pub const LOG_FILE_NAME: &str = "transferd.log";

/// Parse a level name such as `info`, `debug` or `trace`.
pub fn parse_level(level: &str) -> Result<Level> {
    Level::from_str(level.trim()).map_err(|_| anyhow!("Unknown log level: {}", level))
}

/// Install the global tracing subscriber.
///
/// Logs go to `<logging_dir>/transferd.log` when a directory is given,
/// otherwise to stderr.
pub fn init_logging(level: &str, logging_dir: Option<&Path>) -> Result<()> {
    let level = parse_level(level)?;
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    match logging_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create logging directory: {:?}", dir))?;
            let path = dir.join(LOG_FILE_NAME);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!("Failed to install logger: {}", e))?;
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow!("Failed to install logger: {}", e))?;
        }
    }

    Ok(())
}
