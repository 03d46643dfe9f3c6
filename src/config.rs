// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! On-disk configuration.
//!
//! Stored as `config.json` in the config directory. Fields missing from an
//! older file are filled with defaults and the file is re-saved, so upgrades
//! never require hand-editing.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::utils::{is_directory_writeable, is_running_in_container};

/// File name of the configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Downloads directory used inside a container when none is configured.
const CONTAINER_DOWNLOADS_DIR: &str = "/downloads";

/// Default timeout for acquiring the config lock (5 seconds)
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry interval when waiting for lock acquisition
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Fields that older config files may lack.
const TRACKED_FIELDS: [&str; 3] = [
    "simultaneous_downloads",
    "transfer_poll_interval_seconds",
    "arr_history_update_interval_seconds",
];

/// Errors callers need to tell apart when loading or validating config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    Unreadable(String),
    /// The config file is not valid JSON for [`Config`].
    Invalid(String),
    /// Writing the config back to disk failed.
    SaveFailed(String),
    /// The downloads directory points at a filesystem root.
    DownloadDirectoryIsRoot,
    /// The downloads directory is missing or not writeable.
    DownloadDirectoryNotWriteable(PathBuf),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(msg) => write!(f, "Failed to read config file: {}", msg),
            Self::Invalid(msg) => write!(f, "Invalid config file: {}", msg),
            Self::SaveFailed(msg) => write!(f, "Failed to save config file: {}", msg),
            Self::DownloadDirectoryIsRoot => {
                write!(f, "Download directory set to root, please set a directory")
            }
            Self::DownloadDirectoryNotWriteable(path) => {
                write!(f, "Download directory not writeable: {}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which Arr flavour a collaborator speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrKind {
    Sonarr,
    Radarr,
}

/// Connection details for one Arr collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
    #[serde(rename = "type")]
    pub kind: ArrKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API key for the remote cloud service
    #[serde(default = "default_remote_api_key")]
    pub remote_api_key: String,
    /// Arr collaborators, checked in this order during error reconciliation
    #[serde(default)]
    pub arrs: Vec<ArrConfig>,
    /// Local directory finished transfers are mirrored into (blank = temp dir)
    #[serde(default)]
    pub downloads_directory: String,
    /// Admission cap for concurrently downloading top-level items
    #[serde(default = "default_simultaneous_downloads")]
    pub simultaneous_downloads: usize,
    /// Seconds between transfer poller ticks
    #[serde(default = "default_transfer_poll_interval_seconds")]
    pub transfer_poll_interval_seconds: u64,
    /// Seconds between Arr history refreshes (used by Arr clients)
    #[serde(default = "default_arr_history_update_interval_seconds")]
    pub arr_history_update_interval_seconds: u64,
    #[serde(skip)]
    config_dir: PathBuf,
}

fn default_remote_api_key() -> String {
    "xxxxxxxxx".to_string()
}

fn default_simultaneous_downloads() -> usize {
    5
}

fn default_transfer_poll_interval_seconds() -> u64 {
    30
}

fn default_arr_history_update_interval_seconds() -> u64 {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_api_key: default_remote_api_key(),
            arrs: vec![
                ArrConfig {
                    name: "Sonarr".to_string(),
                    url: "http://127.0.0.1:8989".to_string(),
                    api_key: "xxxxxxxxx".to_string(),
                    kind: ArrKind::Sonarr,
                },
                ArrConfig {
                    name: "Radarr".to_string(),
                    url: "http://127.0.0.1:7878".to_string(),
                    api_key: "xxxxxxxxx".to_string(),
                    kind: ArrKind::Radarr,
                },
            ],
            downloads_directory: String::new(),
            simultaneous_downloads: default_simultaneous_downloads(),
            transfer_poll_interval_seconds: default_transfer_poll_interval_seconds(),
            arr_history_update_interval_seconds: default_arr_history_update_interval_seconds(),
            config_dir: PathBuf::new(),
        }
    }
}

/// Default config directory: `~/.transferd`, or the working directory without a home.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".transferd"))
        .unwrap_or_else(|| PathBuf::from("./"))
}

impl Config {
    /// Load the config from `config_dir`, creating a default one if none exists.
    pub fn load_or_create(config_dir: &Path) -> std::result::Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        tracing::trace!(path = %path.display(), "reading config");

        let (mut config, mut updated) = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
            Self::parse(&content)?
        } else {
            tracing::warn!(path = %path.display(), "No config file found, creating default config file");
            (Config::default(), true)
        };
        config.config_dir = config_dir.to_path_buf();

        if config.downloads_directory.is_empty() && is_running_in_container() {
            tracing::trace!("Running in a container, using {} for downloads", CONTAINER_DOWNLOADS_DIR);
            config.downloads_directory = CONTAINER_DOWNLOADS_DIR.to_string();
            updated = true;
        }

        if updated {
            config
                .save()
                .map_err(|e| ConfigError::SaveFailed(format!("{:#}", e)))?;
        }

        Ok(config)
    }

    /// Parse config JSON. The flag is true when fields had to be defaulted.
    fn parse(content: &str) -> std::result::Result<(Self, bool), ConfigError> {
        let raw: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let Some(object) = raw.as_object() else {
            return Err(ConfigError::Invalid("expected a JSON object".to_string()));
        };

        let mut updated = false;
        for field in TRACKED_FIELDS {
            if !object.contains_key(field) {
                tracing::info!(field, "Config field not set, using default");
                updated = true;
            }
        }

        let config: Config = serde_json::from_value(raw).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok((config, updated))
    }

    /// Directory the config was loaded from.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Save the config with an atomic rename under an exclusive lock file.
    pub fn save(&self) -> Result<()> {
        let path = self.config_path();
        let lock_path = path.with_extension("lock");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }

        let _lock_guard = acquire_exclusive_lock_with_timeout(&lock_path, LOCK_TIMEOUT)?;

        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
            temp_file
                .write_all(content.as_bytes())
                .context("Failed to write to temp file")?;
            temp_file.sync_all().context("Failed to sync temp file to disk")?;
        }

        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to rename temp file to config file: {:?} -> {:?}", temp_path, path))?;

        tracing::trace!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Validated local directory downloads are written into.
    pub fn downloads_base_location(&self) -> std::result::Result<PathBuf, ConfigError> {
        let dir = self.downloads_directory.as_str();
        if dir.is_empty() {
            let fallback = std::env::temp_dir().join("transferd");
            tracing::trace!(path = %fallback.display(), "Download directory not set, using default");
            return Ok(fallback);
        }

        if matches!(dir, "/" | "\\" | "C:\\") {
            tracing::error!("Download directory set to root, please set a directory");
            return Err(ConfigError::DownloadDirectoryIsRoot);
        }

        let path = PathBuf::from(dir);
        if !is_directory_writeable(&path) {
            tracing::error!(path = %path.display(), "Download directory not writeable");
            return Err(ConfigError::DownloadDirectoryNotWriteable(path));
        }

        Ok(path)
    }

    /// Interval between poller ticks.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.transfer_poll_interval_seconds.max(1))
    }
}

fn acquire_exclusive_lock_with_timeout(path: &Path, timeout: Duration) -> Result<File> {
    let lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file: {:?}", path))?;

    let start = Instant::now();
    loop {
        match lock_file.try_lock_exclusive() {
            Ok(()) => return Ok(lock_file),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if start.elapsed() >= timeout {
                    bail!(
                        "Timed out waiting for exclusive lock on {:?} after {:?}. \
                         Another instance may be writing the config.",
                        path,
                        timeout
                    );
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to acquire exclusive lock on {:?}", path));
            }
        }
    }
}
