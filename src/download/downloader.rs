// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Byte transfer from a direct link to a local file.
//!
//! The engine only talks to the [`Downloader`] trait. [`WgetDownloader`] is the
//! shipped implementation: it drives a `wget` subprocess and feeds the
//! progress it prints into the download's [`ProgressHandle`].

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::progress::ProgressHandle;

/// Program invoked by [`WgetDownloader::new`].
const DEFAULT_WGET_PROGRAM: &str = "wget";

/// Matches the leading offset of a `--progress=dot:mega` line, e.g. "  3072K ........".
static WGET_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)K\s").expect("wget offset regex"));

/// Transfers the bytes behind a URL into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `local_path`, reporting into `progress`.
    ///
    /// Resolves only when the transfer has finished or failed.
    async fn download_file(&self, url: &str, local_path: &Path, progress: &ProgressHandle) -> Result<()>;
}

/// Downloader backed by a `wget` subprocess.
#[derive(Debug, Clone)]
pub struct WgetDownloader {
    program: String,
}

impl WgetDownloader {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_WGET_PROGRAM)
    }

    /// Use a different executable (a full path, or a wget-compatible wrapper).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check that the program can be executed at all.
    pub async fn check_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !status.success() {
            bail!("{} --version exited with {}", self.program, status);
        }
        Ok(())
    }
}

impl Default for WgetDownloader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the byte offset out of a wget dot-progress line.
pub fn parse_progress_line(line: &str) -> Option<u64> {
    let caps = WGET_OFFSET.captures(line)?;
    let kib: u64 = caps.get(1)?.as_str().parse().ok()?;
    kib.checked_mul(1024)
}

#[async_trait]
impl Downloader for WgetDownloader {
    async fn download_file(&self, url: &str, local_path: &Path, progress: &ProgressHandle) -> Result<()> {
        if url.is_empty() {
            bail!("No download link for {}", local_path.display());
        }

        let mut child = Command::new(&self.program)
            .arg("-c")
            .arg("--progress=dot:mega")
            .arg("-O")
            .arg(local_path)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program))?;

        // wget writes its progress to stderr
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await.context("Failed to read wget output")? {
                if let Some(bytes) = parse_progress_line(&line) {
                    progress.set_completed(bytes);
                    tracing::trace!(
                        path = %local_path.display(),
                        progress = %progress.progress(),
                        speed = %progress.speed(),
                        "download progress"
                    );
                }
            }
        }

        let status = child.wait().await.context("Failed to wait for wget")?;
        if !status.success() {
            bail!("wget exited with {} for {}", status, local_path.display());
        }

        if let Ok(meta) = tokio::fs::metadata(local_path).await {
            progress.set_completed(meta.len());
        }
        tracing::debug!(path = %local_path.display(), "download completed");
        Ok(())
    }
}
