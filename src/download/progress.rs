// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Progress tracking for a single in-flight download.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::utils::format_bytes;

/// Byte counter shared between a downloader and the reporting layer.
///
/// The downloader writes, everyone else reads. Counters are atomics so a
/// handle can be read from the status surface while a subprocess is still
/// feeding it.
#[derive(Debug)]
pub struct ProgressHandle {
    started: Instant,
    total: AtomicU64,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total: AtomicU64::new(0),
        }
    }

    /// Record that `bytes` more bytes have been written.
    pub fn add_bytes(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Overwrite the completed byte count (for downloaders that report totals).
    pub fn set_completed(&self, bytes: u64) {
        self.total.store(bytes, Ordering::Relaxed);
    }

    pub fn completed_bytes(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Average speed since the handle was created, in bytes per second.
    ///
    /// Reports zero during the first second.
    pub fn speed_bps(&self) -> u64 {
        let elapsed = self.started.elapsed().as_secs();
        if elapsed == 0 {
            return 0;
        }
        self.completed_bytes() / elapsed
    }

    /// Human-readable completion, e.g. "12.5 MB complete".
    pub fn progress(&self) -> String {
        format!("{} complete", format_bytes(self.completed_bytes()))
    }

    /// Human-readable speed, e.g. "1.2 MB/s".
    pub fn speed(&self) -> String {
        format!("{}/s", format_bytes(self.speed_bps()))
    }
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}
