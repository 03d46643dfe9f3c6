// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for transferd.

use std::fs;
use std::path::Path;

/// Mask a sensitive string (like API keys) for display.
///
/// Shows only the first `visible_prefix` characters and replaces the rest with "...".
///
/// # Examples
///
/// ```
/// use transferd::utils::mask_sensitive;
///
/// let masked = mask_sensitive("abcdefghijklmnop", 4);
/// assert_eq!(masked, "abcd...");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    if input.len() <= visible_prefix {
        // Still mask short values so the length doesn't leak
        return format!("{}...", input);
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}...", prefix)
}

/// Format a byte count as a human-readable size in SI units (1 kB = 1000 B).
///
/// One decimal below 10 of a unit, none above: "2.0 kB", "83 MB".
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

    if bytes < 10 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let rounded = (value * 10.0 + 0.5).floor() / 10.0;
    if rounded < 10.0 {
        format!("{:.1} {}", rounded, UNITS[unit])
    } else {
        format!("{:.0} {}", rounded, UNITS[unit])
    }
}

/// Check whether a directory exists and a file can be created inside it.
pub fn is_directory_writeable(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let probe = dir.join(format!(".transferd-write-test-{}", std::process::id()));
    match fs::write(&probe, b"") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Returns true when running inside a Docker container.
pub fn is_running_in_container() -> bool {
    Path::new("/.dockerenv").exists()
}
