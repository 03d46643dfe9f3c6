// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Local download side of transferd.
//!
//! This module turns finished remote folders into local directory trees:
//! - An in-flight registry keyed by item name, the only shared mutable state
//! - Per-download progress counters readable while the transfer runs
//! - A recursive walker that mirrors remote folders file by file
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ TreeDownloader  │────▶│ Downloader      │
//! │ (depth first)   │     │ (wget process)  │
//! └────────┬────────┘     └────────┬────────┘
//!          │                       │
//!          ▼                       ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ DownloadRegistry│────▶│ ProgressHandle  │
//! │ (name -> entry) │     │ (atomic bytes)  │
//! └─────────────────┘     └─────────────────┘
//! ```

pub mod downloader;
pub mod progress;
pub mod registry;
pub mod tree;

// Re-export commonly used items
pub use downloader::{Downloader, WgetDownloader};
pub use progress::ProgressHandle;
pub use registry::{DownloadDetails, DownloadRegistry, DownloadView};
pub use tree::TreeDownloader;
