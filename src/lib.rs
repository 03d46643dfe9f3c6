// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! transferd - finished cloud transfers, landed on local disk
//!
//! Polls a cloud file-processing service for completed transfers, mirrors
//! their folders to a local directory, and hands failed transfers to the Arr
//! services (Sonarr, Radarr, ...) that requested them.
//!
//! **Poll** -> **Reconcile errors** -> **Admit finished items** -> **Download tree**
//!
//! # Core Modules
//!
//! - [`transfers`] - Poll loop, admission control, error reconciliation, status surface
//! - [`download`] - In-flight registry, progress tracking, tree walker, wget downloader
//! - [`remote`] - Cloud service capability trait
//! - [`arr`] - Arr collaborator capability trait
//! - [`config`] - On-disk configuration
//! - [`telemetry`] - Logging setup

pub mod arr;
pub mod config;
pub mod download;
pub mod locks;
pub mod remote;
pub mod telemetry;
pub mod transfers;
pub mod types;
pub mod utils;

pub use types::{Item, ItemKind, Transfer, TransferStatus};

pub use arr::ArrClient;
pub use remote::RemoteClient;

pub use config::{ArrConfig, ArrKind, Config, ConfigError};

pub use download::{
    DownloadDetails, DownloadRegistry, DownloadView, Downloader, ProgressHandle, TreeDownloader,
    WgetDownloader,
};

pub use transfers::{ManagerSettings, PollerHandle, TransferManager};

pub use utils::mask_sensitive;
