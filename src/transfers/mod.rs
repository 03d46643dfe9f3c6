// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transfer orchestration.
//!
//! The [`TransferManager`] owns the poll loop and the download registry. Each
//! tick runs strictly in order:
//!
//! 1. Refresh the cached transfer list (failure ends the tick)
//! 2. Reconcile errored transfers with the Arr clients
//! 3. Resolve the remote downloads folder once, then scan it and admit items up to the cap
//! 4. Record the update time
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transferd::download::WgetDownloader;
//! use transferd::remote::RemoteClient;
//! use transferd::transfers::{ManagerSettings, TransferManager};
//!
//! # async fn example(remote: Arc<dyn RemoteClient>, settings: ManagerSettings) {
//! let manager = Arc::new(TransferManager::new(
//!     remote,
//!     Vec::new(),
//!     Arc::new(WgetDownloader::new()),
//!     settings,
//! ));
//!
//! let poller = manager.start();
//! println!("{} downloads running", manager.downloads().len());
//! poller.shutdown().await;
//! # }
//! ```

pub mod manager;
pub mod reconcile;

pub use manager::{ManagerSettings, PollerHandle, TransferManager};
pub use reconcile::reconcile_errors;
