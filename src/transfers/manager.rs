// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transfer poller and the status surface built on top of it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::reconcile::reconcile_errors;
use crate::arr::ArrClient;
use crate::config::{Config, ConfigError};
use crate::download::{DownloadDetails, DownloadRegistry, DownloadView, Downloader, TreeDownloader};
use crate::locks::{resilient_read, resilient_write};
use crate::remote::{resolve_downloads_folder, RemoteClient};
use crate::types::{Item, ItemKind, Transfer};

/// Settings the poller needs, derived from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSettings {
    /// Admission cap for top-level items
    pub simultaneous_downloads: usize,
    /// Local root finished items are mirrored into
    pub downloads_directory: PathBuf,
    /// Pause between ticks
    pub poll_interval: Duration,
}

impl ManagerSettings {
    /// Validate the config and derive poller settings.
    ///
    /// A missing downloads directory is created; failing to do so is only logged.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        let downloads_directory = config.downloads_base_location()?;
        if !downloads_directory.exists() {
            if let Err(e) = std::fs::create_dir_all(&downloads_directory) {
                tracing::warn!(path = %downloads_directory.display(), error = %e, "Could not create downloads directory");
            }
        }

        Ok(Self {
            simultaneous_downloads: config.simultaneous_downloads,
            downloads_directory,
            poll_interval: config.poll_interval(),
        })
    }
}

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling after the current tick and wait for the loop to exit.
    ///
    /// Downloads already spawned keep running.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "poll loop panicked");
        }
    }
}

/// Polls the remote service and admits finished items for local download.
///
/// Each tick refreshes the transfer list, reconciles errored transfers with
/// the Arr clients, then scans the remote downloads folder and admits items
/// while the registry holds fewer than `simultaneous_downloads` entries.
pub struct TransferManager {
    remote: Arc<dyn RemoteClient>,
    arrs: Vec<Arc<dyn ArrClient>>,
    registry: Arc<DownloadRegistry>,
    tree: TreeDownloader,
    settings: ManagerSettings,
    transfers: RwLock<Vec<Transfer>>,
    status: RwLock<String>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
    downloads_folder_id: RwLock<Option<String>>,
    polling: AtomicBool,
}

impl TransferManager {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        arrs: Vec<Arc<dyn ArrClient>>,
        downloader: Arc<dyn Downloader>,
        settings: ManagerSettings,
    ) -> Self {
        let registry = Arc::new(DownloadRegistry::new());
        let tree = TreeDownloader::new(Arc::clone(&remote), downloader, Arc::clone(&registry));
        Self {
            remote,
            arrs,
            registry,
            tree,
            settings,
            transfers: RwLock::new(Vec::new()),
            status: RwLock::new(String::new()),
            last_updated: RwLock::new(None),
            downloads_folder_id: RwLock::new(None),
            polling: AtomicBool::new(false),
        }
    }

    /// Start the poll loop on a background task.
    pub fn start(self: &Arc<Self>) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let join = tokio::spawn(async move {
            manager.run(shutdown_rx).await;
        });
        PollerHandle { shutdown_tx, join }
    }

    /// Tick, sleep `poll_interval`, repeat until `shutdown` turns true or closes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            cap = self.settings.simultaneous_downloads,
            "Transfer poller started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Transfer poller stopped");
    }

    /// Run one poll cycle. Never fails; problems are logged and retried next tick.
    pub async fn tick(&self) {
        self.polling.store(true, Ordering::SeqCst);
        match self.poll_once().await {
            Ok(()) => self.set_status(String::new()),
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "Poll cycle aborted");
                self.set_status(format!("{:#}", e));
            }
        }
        self.polling.store(false, Ordering::SeqCst);
        *resilient_write(&self.last_updated) = Some(Utc::now());
    }

    async fn poll_once(&self) -> Result<()> {
        tracing::debug!("Running task UpdateTransfersList");
        let transfers = self.remote.get_transfers().await.context("Error getting transfers")?;
        *resilient_write(&self.transfers) = transfers.clone();

        reconcile_errors(&transfers, &self.arrs, &self.remote).await;

        // Only the scan depends on the downloads folder
        let folder_id = self.downloads_folder_id().await?;

        tracing::debug!("Running task CheckDownloadsFolder");
        self.check_downloads_folder(&folder_id).await
    }

    async fn downloads_folder_id(&self) -> Result<String> {
        let cached = resilient_read(&self.downloads_folder_id).clone();
        if let Some(id) = cached {
            return Ok(id);
        }
        let id = resolve_downloads_folder(self.remote.as_ref()).await?;
        *resilient_write(&self.downloads_folder_id) = Some(id.clone());
        Ok(id)
    }

    async fn check_downloads_folder(&self, folder_id: &str) -> Result<()> {
        let items = self
            .remote
            .list_folder(folder_id)
            .await
            .context("Error listing downloads folder")?;

        for item in items {
            let running = self.registry.count();
            if running >= self.settings.simultaneous_downloads {
                tracing::debug!(
                    running,
                    cap = self.settings.simultaneous_downloads,
                    "Not processing any more transfers, cap reached"
                );
                break;
            }

            tracing::debug!(name = %item.name, "Processing completed item");
            self.handle_finished_item(item, folder_id).await;
        }

        Ok(())
    }

    async fn handle_finished_item(&self, item: Item, downloads_folder_id: &str) {
        if self.registry.exists(&item.name) {
            tracing::trace!(name = %item.name, "Transfer is already downloading");
            return;
        }

        match item.kind {
            ItemKind::File => self.wrap_single_file(&item, downloads_folder_id).await,
            ItemKind::Folder => self.admit_folder(item),
        }
    }

    /// Loose files are moved into a folder of their own and picked up as a
    /// folder on the next tick.
    async fn wrap_single_file(&self, item: &Item, downloads_folder_id: &str) {
        tracing::trace!(name = %item.name, "Wrapping single file in a folder");

        let folder_id = match self.remote.create_folder(&item.name, downloads_folder_id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(name = %item.name, error = %format!("{:#}", e), "Error creating folder for single file");
                return;
            }
        };

        if let Err(e) = self.remote.move_item(&item.id, &folder_id).await {
            tracing::error!(name = %item.name, error = %format!("{:#}", e), "Error moving single file into its folder");
        }
    }

    fn admit_folder(&self, item: Item) {
        if self.registry.try_add(&item.name).is_none() {
            tracing::trace!(name = %item.name, "Transfer is already downloading");
            return;
        }

        tracing::info!(name = %item.name, "Downloading finished transfer");
        let tree = self.tree.clone();
        let remote = Arc::clone(&self.remote);
        let registry = Arc::clone(&self.registry);
        let destination = self.settings.downloads_directory.clone();

        tokio::spawn(async move {
            match tree.download_folder(&item, &destination).await {
                Ok(()) => match remote.delete_folder(&item.id).await {
                    Ok(()) => tracing::info!(name = %item.name, "Finished downloading transfer"),
                    Err(e) => tracing::error!(
                        name = %item.name,
                        error = %format!("{:#}", e),
                        "Error deleting remote folder"
                    ),
                },
                Err(e) => tracing::error!(
                    name = %item.name,
                    error = %format!("{:#}", e),
                    "Error downloading item"
                ),
            }
            registry.remove(&item.name);
        });
    }

    fn set_status(&self, status: String) {
        *resilient_write(&self.status) = status;
    }

    /// Transfer list from the most recent successful refresh.
    pub fn transfers(&self) -> Vec<Transfer> {
        resilient_read(&self.transfers).clone()
    }

    /// Point-in-time copy of the in-flight downloads.
    pub fn downloads(&self) -> HashMap<String, DownloadDetails> {
        self.registry.snapshot()
    }

    /// In-flight downloads as sorted views for reporting.
    pub fn download_views(&self) -> Vec<DownloadView> {
        self.registry.views()
    }

    /// Empty when the last tick succeeded, otherwise what went wrong.
    pub fn status(&self) -> String {
        resilient_read(&self.status).clone()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *resilient_read(&self.last_updated)
    }

    /// True while a tick is running.
    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &Arc<DownloadRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }
}
