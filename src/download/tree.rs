// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Recursive remote-folder to local-tree materializer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;

use super::downloader::Downloader;
use super::progress::ProgressHandle;
use super::registry::DownloadRegistry;
use crate::remote::RemoteClient;
use crate::types::{Item, ItemKind};

/// Mirrors a remote folder into a local directory, one download per file.
///
/// Files inside a folder are fetched one after another, depth first. Each file
/// is registered in the [`DownloadRegistry`] for the duration of its download.
#[derive(Clone)]
pub struct TreeDownloader {
    remote: Arc<dyn RemoteClient>,
    downloader: Arc<dyn Downloader>,
    registry: Arc<DownloadRegistry>,
}

impl TreeDownloader {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        downloader: Arc<dyn Downloader>,
        registry: Arc<DownloadRegistry>,
    ) -> Self {
        Self {
            remote,
            downloader,
            registry,
        }
    }

    /// Download `folder` into `destination/<folder name>`.
    ///
    /// Returns `Ok(())` early, leaving the remaining siblings alone, as soon as
    /// an entry whose name is already in flight is met: that name is being
    /// handled by another task. The folder's own name does not count, since the
    /// poller registers it on admission and a wrapped single file shares it.
    pub fn download_folder<'a>(&'a self, folder: &'a Item, destination: &'a Path) -> BoxFuture<'a, Result<()>> {
        self.walk(folder, destination, &folder.name)
    }

    fn walk<'a>(&'a self, folder: &'a Item, destination: &'a Path, owner: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let items = self
                .remote
                .list_folder(&folder.id)
                .await
                .with_context(|| format!("Failed to list folder {}", folder.name))?;

            let save_dir = destination.join(&folder.name);
            tracing::trace!(path = %save_dir.display(), "creating local folder");
            if let Err(e) = tokio::fs::create_dir(&save_dir).await {
                tracing::warn!(path = %save_dir.display(), error = %e, "Could not create save path");
            }

            for item in &items {
                if item.name != owner && self.registry.exists(&item.name) {
                    tracing::trace!(name = %item.name, "already downloading, leaving folder to its owner");
                    return Ok(());
                }

                match item.kind {
                    ItemKind::File => {
                        let Some((progress, owns_entry)) = claim(&self.registry, &item.name, owner) else {
                            tracing::trace!(name = %item.name, "claimed by another walker, leaving folder to its owner");
                            return Ok(());
                        };
                        let result = self.download_file(item, &save_dir, &progress).await;
                        if owns_entry {
                            self.registry.remove(&item.name);
                        }
                        result.with_context(|| format!("Failed to download file {}", item.name))?;
                    }
                    ItemKind::Folder => {
                        self.walk(item, &save_dir, owner)
                            .await
                            .with_context(|| format!("Failed to download folder {}", item.name))?;
                    }
                }
            }

            Ok(())
        })
    }

    async fn download_file(&self, item: &Item, save_dir: &Path, progress: &ProgressHandle) -> Result<()> {
        // A failed link still goes to the downloader, which rejects it
        let link = match self.remote.generate_file_link(&item.id).await {
            Ok(link) => link,
            Err(e) => {
                tracing::debug!(name = %item.name, error = %e, "File link generation failed");
                String::new()
            }
        };

        let file_path: PathBuf = save_dir.join(&item.name);
        tracing::trace!(path = %file_path.display(), "downloading");
        self.downloader.download_file(&link, &file_path, progress).await
    }
}

/// Take the registry entry for a file about to be downloaded.
///
/// A file named like its admitted folder reports through the folder's entry and
/// does not own it. Any other name is registered atomically; `None` means
/// another walker already holds it. The flag is true when the caller must
/// remove the entry afterwards.
fn claim(registry: &DownloadRegistry, name: &str, owner: &str) -> Option<(Arc<ProgressHandle>, bool)> {
    if name == owner {
        if let Some(progress) = registry.progress(owner) {
            return Some((progress, false));
        }
    }
    registry.try_add(name).map(|progress| (progress, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_refuses_name_held_elsewhere() {
        let registry = DownloadRegistry::new();
        let held = registry.add("shared.mkv");

        assert!(claim(&registry, "shared.mkv", "Season 1").is_none());
        // The holder's entry is left as it was
        let current = registry.progress("shared.mkv").unwrap();
        assert!(Arc::ptr_eq(&held, &current));
    }

    #[test]
    fn test_claim_registers_free_name() {
        let registry = DownloadRegistry::new();
        let (_, owns_entry) = claim(&registry, "ep1.mkv", "Season 1").unwrap();
        assert!(owns_entry);
        assert!(registry.exists("ep1.mkv"));
        assert!(claim(&registry, "ep1.mkv", "Season 1").is_none());
    }

    #[test]
    fn test_claim_shares_admitted_folder_entry() {
        let registry = DownloadRegistry::new();
        let folder = registry.add("movie.mkv");

        let (progress, owns_entry) = claim(&registry, "movie.mkv", "movie.mkv").unwrap();
        assert!(!owns_entry);
        assert!(Arc::ptr_eq(&folder, &progress));
        assert_eq!(registry.count(), 1);
    }
}
