// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use transferd::{ArrClient, Downloader, Item, ProgressHandle, RemoteClient, Transfer};

pub const DOWNLOADS_FOLDER_ID: &str = "dl";

// =============================================================================
// REMOTE SERVICE
// =============================================================================

/// Remote service backed by a map of folder id -> listing.
#[derive(Default)]
pub struct FakeRemote {
    folders: Mutex<HashMap<String, Vec<Item>>>,
    transfers: Mutex<Vec<Transfer>>,
    broken_links: Mutex<HashSet<String>>,
    broken_listings: Mutex<HashSet<String>>,
    pub fail_transfers: AtomicBool,
    pub fail_delete: AtomicBool,
    pub deleted: Mutex<Vec<String>>,
    pub created: Mutex<Vec<(String, String)>>,
    pub moved: Mutex<Vec<(String, String)>>,
    pub list_calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl FakeRemote {
    /// Remote with a root folder holding the `downloads` folder.
    pub fn new() -> Self {
        let remote = Self::default();
        remote.set_folder("", vec![Item::folder(DOWNLOADS_FOLDER_ID, "downloads")]);
        remote.set_folder(DOWNLOADS_FOLDER_ID, vec![]);
        remote
    }

    pub fn set_folder(&self, id: &str, items: Vec<Item>) {
        self.folders.lock().unwrap().insert(id.to_string(), items);
    }

    pub fn listing(&self, id: &str) -> Vec<Item> {
        self.folders.lock().unwrap().get(id).cloned().unwrap_or_default()
    }

    pub fn set_transfers(&self, transfers: Vec<Transfer>) {
        *self.transfers.lock().unwrap() = transfers;
    }

    pub fn break_link(&self, file_id: &str) {
        self.broken_links.lock().unwrap().insert(file_id.to_string());
    }

    pub fn break_listing(&self, folder_id: &str) {
        self.broken_listings.lock().unwrap().insert(folder_id.to_string());
    }

    /// Number of times a folder was listed.
    pub fn list_count(&self, id: &str) -> usize {
        self.list_calls.lock().unwrap().iter().filter(|c| c.as_str() == id).count()
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<Item>> {
        self.list_calls.lock().unwrap().push(folder_id.to_string());
        if self.broken_listings.lock().unwrap().contains(folder_id) {
            bail!("listing of {:?} unavailable", folder_id);
        }
        self.folders
            .lock()
            .unwrap()
            .get(folder_id)
            .cloned()
            .ok_or_else(|| anyhow!("folder {} not found", folder_id))
    }

    async fn get_transfers(&self) -> Result<Vec<Transfer>> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            bail!("service unavailable");
        }
        Ok(self.transfers.lock().unwrap().clone())
    }

    async fn delete_folder(&self, folder_id: &str) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            bail!("delete refused");
        }
        let mut folders = self.folders.lock().unwrap();
        folders.remove(folder_id);
        for items in folders.values_mut() {
            items.retain(|item| item.id != folder_id);
        }
        self.deleted.lock().unwrap().push(folder_id.to_string());
        Ok(())
    }

    async fn generate_file_link(&self, file_id: &str) -> Result<String> {
        if self.broken_links.lock().unwrap().contains(file_id) {
            bail!("link generation failed for {}", file_id);
        }
        Ok(format!("https://cdn.example/{}", file_id))
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut folders = self.folders.lock().unwrap();
        folders.insert(id.clone(), vec![]);
        folders
            .entry(parent_id.to_string())
            .or_default()
            .push(Item::folder(id.clone(), name));
        self.created.lock().unwrap().push((name.to_string(), parent_id.to_string()));
        Ok(id)
    }

    async fn move_item(&self, item_id: &str, dest_folder_id: &str) -> Result<()> {
        let mut folders = self.folders.lock().unwrap();
        let mut found = None;
        for items in folders.values_mut() {
            if let Some(pos) = items.iter().position(|item| item.id == item_id) {
                found = Some(items.remove(pos));
                break;
            }
        }
        let item = found.ok_or_else(|| anyhow!("item {} not found", item_id))?;
        folders.entry(dest_folder_id.to_string()).or_default().push(item);
        self.moved.lock().unwrap().push((item_id.to_string(), dest_folder_id.to_string()));
        Ok(())
    }
}

// =============================================================================
// DOWNLOADER
// =============================================================================

/// Downloader that writes the URL into the target file.
#[derive(Default)]
pub struct FakeDownloader {
    /// While set, downloads wait before writing
    pub hold: AtomicBool,
    /// File names that never finish
    stuck: Mutex<HashSet<String>>,
    /// File names that fail
    failing: Mutex<HashSet<String>>,
    /// (path, parent directory existed when the download started)
    pub started: Mutex<Vec<(String, bool)>>,
    pub urls: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held() -> Self {
        let downloader = Self::default();
        downloader.hold.store(true, Ordering::SeqCst);
        downloader
    }

    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
    }

    pub fn stick(&self, file_name: &str) {
        self.stuck.lock().unwrap().insert(file_name.to_string());
    }

    pub fn fail(&self, file_name: &str) {
        self.failing.lock().unwrap().insert(file_name.to_string());
    }

    pub fn started_paths(&self) -> Vec<String> {
        self.started.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download_file(&self, url: &str, local_path: &Path, progress: &ProgressHandle) -> Result<()> {
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let parent_exists = local_path.parent().map(|p| p.is_dir()).unwrap_or(false);
        self.started
            .lock()
            .unwrap()
            .push((local_path.display().to_string(), parent_exists));
        self.urls.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let is_stuck = self.stuck.lock().unwrap().contains(&file_name);
        let is_failing = self.failing.lock().unwrap().contains(&file_name);

        let result = async {
            if is_stuck {
                std::future::pending::<()>().await;
            }
            while self.hold.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            if url.is_empty() {
                bail!("empty download link");
            }
            if is_failing {
                bail!("connection reset");
            }
            tokio::fs::write(local_path, url.as_bytes()).await?;
            progress.add_bytes(url.len() as u64);
            Ok::<(), anyhow::Error>(())
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// =============================================================================
// ARR CLIENT
// =============================================================================

/// Arr client with a fixed history.
pub struct FakeArr {
    name: String,
    history: HashMap<String, i64>,
    pub checks: AtomicUsize,
    pub handled: Mutex<Vec<(String, i64)>>,
}

impl FakeArr {
    pub fn new(name: &str, history: &[(&str, i64)]) -> Self {
        Self {
            name: name.to_string(),
            history: history.iter().map(|(n, id)| (n.to_string(), *id)).collect(),
            checks: AtomicUsize::new(0),
            handled: Mutex::new(Vec::new()),
        }
    }

    pub fn handled(&self) -> Vec<(String, i64)> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArrClient for FakeArr {
    fn arr_name(&self) -> String {
        self.name.clone()
    }

    async fn history_contains(&self, name: &str) -> Option<i64> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.history.get(name).copied()
    }

    async fn handle_error_transfer(&self, transfer: Transfer, history_id: i64, _remote: Arc<dyn RemoteClient>) {
        self.handled.lock().unwrap().push((transfer.name, history_id));
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Poll `condition` until it holds, panicking after `timeout`.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) {
    let result = tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not met within {:?}", timeout);
}
