// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Remote cloud service capability.
//!
//! The engine never speaks the service's wire protocol itself. Anything that
//! can list folders, report transfers and hand out direct links can drive it.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::types::{Item, Transfer};

/// Id the service uses for the account's root folder.
pub const ROOT_FOLDER_ID: &str = "";

/// Name of the root-level folder finished transfers land in.
pub const DOWNLOADS_FOLDER_NAME: &str = "downloads";

/// Operations the engine needs from the cloud service.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// List the entries of a folder. [`ROOT_FOLDER_ID`] lists the root.
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<Item>>;

    /// Current transfer jobs.
    async fn get_transfers(&self) -> Result<Vec<Transfer>>;

    /// Delete a folder and everything below it.
    async fn delete_folder(&self, folder_id: &str) -> Result<()>;

    /// Direct download link for a file.
    async fn generate_file_link(&self, file_id: &str) -> Result<String>;

    /// Create a folder and return its id.
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String>;

    /// Move a file or folder into another folder.
    async fn move_item(&self, item_id: &str, dest_folder_id: &str) -> Result<()>;
}

/// Find the id of the completed-downloads folder, creating it when missing.
pub async fn resolve_downloads_folder(client: &dyn RemoteClient) -> Result<String> {
    let root = client
        .list_folder(ROOT_FOLDER_ID)
        .await
        .context("Failed to list root folder")?;

    if let Some(folder) = root
        .iter()
        .find(|item| item.is_folder() && item.name == DOWNLOADS_FOLDER_NAME)
    {
        tracing::debug!(id = %folder.id, "found remote downloads folder");
        return Ok(folder.id.clone());
    }

    tracing::info!("Remote downloads folder missing, creating it");
    client
        .create_folder(DOWNLOADS_FOLDER_NAME, ROOT_FOLDER_ID)
        .await
        .context("Failed to create remote downloads folder")
}
