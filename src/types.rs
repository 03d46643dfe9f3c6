// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canonical types shared by the remote service, the Arr clients and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a remote transfer as reported by the cloud service.
///
/// Serialized as the lowercase string the service uses. Unknown statuses are
/// kept verbatim in [`TransferStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransferStatus {
    /// Accepted but not started
    Waiting,
    /// Queued on the remote side
    Queued,
    /// Actively transferring
    Running,
    /// Remote side finished, output available in the completed folder
    Finished,
    /// Finished and still seeding
    Seeding,
    /// Remote side gave up
    Error,
    /// Anything the service reports that we don't model
    Other(String),
}

impl TransferStatus {
    /// Convert status to its wire string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Waiting => "waiting",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Seeding => "seeding",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }

    /// Returns true if the remote transfer failed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl From<String> for TransferStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "waiting" => Self::Waiting,
            "queued" => Self::Queued,
            "running" => Self::Running,
            "finished" => Self::Finished,
            "seeding" => Self::Seeding,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<TransferStatus> for String {
    fn from(value: TransferStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote transfer job.
///
/// Ephemeral: the engine replaces its cached list wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub name: String,
    pub status: TransferStatus,
    /// Remote completion fraction (0.0 - 1.0)
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    /// Output folder once the transfer has finished
    #[serde(default)]
    pub folder_id: Option<String>,
    /// Output file for single-file transfers
    #[serde(default)]
    pub file_id: Option<String>,
}

impl Transfer {
    /// Create a transfer with only the fields the engine reads.
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: TransferStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            progress: 0.0,
            message: None,
            folder_id: None,
            file_id: None,
        }
    }
}

/// Kind of a remote filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

/// A remote filesystem entry, read fresh on every listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

impl Item {
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::File,
        }
    }

    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}
