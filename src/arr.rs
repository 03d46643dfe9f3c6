// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Arr collaborator capability (Sonarr, Radarr, ...).
//!
//! Arr clients keep their own history cache; the engine only asks whether a
//! transfer name appears in it and, if so, hands the failed transfer over.

use std::sync::Arc;

use async_trait::async_trait;

use crate::remote::RemoteClient;
use crate::types::Transfer;

/// Operations the error reconciler needs from a media-management service.
#[async_trait]
pub trait ArrClient: Send + Sync {
    /// Display name used in logs.
    fn arr_name(&self) -> String;

    /// History entry id for a download with this name, if the service knows it.
    async fn history_contains(&self, name: &str) -> Option<i64>;

    /// Recover from a failed transfer (mark failed, re-search, clean up remote).
    ///
    /// Called on a detached task; failures are the implementation's to log.
    async fn handle_error_transfer(&self, transfer: Transfer, history_id: i64, remote: Arc<dyn RemoteClient>);
}
