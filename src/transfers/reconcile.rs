// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error-transfer reconciliation against Arr history.

use std::sync::Arc;

use crate::arr::ArrClient;
use crate::remote::RemoteClient;
use crate::types::Transfer;

/// Hand every errored transfer to the first Arr client that knows its name.
///
/// Arr clients are asked in registration order and the first match wins. The
/// recovery itself runs on a detached task. Transfers nobody recognizes are
/// left alone and come up again on the next tick.
///
/// Returns how many transfers were delegated.
pub async fn reconcile_errors(
    transfers: &[Transfer],
    arrs: &[Arc<dyn ArrClient>],
    remote: &Arc<dyn RemoteClient>,
) -> usize {
    tracing::trace!(
        transfers = transfers.len(),
        arrs = arrs.len(),
        "checking transfers against Arr clients"
    );

    let mut delegated = 0;
    for transfer in transfers.iter().filter(|t| t.status.is_error()) {
        match find_owner(transfer, arrs).await {
            Some((arr, history_id)) => {
                tracing::debug!(
                    name = %transfer.name,
                    arr = %arr.arr_name(),
                    history_id,
                    "Processing transfer that has errored"
                );
                let transfer = transfer.clone();
                let remote = Arc::clone(remote);
                tokio::spawn(async move {
                    arr.handle_error_transfer(transfer, history_id, remote).await;
                });
                delegated += 1;
            }
            None => {
                tracing::debug!(name = %transfer.name, "Errored transfer not found in any Arr history");
            }
        }
    }

    delegated
}

async fn find_owner(transfer: &Transfer, arrs: &[Arc<dyn ArrClient>]) -> Option<(Arc<dyn ArrClient>, i64)> {
    for arr in arrs {
        tracing::trace!(name = %transfer.name, arr = %arr.arr_name(), "checking errored transfer against history");
        if let Some(history_id) = arr.history_contains(&transfer.name).await {
            return Some((Arc::clone(arr), history_id));
        }
        tracing::trace!(name = %transfer.name, arr = %arr.arr_name(), "history doesn't contain transfer");
    }
    None
}
