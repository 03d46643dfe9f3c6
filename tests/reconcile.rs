// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error reconciliation against Arr history.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use common::{wait_until, FakeArr, FakeDownloader, FakeRemote};
use transferd::transfers::reconcile_errors;
use transferd::{ArrClient, ManagerSettings, RemoteClient, Transfer, TransferManager, TransferStatus};

const WAIT: Duration = Duration::from_secs(5);

fn errored(name: &str) -> Transfer {
    let mut transfer = Transfer::new(format!("id-{name}"), name, TransferStatus::Error);
    transfer.message = Some("download failed".to_string());
    transfer
}

#[tokio::test]
async fn test_first_matching_arr_wins() {
    let sonarr = Arc::new(FakeArr::new("Sonarr", &[("Show.S01E01", 11)]));
    let radarr = Arc::new(FakeArr::new("Radarr", &[("Show.S01E01", 22)]));
    let arrs: Vec<Arc<dyn ArrClient>> = vec![sonarr.clone() as Arc<dyn ArrClient>, radarr.clone()];
    let remote: Arc<dyn RemoteClient> = Arc::new(FakeRemote::new());

    let delegated = reconcile_errors(&[errored("Show.S01E01")], &arrs, &remote).await;
    assert_eq!(delegated, 1);

    wait_until(WAIT, || sonarr.handled().len() == 1).await;
    assert_eq!(sonarr.handled(), vec![("Show.S01E01".to_string(), 11)]);
    assert!(radarr.handled().is_empty());
    assert_eq!(radarr.checks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_later_arr_handles_what_earlier_ones_miss() {
    let sonarr = Arc::new(FakeArr::new("Sonarr", &[]));
    let radarr = Arc::new(FakeArr::new("Radarr", &[("Movie.2024", 7)]));
    let arrs: Vec<Arc<dyn ArrClient>> = vec![sonarr.clone() as Arc<dyn ArrClient>, radarr.clone()];
    let remote: Arc<dyn RemoteClient> = Arc::new(FakeRemote::new());

    let delegated = reconcile_errors(&[errored("Movie.2024")], &arrs, &remote).await;
    assert_eq!(delegated, 1);

    wait_until(WAIT, || radarr.handled().len() == 1).await;
    assert_eq!(sonarr.checks.load(Ordering::SeqCst), 1);
    assert!(sonarr.handled().is_empty());
}

#[tokio::test]
async fn test_only_errored_transfers_are_checked() {
    let sonarr = Arc::new(FakeArr::new("Sonarr", &[("a", 1), ("b", 2), ("c", 3)]));
    let arrs: Vec<Arc<dyn ArrClient>> = vec![sonarr.clone() as Arc<dyn ArrClient>];
    let remote: Arc<dyn RemoteClient> = Arc::new(FakeRemote::new());

    let transfers = vec![
        Transfer::new("1", "a", TransferStatus::Finished),
        errored("b"),
        Transfer::new("3", "c", TransferStatus::Running),
    ];
    let delegated = reconcile_errors(&transfers, &arrs, &remote).await;

    assert_eq!(delegated, 1);
    assert_eq!(sonarr.checks.load(Ordering::SeqCst), 1);
    wait_until(WAIT, || sonarr.handled().len() == 1).await;
    assert_eq!(sonarr.handled(), vec![("b".to_string(), 2)]);
}

#[tokio::test]
async fn test_unmatched_error_is_retried_every_tick() {
    let remote = Arc::new(FakeRemote::new());
    let sonarr = Arc::new(FakeArr::new("Sonarr", &[]));
    let dir = TempDir::new().unwrap();
    let settings = ManagerSettings {
        simultaneous_downloads: 5,
        downloads_directory: dir.path().to_path_buf(),
        poll_interval: Duration::from_secs(30),
    };
    let manager = TransferManager::new(
        remote.clone(),
        vec![sonarr.clone() as Arc<dyn ArrClient>],
        Arc::new(FakeDownloader::new()),
        settings,
    );

    remote.set_transfers(vec![errored("Unknown.Release")]);
    manager.tick().await;
    manager.tick().await;

    assert_eq!(sonarr.checks.load(Ordering::SeqCst), 2);
    assert!(sonarr.handled().is_empty());
    assert_eq!(manager.status(), "");
}

#[tokio::test]
async fn test_tick_delegates_errored_transfer() {
    let remote = Arc::new(FakeRemote::new());
    let radarr = Arc::new(FakeArr::new("Radarr", &[("Movie.2024", 99)]));
    let dir = TempDir::new().unwrap();
    let settings = ManagerSettings {
        simultaneous_downloads: 5,
        downloads_directory: dir.path().to_path_buf(),
        poll_interval: Duration::from_secs(30),
    };
    let manager = TransferManager::new(
        remote.clone(),
        vec![radarr.clone() as Arc<dyn ArrClient>],
        Arc::new(FakeDownloader::new()),
        settings,
    );

    remote.set_transfers(vec![
        errored("Movie.2024"),
        Transfer::new("t2", "Other.2023", TransferStatus::Seeding),
    ]);
    manager.tick().await;

    wait_until(WAIT, || radarr.handled().len() == 1).await;
    assert_eq!(radarr.handled(), vec![("Movie.2024".to_string(), 99)]);
    assert_eq!(manager.transfers().len(), 2);
}

#[tokio::test]
async fn test_unreachable_downloads_folder_still_reconciles() {
    let remote = Arc::new(FakeRemote::new());
    remote.break_listing("");
    let radarr = Arc::new(FakeArr::new("Radarr", &[("Movie.2024", 5)]));
    let dir = TempDir::new().unwrap();
    let settings = ManagerSettings {
        simultaneous_downloads: 5,
        downloads_directory: dir.path().to_path_buf(),
        poll_interval: Duration::from_secs(30),
    };
    let manager = TransferManager::new(
        remote.clone(),
        vec![radarr.clone() as Arc<dyn ArrClient>],
        Arc::new(FakeDownloader::new()),
        settings,
    );

    remote.set_transfers(vec![errored("Movie.2024")]);
    manager.tick().await;

    // Refresh and reconciliation run; only the scan is skipped
    assert_eq!(manager.transfers().len(), 1);
    wait_until(WAIT, || radarr.handled().len() == 1).await;
    assert_eq!(radarr.handled(), vec![("Movie.2024".to_string(), 5)]);
    assert!(manager.status().contains("Failed to list root folder"));
    assert_eq!(remote.list_count("dl"), 0);
    assert!(manager.last_updated().is_some());
}
