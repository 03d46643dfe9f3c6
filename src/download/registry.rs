// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-flight download registry.
//!
//! Maps an item name to the local state of its download. A name present in the
//! registry means a download is running; absence means it never started or has
//! already finished. The registry says nothing about remote state.
//!
//! Every operation takes the single exclusive lock, so admission from the
//! polling loop and removal from many download tasks never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::progress::ProgressHandle;
use crate::locks::resilient_lock;

/// Local tracking record for one in-flight download.
#[derive(Debug, Clone)]
pub struct DownloadDetails {
    /// When the download was admitted. Strictly increasing across the registry.
    pub added: DateTime<Utc>,
    pub name: String,
    pub progress: Arc<ProgressHandle>,
}

/// Point-in-time view of a registry entry for the reporting layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadView {
    /// Unix timestamp in microseconds, unique per entry
    pub added: i64,
    pub name: String,
    pub progress: String,
    pub speed: String,
}

impl From<&DownloadDetails> for DownloadView {
    fn from(details: &DownloadDetails) -> Self {
        Self {
            added: details.added.timestamp_micros(),
            name: details.name.clone(),
            progress: details.progress.progress(),
            speed: details.progress.speed(),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: HashMap<String, DownloadDetails>,
    last_added: Option<DateTime<Utc>>,
}

impl RegistryInner {
    fn next_added(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let added = match self.last_added {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_added = Some(added);
        added
    }

    fn insert(&mut self, name: &str) -> Arc<ProgressHandle> {
        let progress = Arc::new(ProgressHandle::new());
        let details = DownloadDetails {
            added: self.next_added(),
            name: name.to_string(),
            progress: Arc::clone(&progress),
        };
        self.entries.insert(name.to_string(), details);
        progress
    }
}

/// Concurrency-safe table of in-flight downloads keyed by name.
#[derive(Debug, Default)]
pub struct DownloadRegistry {
    inner: Mutex<RegistryInner>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a download and return its fresh progress handle.
    ///
    /// Replaces any existing entry with the same name; callers check
    /// [`exists`](Self::exists) first or use [`try_add`](Self::try_add).
    pub fn add(&self, name: &str) -> Arc<ProgressHandle> {
        resilient_lock(&self.inner).insert(name)
    }

    /// Register a download only if the name is not already in flight.
    ///
    /// Check and insert happen under one lock acquisition.
    pub fn try_add(&self, name: &str) -> Option<Arc<ProgressHandle>> {
        let mut inner = resilient_lock(&self.inner);
        if inner.entries.contains_key(name) {
            return None;
        }
        Some(inner.insert(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        resilient_lock(&self.inner).entries.contains_key(name)
    }

    /// Remove an entry. Removing an absent name is a no-op.
    pub fn remove(&self, name: &str) {
        resilient_lock(&self.inner).entries.remove(name);
    }

    pub fn count(&self) -> usize {
        resilient_lock(&self.inner).entries.len()
    }

    /// Progress handle of an in-flight download.
    pub fn progress(&self, name: &str) -> Option<Arc<ProgressHandle>> {
        resilient_lock(&self.inner)
            .entries
            .get(name)
            .map(|details| Arc::clone(&details.progress))
    }

    /// Owned copy of the current contents.
    pub fn snapshot(&self) -> HashMap<String, DownloadDetails> {
        resilient_lock(&self.inner).entries.clone()
    }

    /// Current contents as views, sorted by name.
    pub fn views(&self) -> Vec<DownloadView> {
        let mut views: Vec<DownloadView> = {
            let inner = resilient_lock(&self.inner);
            inner.entries.values().map(DownloadView::from).collect()
        };
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }
}
