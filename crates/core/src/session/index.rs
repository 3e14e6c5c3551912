//! Process-wide "files with conflicts" listing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::models::ConflictedFile;

type Listing = Arc<BTreeMap<PathBuf, ConflictedFile>>;

/// Snapshot-published index of conflicted paths.
///
/// Writers go through the crate's session layer; readers take a snapshot or
/// subscribe for change notifications.
#[derive(Debug, Clone)]
pub struct ConflictIndex {
    tx: Arc<watch::Sender<Listing>>,
}

impl Default for ConflictIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictIndex {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Listing::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current listing, ordered by path.
    pub fn snapshot(&self) -> Vec<ConflictedFile> {
        self.tx.borrow().values().cloned().collect()
    }

    pub fn get(&self, path: &Path) -> Option<ConflictedFile> {
        self.tx.borrow().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.tx.borrow().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Receiver that wakes on every change to the listing.
    pub fn subscribe(&self) -> watch::Receiver<Listing> {
        self.tx.subscribe()
    }

    /// Insert or refresh an entry, keeping its original detection time.
    pub(crate) fn upsert(&self, mut file: ConflictedFile) {
        self.tx.send_modify(|listing| {
            let map = Arc::make_mut(listing);
            if let Some(existing) = map.get(&file.path) {
                file.detected_at = existing.detected_at;
            }
            debug!(path = %file.path.display(), regions = file.region_count, "conflict index upsert");
            map.insert(file.path.clone(), file);
        });
    }

    /// Remove `path`; returns whether it was listed.
    pub(crate) fn remove(&self, path: &Path) -> bool {
        let mut removed = false;
        self.tx.send_if_modified(|listing| {
            if !listing.contains_key(path) {
                return false;
            }
            removed = Arc::make_mut(listing).remove(path).is_some();
            debug!(path = %path.display(), "conflict index remove");
            removed
        });
        removed
    }

    /// Replace the listing with `files`, keeping detection times of paths
    /// that were already listed.
    pub(crate) fn replace_all(&self, files: Vec<ConflictedFile>) {
        self.tx.send_modify(|listing| {
            let previous = Arc::clone(listing);
            let next: BTreeMap<PathBuf, ConflictedFile> = files
                .into_iter()
                .map(|mut f| {
                    if let Some(old) = previous.get(&f.path) {
                        f.detected_at = old.detected_at;
                    }
                    (f.path.clone(), f)
                })
                .collect();
            *listing = Arc::new(next);
        });
    }
}
