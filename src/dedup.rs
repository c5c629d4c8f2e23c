//! In-memory index of owned collections by name, used to avoid creating
//! the same setlist collection twice.
//!
//! Names are not unique on the platform, so one name maps to every
//! collection id carrying it. A hit requires the candidate's current track
//! list to equal the requested one exactly, position by position.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::catalog::CollectionStore;
use crate::models::OwnedCollection;

#[derive(Debug, Default)]
pub struct DedupCache {
    entries: RwLock<FxHashMap<String, Vec<String>>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of an existing collection named `name` whose track ids equal
    /// `track_ids` in order, if any.
    ///
    /// The lock is only held while copying the candidate ids; track lists
    /// are fetched from `store` without it. Candidates whose track list
    /// cannot be fetched are treated as non-matching.
    pub fn find_existing<S: CollectionStore + ?Sized>(
        &self,
        store: &S,
        name: &str,
        track_ids: &[String],
    ) -> Option<String> {
        let candidates = self.entries.read().get(name).cloned()?;
        candidates.into_iter().find(|id| match store.track_ids(id) {
            Ok(current) => current.as_slice() == track_ids,
            Err(e) => {
                log::warn!("Could not read tracks of collection {}: {}", id, e);
                false
            }
        })
    }

    /// Record a freshly created collection.
    pub fn register(&self, name: &str, collection_id: &str) {
        let mut entries = self.entries.write();
        let ids = entries.entry(name.to_string()).or_default();
        if !ids.iter().any(|id| id == collection_id) {
            ids.push(collection_id.to_string());
        }
    }

    /// Replace the whole index with `collections`.
    ///
    /// The new map is built before the lock is taken, so readers see either
    /// the old index or the new one, never a partial rebuild.
    pub fn rebuild(&self, collections: &[OwnedCollection]) {
        let mut fresh: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for collection in collections {
            fresh
                .entry(collection.name.clone())
                .or_default()
                .push(collection.id.clone());
        }
        *self.entries.write() = fresh;
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of collection ids across all names.
    pub fn collection_count(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }
}
