//! In-process collaborators backed by fixtures.
//!
//! Used by the tests and by the offline CLI, which loads them from a JSON
//! snapshot. Failure injection hooks let callers simulate rate limits and
//! flaky mutation calls.

use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CollectionStore, SetlistSource};
use crate::error::CatalogError;
use crate::models::{CandidateArtist, CandidateTrack, OwnedCollection, Setlist};
use crate::normalize::{purify, starts_contained_normalized};

static STRICT_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^artist:"([^"]*)" track:"([^"]*)"$"#).unwrap());

// ============================================================================
// Snapshot
// ============================================================================

/// Offline dump of everything the engine talks to.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub setlists: FxHashMap<String, Setlist>,
    pub tracks: Vec<CandidateTrack>,
    pub artists: Vec<CandidateArtist>,
    /// Image bytes keyed by artwork URL.
    pub images: FxHashMap<String, Vec<u8>>,
    /// Owned collections, oldest first.
    pub collections: Vec<StoredCollection>,
}

impl Snapshot {
    pub fn load(path: &Path) -> anyhow::Result<Snapshot> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    pub fn into_parts(self) -> (MemorySetlistSource, MemoryCatalog, MemoryCollectionStore) {
        let mut catalog = MemoryCatalog::new(self.tracks, self.artists);
        for (url, bytes) in self.images {
            catalog.add_image(&url, bytes);
        }
        (
            MemorySetlistSource::new(self.setlists),
            catalog,
            MemoryCollectionStore::with_collections(self.collections),
        )
    }
}

// ============================================================================
// Setlist Source
// ============================================================================

#[derive(Debug, Default)]
pub struct MemorySetlistSource {
    setlists: FxHashMap<String, Setlist>,
}

impl MemorySetlistSource {
    pub fn new(setlists: FxHashMap<String, Setlist>) -> Self {
        Self { setlists }
    }

    pub fn insert(&mut self, setlist_id: &str, setlist: Setlist) {
        self.setlists.insert(setlist_id.to_string(), setlist);
    }
}

impl SetlistSource for MemorySetlistSource {
    fn fetch(&self, setlist_id: &str) -> Result<Setlist, CatalogError> {
        self.setlists
            .get(setlist_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("setlist {setlist_id}")))
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Fixture catalog. Strict queries match on purified artist and title;
/// loose queries match when every query word occurs in the track's
/// artists or title.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tracks: Vec<CandidateTrack>,
    artists: Vec<CandidateArtist>,
    images: FxHashMap<String, Vec<u8>>,
    queries: Mutex<Vec<String>>,
    failing_searches: Mutex<usize>,
}

impl MemoryCatalog {
    pub fn new(tracks: Vec<CandidateTrack>, artists: Vec<CandidateArtist>) -> Self {
        Self {
            tracks,
            artists,
            ..Default::default()
        }
    }

    pub fn add_image(&mut self, url: &str, bytes: Vec<u8>) {
        self.images.insert(url.to_string(), bytes);
    }

    /// Every track query received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    /// Make the next `count` track searches fail.
    pub fn fail_next_searches(&self, count: usize) {
        *self.failing_searches.lock() = count;
    }

    fn matches_strict(track: &CandidateTrack, artist: &str, title: &str) -> bool {
        !title.is_empty()
            && track.artists.iter().any(|a| starts_contained_normalized(a, artist))
            && purify(&track.name).contains(title)
    }

    fn matches_loose(track: &CandidateTrack, query: &str) -> bool {
        let haystack = purify(&format!("{} {}", track.artists.join(" "), track.name));
        let words: Vec<&str> = haystack.split(' ').collect();
        let needle = purify(query);
        !needle.is_empty() && needle.split(' ').all(|w| words.contains(&w))
    }
}

impl Catalog for MemoryCatalog {
    fn search(&self, query: &str) -> Result<Vec<CandidateTrack>, CatalogError> {
        self.queries.lock().push(query.to_string());
        {
            let mut failing = self.failing_searches.lock();
            if *failing > 0 {
                *failing -= 1;
                return Err(CatalogError::Request("search unavailable".into()));
            }
        }

        let results = match STRICT_QUERY.captures(query) {
            Some(caps) => self
                .tracks
                .iter()
                .filter(|t| Self::matches_strict(t, &caps[1], &caps[2]))
                .cloned()
                .collect(),
            None => self
                .tracks
                .iter()
                .filter(|t| Self::matches_loose(t, query))
                .cloned()
                .collect(),
        };
        Ok(results)
    }

    fn search_artist(&self, name: &str) -> Result<Vec<CandidateArtist>, CatalogError> {
        Ok(self
            .artists
            .iter()
            .filter(|a| starts_contained_normalized(&a.name, name))
            .cloned()
            .collect())
    }

    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("image {url}")))
    }
}

// ============================================================================
// Collection Store
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredCollection {
    pub id: String,
    pub name: String,
    pub description: String,
    pub public: bool,
    pub tracks: Vec<String>,
    /// Followers besides the owning account.
    pub followers: usize,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

impl StoredCollection {
    fn summary(&self) -> OwnedCollection {
        OwnedCollection {
            id: self.id.clone(),
            name: self.name.clone(),
            track_count: self.tracks.len(),
            follower_count: self.followers,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    /// Oldest first.
    collections: Vec<StoredCollection>,
    next_id: usize,
    failing_adds: usize,
    failing_attaches: usize,
    failing_deletes: Vec<String>,
    listing_fails: bool,
}

/// Fixture collection store. Ids are `col-N`; new collections start with
/// no followers.
#[derive(Debug, Default)]
pub struct MemoryCollectionStore {
    state: Mutex<StoreState>,
}

impl MemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing collections, oldest first.
    pub fn with_collections(collections: Vec<StoredCollection>) -> Self {
        let next_id = collections
            .iter()
            .filter_map(|c| c.id.strip_prefix("col-")?.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        Self {
            state: Mutex::new(StoreState {
                collections,
                next_id,
                ..Default::default()
            }),
        }
    }

    pub fn get(&self, collection_id: &str) -> Option<StoredCollection> {
        let state = self.state.lock();
        state.collections.iter().find(|c| c.id == collection_id).cloned()
    }

    pub fn collection_count(&self) -> usize {
        self.state.lock().collections.len()
    }

    /// Make the next `count` `add_tracks` calls fail with a scope error.
    pub fn fail_next_adds(&self, count: usize) {
        self.state.lock().failing_adds = count;
    }

    /// Make the next `count` `attach_image` calls fail with a scope error.
    pub fn fail_next_attaches(&self, count: usize) {
        self.state.lock().failing_attaches = count;
    }

    /// Make every deletion of `collection_id` fail.
    pub fn fail_deletes_of(&self, collection_id: &str) {
        self.state.lock().failing_deletes.push(collection_id.to_string());
    }

    pub fn set_listing_fails(&self, fails: bool) {
        self.state.lock().listing_fails = fails;
    }

    fn with_collection<T>(
        &self,
        collection_id: &str,
        f: impl FnOnce(&mut StoredCollection) -> T,
    ) -> Result<T, CatalogError> {
        let mut state = self.state.lock();
        state
            .collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .map(f)
            .ok_or_else(|| CatalogError::NotFound(format!("collection {collection_id}")))
    }
}

impl CollectionStore for MemoryCollectionStore {
    fn create(&self, name: &str, description: &str, public: bool) -> Result<String, CatalogError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("col-{}", state.next_id);
        state.collections.push(StoredCollection {
            id: id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            public,
            tracks: Vec::new(),
            followers: 0,
            image: None,
        });
        Ok(id)
    }

    fn add_tracks(&self, collection_id: &str, track_ids: &[String]) -> Result<(), CatalogError> {
        {
            let mut state = self.state.lock();
            if state.failing_adds > 0 {
                state.failing_adds -= 1;
                return Err(CatalogError::Scope("playlist-modify-public".into()));
            }
        }
        self.with_collection(collection_id, |c| c.tracks.extend_from_slice(track_ids))
    }

    fn attach_image(&self, collection_id: &str, image: &[u8]) -> Result<(), CatalogError> {
        {
            let mut state = self.state.lock();
            if state.failing_attaches > 0 {
                state.failing_attaches -= 1;
                return Err(CatalogError::Scope("ugc-image-upload".into()));
            }
        }
        self.with_collection(collection_id, |c| c.image = Some(image.to_vec()))
    }

    fn track_ids(&self, collection_id: &str) -> Result<Vec<String>, CatalogError> {
        self.with_collection(collection_id, |c| c.tracks.clone())
    }

    fn list_owned(&self) -> Result<Vec<OwnedCollection>, CatalogError> {
        let state = self.state.lock();
        if state.listing_fails {
            return Err(CatalogError::RateLimited);
        }
        Ok(state.collections.iter().rev().map(StoredCollection::summary).collect())
    }

    fn delete(&self, collection_id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        if state.failing_deletes.iter().any(|id| id == collection_id) {
            return Err(CatalogError::Request(format!("cannot delete {collection_id}")));
        }
        let before = state.collections.len();
        state.collections.retain(|c| c.id != collection_id);
        if state.collections.len() == before {
            return Err(CatalogError::NotFound(format!("collection {collection_id}")));
        }
        Ok(())
    }
}
