//! Interfaces of the external collaborators.
//!
//! Implementations are thin I/O wrappers around the setlist source and the
//! music platform; `crate::memory` provides in-process ones.

use crate::error::CatalogError;
use crate::models::{CandidateArtist, CandidateTrack, OwnedCollection, Setlist};

/// Produces fully parsed setlists by opaque id.
pub trait SetlistSource {
    /// `Err(CatalogError::NotFound)` when the id is unknown or its upstream
    /// data is malformed.
    fn fetch(&self, setlist_id: &str) -> Result<Setlist, CatalogError>;
}

/// Read access to the music catalog.
pub trait Catalog {
    /// Free-text or field-scoped track search, in catalog order.
    fn search(&self, query: &str) -> Result<Vec<CandidateTrack>, CatalogError>;

    /// Artist search, only used to find artwork.
    fn search_artist(&self, name: &str) -> Result<Vec<CandidateArtist>, CatalogError>;

    /// Download image bytes for an artwork URL returned by `search_artist`.
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}

/// Collections owned by the account.
pub trait CollectionStore {
    fn create(&self, name: &str, description: &str, public: bool) -> Result<String, CatalogError>;

    fn add_tracks(&self, collection_id: &str, track_ids: &[String]) -> Result<(), CatalogError>;

    fn attach_image(&self, collection_id: &str, image: &[u8]) -> Result<(), CatalogError>;

    /// Current track ids of a collection, in collection order.
    fn track_ids(&self, collection_id: &str) -> Result<Vec<String>, CatalogError>;

    /// All owned collections, newest first (the platform's listing order).
    fn list_owned(&self) -> Result<Vec<OwnedCollection>, CatalogError>;

    fn delete(&self, collection_id: &str) -> Result<(), CatalogError>;
}
