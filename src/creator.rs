//! End-to-end handling of one creation request: fetch the setlist, resolve
//! its songs, and create (or reuse) the matching collection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::catalog::{Catalog, CollectionStore, SetlistSource};
use crate::dedup::DedupCache;
use crate::error::{CatalogError, Error, Result};
use crate::models::{resolved_track_ids, MatchOutcome, ResolutionOptions, Setlist};
use crate::naming::{collection_description, collection_name};
use crate::normalize::equals_ignore_case;
use crate::ranking::Ranker;
use crate::resolver::TrackResolver;
use crate::retry::{retry, Cancellation, RetryOutcome, RetryPolicy};

/// Most track ids the platform accepts in one `add_tracks` call.
pub const MAX_TRACKS_PER_ADD: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct CreationResponse {
    pub setlist: Setlist,
    pub options: ResolutionOptions,
    pub collection_id: String,
    pub outcomes: Vec<MatchOutcome>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// An identical collection already existed and was returned instead.
    pub reused: bool,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

pub struct SetlistCreator<Src, C, S>
where
    Src: SetlistSource,
    C: Catalog,
    S: CollectionStore,
{
    source: Arc<Src>,
    catalog: Arc<C>,
    store: Arc<S>,
    cache: Arc<DedupCache>,
    ranker: Ranker,
    retry_policy: RetryPolicy,
    created: AtomicUsize,
}

impl<Src, C, S> SetlistCreator<Src, C, S>
where
    Src: SetlistSource,
    C: Catalog,
    S: CollectionStore,
{
    pub fn new(source: Arc<Src>, catalog: Arc<C>, store: Arc<S>, cache: Arc<DedupCache>) -> Self {
        Self {
            source,
            catalog,
            store,
            cache,
            ranker: Ranker::default(),
            retry_policy: RetryPolicy::default(),
            created: AtomicUsize::new(0),
        }
    }

    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Collections created (not reused) by this instance.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn create(&self, setlist_id: &str, options: ResolutionOptions) -> Result<CreationResponse> {
        self.create_with(setlist_id, options, &Cancellation::never(), |_, _| {})
    }

    pub fn create_with(
        &self,
        setlist_id: &str,
        options: ResolutionOptions,
        cancel: &Cancellation,
        on_progress: impl FnMut(usize, usize),
    ) -> Result<CreationResponse> {
        let start = Instant::now();
        let setlist = self.source.fetch(setlist_id).map_err(|e| match e {
            CatalogError::NotFound(_) => Error::SourceNotFound(setlist_id.to_string()),
            other => Error::Catalog(other),
        })?;
        log::info!(
            "Resolving {} songs of {} at {} ({})",
            setlist.songs.len(),
            setlist.artist_name,
            setlist.venue,
            setlist.event_date
        );

        let resolver = TrackResolver::new(self.catalog.as_ref(), self.ranker.clone());
        let outcomes = resolver.resolve_with(&setlist, &options, cancel, on_progress)?;
        let track_ids = resolved_track_ids(&outcomes);
        let name = collection_name(&setlist);

        if let Some(existing) = self.cache.find_existing(self.store.as_ref(), &name, &track_ids) {
            log::info!("Reusing collection {} for '{}'", existing, name);
            return Ok(CreationResponse {
                setlist,
                options,
                collection_id: existing,
                outcomes,
                elapsed: start.elapsed(),
                reused: true,
            });
        }

        let description = collection_description(&setlist);
        let collection_id = self
            .with_retry(cancel, |_| self.store.create(&name, &description, true))
            .map_err(|e| e.with_outcomes(&outcomes))?;
        if let Err(e) = self.add_tracks(&collection_id, &track_ids, cancel) {
            self.discard(&collection_id);
            return Err(e.with_outcomes(&outcomes));
        }
        self.cache.register(&name, &collection_id);
        let total = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!(
            "Created collection {} '{}' with {} tracks ({} created so far)",
            collection_id,
            name,
            track_ids.len(),
            total
        );

        if options.attach_cover_image {
            if let Err(e) = self.attach_artist_image(&setlist, &outcomes, &collection_id, cancel) {
                log::warn!("No cover image for {}: {}", collection_id, e);
            }
        }

        Ok(CreationResponse {
            setlist,
            options,
            collection_id,
            outcomes,
            elapsed: start.elapsed(),
            reused: false,
        })
    }

    fn add_tracks(&self, collection_id: &str, track_ids: &[String], cancel: &Cancellation) -> Result<()> {
        for chunk in track_ids.chunks(MAX_TRACKS_PER_ADD) {
            self.with_retry(cancel, |_| self.store.add_tracks(collection_id, chunk))?;
        }
        Ok(())
    }

    /// Remove a collection whose tracks could not all be added, so failed
    /// requests do not eat into the quota.
    fn discard(&self, collection_id: &str) {
        match self.store.delete(collection_id) {
            Ok(()) => log::info!("Discarded incomplete collection {}", collection_id),
            Err(e) => log::warn!("Could not discard incomplete collection {}: {}", collection_id, e),
        }
    }

    /// Use the performing artist's largest picture as collection artwork.
    /// Only attempted when at least one resolved track is by that artist.
    fn attach_artist_image(
        &self,
        setlist: &Setlist,
        outcomes: &[MatchOutcome],
        collection_id: &str,
        cancel: &Cancellation,
    ) -> Result<()> {
        let by_performer = outcomes
            .iter()
            .filter_map(MatchOutcome::track)
            .any(|t| equals_ignore_case(t.primary_artist(), &setlist.artist_name));
        if !by_performer {
            log::debug!("No resolved track by {}, skipping artwork", setlist.artist_name);
            return Ok(());
        }

        let artists = self.catalog.search_artist(&setlist.artist_name)?;
        let artist = artists
            .iter()
            .find(|a| equals_ignore_case(&a.name, &setlist.artist_name))
            .or_else(|| artists.first())
            .ok_or_else(|| CatalogError::NotFound(format!("artist {}", setlist.artist_name)))?;
        let image = artist
            .largest_image()
            .ok_or_else(|| CatalogError::NotFound(format!("images of {}", artist.name)))?;
        let bytes = self.catalog.fetch_image(&image.url)?;

        self.with_retry(cancel, |_| self.store.attach_image(collection_id, &bytes))
    }

    fn with_retry<T>(
        &self,
        cancel: &Cancellation,
        op: impl FnMut(u32) -> std::result::Result<T, CatalogError>,
    ) -> Result<T> {
        match retry(self.retry_policy, cancel, CatalogError::is_transient, op) {
            RetryOutcome::Success { value, .. } => Ok(value),
            RetryOutcome::Exhausted { last_error, attempts } => Err(Error::TransientCatalog {
                attempts,
                source: last_error,
            }),
            RetryOutcome::Aborted { error, .. } => Err(Error::Catalog(error)),
            RetryOutcome::Cancelled { .. } => Err(Error::Cancelled { completed: Vec::new() }),
        }
    }
}
