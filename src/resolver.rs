//! Per-song track resolution for a whole setlist.
//!
//! Songs are processed strictly one after another: the catalog's rate
//! limiter punishes bursts harder than it rewards concurrency. The resolver
//! keeps no state between calls, so separate requests may run in parallel.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::models::{CandidateTrack, MatchOutcome, ResolutionOptions, Setlist, Song};
use crate::normalize::{equals_ignore_case, strip_leading_article};
use crate::query::queries_for;
use crate::ranking::Ranker;
use crate::retry::Cancellation;

/// A resolution is rejected when fewer than 1/N songs resolved.
pub const MIN_RESOLVED_DIVISOR: usize = 3;

pub struct TrackResolver<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    ranker: Ranker,
}

impl<'a, C: Catalog + ?Sized> TrackResolver<'a, C> {
    pub fn new(catalog: &'a C, ranker: Ranker) -> Self {
        Self { catalog, ranker }
    }

    /// One outcome per song, in setlist order.
    ///
    /// Fails with `SourceNotFound` for an empty setlist and with
    /// `InsufficientMatches` when fewer than a third of the songs resolved.
    pub fn resolve(&self, setlist: &Setlist, options: &ResolutionOptions) -> Result<Vec<MatchOutcome>> {
        self.resolve_with(setlist, options, &Cancellation::never(), |_, _| {})
    }

    /// Like `resolve`, checking `cancel` before each song and reporting
    /// `(songs_done, songs_total)` after each one. On cancellation the
    /// outcomes of the songs already processed travel in the error.
    pub fn resolve_with(
        &self,
        setlist: &Setlist,
        options: &ResolutionOptions,
        cancel: &Cancellation,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Vec<MatchOutcome>> {
        let total = setlist.songs.len();
        if total == 0 {
            return Err(Error::SourceNotFound(format!(
                "setlist of {} on {} has no songs",
                setlist.artist_name, setlist.event_date
            )));
        }

        let ranker = self.ranker.for_strict_only(options.strict_search_only);
        let mut outcomes = Vec::with_capacity(total);
        for song in &setlist.songs {
            if cancel.is_cancelled() {
                log::info!("Resolution cancelled after {}/{} songs", outcomes.len(), total);
                return Err(Error::Cancelled { completed: outcomes });
            }
            let outcome = if should_search(song, options) {
                self.resolve_song(&ranker, song, options)
            } else {
                MatchOutcome::skipped(song.clone())
            };
            outcomes.push(outcome);
            on_progress(outcomes.len(), total);
        }

        ensure_sufficient(&outcomes)?;
        Ok(outcomes)
    }

    fn resolve_song(&self, ranker: &Ranker, song: &Song, options: &ResolutionOptions) -> MatchOutcome {
        let query_artist = song.query_artist();
        let (title, candidates) = self.search_with_article_retry(song, query_artist, options);

        let direct = ranker.rank_title(song, &title, &candidates, query_artist);
        if direct.has_result() || !song.cover || !options.include_cover_originals {
            return direct;
        }
        if equals_ignore_case(&song.original_artist_name, query_artist) {
            // Already searched under the original artist
            return direct;
        }

        let original = &song.original_artist_name;
        log::debug!("No direct match for '{}', trying original by '{}'", song.name, original);
        let candidates = self.search(&title, original, options.strict_search_only);
        ranker
            .rank_title(song, &title, &candidates, original)
            .into_cover_original()
    }

    /// Search, and if the catalog has nothing at all for a title starting
    /// with "The ", search once more without the article.
    fn search_with_article_retry(
        &self,
        song: &Song,
        artist: &str,
        options: &ResolutionOptions,
    ) -> (String, Vec<CandidateTrack>) {
        let candidates = self.search(&song.name, artist, options.strict_search_only);
        if candidates.is_empty() {
            if let Some(stripped) = strip_leading_article(&song.name) {
                let retried = self.search(&stripped, artist, options.strict_search_only);
                return (stripped, retried);
            }
        }
        (song.name.clone(), candidates)
    }

    /// Issue the strict (and unless disabled, the loose) query and merge
    /// the results strict-first, dropping duplicate track ids. Failed
    /// queries contribute nothing.
    fn search(&self, title: &str, artist: &str, strict_only: bool) -> Vec<CandidateTrack> {
        let mut merged: Vec<CandidateTrack> = Vec::new();
        for query in queries_for(title, artist, strict_only) {
            match self.catalog.search(&query.text) {
                Ok(results) => {
                    for track in results {
                        if !merged.iter().any(|t| t.id == track.id) {
                            merged.push(track);
                        }
                    }
                }
                Err(e) => log::warn!("Search failed for {:?} query '{}': {}", query.mode, query.text, e),
            }
        }
        merged
    }
}

/// Whether a song should be searched at all under `options`.
///
/// Standalone performances always are. Tapes only when the tape flag for
/// their kind (cover → other artist, else main artist) is on; medley parts
/// only when medley parts are included.
pub fn should_search(song: &Song, options: &ResolutionOptions) -> bool {
    let tape_included = if song.cover {
        options.include_tapes_other
    } else {
        options.include_tapes_main
    };
    song.is_standalone()
        || (song.tape && tape_included)
        || (song.medley_part && options.include_medley_parts)
}

/// Reject resolutions where fewer than a third of all songs resolved.
pub fn ensure_sufficient(outcomes: &[MatchOutcome]) -> Result<()> {
    let total = outcomes.len();
    let resolved = outcomes.iter().filter(|o| o.has_result()).count();
    if total == 0 || resolved * MIN_RESOLVED_DIVISOR < total {
        return Err(Error::InsufficientMatches { resolved, total });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;
    use crate::models::{ReleaseType, ResultKind};
    use jiff::civil::date;

    fn song(index: usize, name: &str) -> Song {
        Song {
            index,
            name: name.into(),
            artist_name: "Band X".into(),
            original_artist_name: "Band X".into(),
            tape: false,
            cover: false,
            medley_part: false,
        }
    }

    fn cover(index: usize, name: &str, original: &str) -> Song {
        Song {
            cover: true,
            original_artist_name: original.into(),
            ..song(index, name)
        }
    }

    fn track(id: &str, name: &str, artist: &str) -> CandidateTrack {
        CandidateTrack {
            id: id.into(),
            name: name.into(),
            artists: vec![artist.into()],
            album_name: "Record".into(),
            album_artists: vec![artist.into()],
            release_type: ReleaseType::Album,
            release_date: "2010-05-01".into(),
        }
    }

    fn setlist(songs: Vec<Song>) -> Setlist {
        Setlist {
            artist_name: "Band X".into(),
            event_date: date(2024, 6, 1),
            venue: "Hall".into(),
            city: "Oslo, Norway".into(),
            tour_name: Some("Tour Y".into()),
            songs,
        }
    }

    fn kinds(outcomes: &[MatchOutcome]) -> Vec<ResultKind> {
        outcomes.iter().map(MatchOutcome::kind).collect()
    }

    #[test]
    fn test_should_search_flags() {
        let options = ResolutionOptions::default();
        let plain = song(1, "A");
        assert!(should_search(&plain, &options));
        assert!(should_search(&plain, &ResolutionOptions {
            include_tapes_main: true,
            include_tapes_other: true,
            include_medley_parts: true,
            ..options
        }));

        let tape = Song { tape: true, ..song(1, "Intro") };
        assert!(!should_search(&tape, &options));
        assert!(should_search(&tape, &ResolutionOptions { include_tapes_main: true, ..options }));
        assert!(!should_search(&tape, &ResolutionOptions { include_tapes_other: true, ..options }));

        let foreign_tape = Song { tape: true, ..cover(1, "Outro", "Other") };
        assert!(should_search(&foreign_tape, &ResolutionOptions { include_tapes_other: true, ..options }));

        let medley = Song { medley_part: true, ..song(1, "Part") };
        assert!(!should_search(&medley, &options));
        assert!(should_search(&medley, &ResolutionOptions { include_medley_parts: true, ..options }));
    }

    #[test]
    fn test_scenario_tape_and_cover_original() {
        let catalog = MemoryCatalog::new(
            vec![
                track("t1", "Opener", "Band X"),
                track("t2", "Second", "Band X"),
                track("t3", "Third", "Band X"),
                track("t4", "Closer", "Band X"),
                track("orig", "Borrowed", "Old Band"),
                track("tape", "Walk-In Music", "Band X"),
            ],
            vec![],
        );
        let songs = vec![
            Song { tape: true, ..song(1, "Walk-In Music") },
            song(2, "Opener"),
            song(3, "Second"),
            cover(4, "Borrowed", "Old Band"),
            song(5, "Third"),
            song(6, "Closer"),
        ];
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        let outcomes = resolver.resolve(&setlist(songs), &ResolutionOptions::default()).unwrap();

        assert_eq!(outcomes.len(), 6);
        assert_eq!(
            kinds(&outcomes),
            vec![
                ResultKind::Skipped,
                ResultKind::ExactMatch,
                ResultKind::ExactMatch,
                ResultKind::CoverOriginal,
                ResultKind::ExactMatch,
                ResultKind::ExactMatch,
            ]
        );
        assert_eq!(outcomes[3].track().map(|t| t.id.as_str()), Some("orig"));
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.song().index, i + 1);
        }
    }

    #[test]
    fn test_skipped_songs_are_never_searched() {
        let catalog = MemoryCatalog::new(vec![track("t1", "Opener", "Band X")], vec![]);
        let songs = vec![Song { tape: true, ..song(1, "Intro") }, song(2, "Opener")];
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        resolver.resolve(&setlist(songs), &ResolutionOptions::default()).unwrap();
        assert!(catalog.queries().iter().all(|q| !q.contains("Intro") && !q.contains("intro")));
        assert_eq!(catalog.queries().len(), 2);
    }

    #[test]
    fn test_insufficient_matches() {
        let catalog = MemoryCatalog::new(vec![track("t1", "Opener", "Band X")], vec![]);
        let songs = (1..=6)
            .map(|i| if i == 1 { song(1, "Opener") } else { song(i, &format!("Unknown {i}")) })
            .collect();
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        let err = resolver.resolve(&setlist(songs), &ResolutionOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientMatches { resolved: 1, total: 6 }));
    }

    #[test]
    fn test_exactly_one_third_is_sufficient() {
        let catalog = MemoryCatalog::new(
            vec![track("t1", "Opener", "Band X"), track("t2", "Second", "Band X")],
            vec![],
        );
        let songs = vec![
            song(1, "Opener"),
            song(2, "Second"),
            song(3, "Nope"),
            song(4, "Nada"),
            song(5, "Nichts"),
            song(6, "Niente"),
        ];
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        assert!(resolver.resolve(&setlist(songs), &ResolutionOptions::default()).is_ok());
    }

    #[test]
    fn test_empty_setlist_is_source_not_found() {
        let catalog = MemoryCatalog::new(vec![], vec![]);
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        let err = resolver.resolve(&setlist(vec![]), &ResolutionOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }

    #[test]
    fn test_cover_original_disabled() {
        let catalog = MemoryCatalog::new(
            vec![track("t1", "Opener", "Band X"), track("orig", "Borrowed", "Old Band")],
            vec![],
        );
        let songs = vec![song(1, "Opener"), cover(2, "Borrowed", "Old Band")];
        let options = ResolutionOptions {
            include_cover_originals: false,
            ..Default::default()
        };
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        let outcomes = resolver.resolve(&setlist(songs), &options).unwrap();
        assert_eq!(kinds(&outcomes), vec![ResultKind::ExactMatch, ResultKind::NotFound]);
    }

    #[test]
    fn test_cover_by_performer_preferred_over_original() {
        let catalog = MemoryCatalog::new(
            vec![track("own", "Borrowed", "Band X"), track("orig", "Borrowed", "Old Band")],
            vec![],
        );
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        let outcomes = resolver
            .resolve(&setlist(vec![cover(1, "Borrowed", "Old Band")]), &ResolutionOptions::default())
            .unwrap();
        assert_eq!(outcomes[0].kind(), ResultKind::ExactMatch);
        assert_eq!(outcomes[0].track().map(|t| t.id.as_str()), Some("own"));
    }

    #[test]
    fn test_leading_article_retry() {
        let catalog = MemoryCatalog::new(vec![track("t1", "Trooper", "Band X")], vec![]);
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        let outcomes = resolver
            .resolve(&setlist(vec![song(1, "The Trooper")]), &ResolutionOptions::default())
            .unwrap();
        assert_eq!(outcomes[0].kind(), ResultKind::ExactMatch);
        assert_eq!(outcomes[0].song().name, "The Trooper");
    }

    #[test]
    fn test_search_failures_become_not_found() {
        let catalog = MemoryCatalog::new(vec![track("t1", "Opener", "Band X")], vec![]);
        catalog.fail_next_searches(2);
        let songs = vec![song(1, "Opener"), song(2, "Opener")];
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        let outcomes = resolver.resolve(&setlist(songs), &ResolutionOptions::default()).unwrap();
        assert_eq!(kinds(&outcomes), vec![ResultKind::NotFound, ResultKind::ExactMatch]);
    }

    #[test]
    fn test_cancellation_stops_before_next_song() {
        let catalog = MemoryCatalog::new(vec![track("t1", "Opener", "Band X")], vec![]);
        let (handle, cancel) = Cancellation::new();
        let songs = vec![song(1, "Opener"), song(2, "Opener"), song(3, "Opener")];
        let resolver = TrackResolver::new(&catalog, Ranker::default());
        let mut seen = Vec::new();
        let err = resolver
            .resolve_with(&setlist(songs), &ResolutionOptions::default(), &cancel, |done, total| {
                seen.push((done, total));
                if done == 1 {
                    handle.cancel();
                }
            })
            .unwrap_err();
        assert_eq!(seen, vec![(1, 3)]);
        let Error::Cancelled { completed } = err else {
            panic!("expected cancellation, got {err}");
        };
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].song().index, 1);
        assert_eq!(completed[0].kind(), ResultKind::ExactMatch);
    }
}
