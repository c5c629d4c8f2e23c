//! Core data models for setlist resolution.
//!
//! This module contains the setlist input types, the catalog candidate
//! types, the per-song match outcome and the statistics gathered over a
//! resolution run.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

// ============================================================================
// Setlist Models
// ============================================================================

/// A concert setlist as produced by the setlist source.
/// Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setlist {
    pub artist_name: String,
    pub event_date: Date,
    pub venue: String,
    pub city: String,
    #[serde(default)]
    pub tour_name: Option<String>,
    pub songs: Vec<Song>,
}

impl Setlist {
    /// Tour name, ignoring blank values some sources send instead of nothing.
    pub fn tour(&self) -> Option<&str> {
        self.tour_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn venue_and_city(&self) -> String {
        format!("{}, {}", self.venue, self.city)
    }
}

/// One setlist entry. The three flags are independent; every combination is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// 1-based position in the setlist. Medley parts share their entry's index.
    pub index: usize,
    pub name: String,
    /// Artist performing the song at this concert.
    pub artist_name: String,
    /// Writer/original performer. Equal to `artist_name` unless `cover` is set.
    pub original_artist_name: String,
    /// Played from a recording rather than performed live.
    #[serde(default)]
    pub tape: bool,
    #[serde(default)]
    pub cover: bool,
    /// One segment of a multi-song medley entry.
    #[serde(default)]
    pub medley_part: bool,
}

impl Song {
    /// A song performed live on its own, neither tape nor medley segment.
    pub fn is_standalone(&self) -> bool {
        !self.tape && !self.medley_part
    }

    /// Artist to search the catalog under. Tapes are usually somebody
    /// else's recording, so they are looked up under the original artist.
    pub fn query_artist(&self) -> &str {
        if self.tape {
            &self.original_artist_name
        } else {
            &self.artist_name
        }
    }
}

/// Policy flags controlling which songs get searched and how.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionOptions {
    pub include_tapes_main: bool,
    pub include_tapes_other: bool,
    pub include_cover_originals: bool,
    pub include_medley_parts: bool,
    pub attach_cover_image: bool,
    pub strict_search_only: bool,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            include_tapes_main: false,
            include_tapes_other: false,
            include_cover_originals: true,
            include_medley_parts: false,
            attach_cover_image: true,
            strict_search_only: false,
        }
    }
}

// ============================================================================
// Catalog Models
// ============================================================================

/// Release type for preferring full-length albums over singles and compilations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Album,
    Single,
    Compilation,
    #[default]
    Unknown,
}

impl ReleaseType {
    /// Rank for sorting: lower is better (album < single < compilation < unknown)
    pub fn rank(self) -> i32 {
        match self {
            ReleaseType::Album => 0,
            ReleaseType::Single => 1,
            ReleaseType::Compilation => 2,
            ReleaseType::Unknown => 3,
        }
    }
}

/// Track returned by a catalog search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub id: String,
    pub name: String,
    /// Credited artists in the catalog's credited order.
    pub artists: Vec<String>,
    pub album_name: String,
    /// Album-level artists; empty when the catalog did not report them.
    #[serde(default)]
    pub album_artists: Vec<String>,
    #[serde(default)]
    pub release_type: ReleaseType,
    /// "YYYY", "YYYY-MM" or "YYYY-MM-DD"; sorts chronologically as text.
    pub release_date: String,
}

impl CandidateTrack {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("")
    }

    /// First album artist, falling back to the first track artist.
    pub fn album_artist(&self) -> &str {
        self.album_artists
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| self.primary_artist())
    }

    pub fn is_on_album(&self) -> bool {
        self.release_type == ReleaseType::Album
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Artist returned by a catalog artist search. Only used for artwork.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<ArtistImage>,
}

impl CandidateArtist {
    pub fn largest_image(&self) -> Option<&ArtistImage> {
        self.images
            .iter()
            .max_by_key(|img| u64::from(img.width) * u64::from(img.height))
    }
}

/// Collection owned by the account, as listed by the collection store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedCollection {
    pub id: String,
    pub name: String,
    pub track_count: usize,
    /// Followers other than the owning account.
    pub follower_count: usize,
}

impl OwnedCollection {
    /// Nobody would miss it: no tracks, or no followers besides the owner.
    pub fn is_dead(&self) -> bool {
        self.track_count == 0 || self.follower_count == 0
    }
}

// ============================================================================
// Match Outcome
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultKind {
    ExactMatch,
    CloseMatch,
    /// The original artist's recording of a cover, not the performer's.
    CoverOriginal,
    Skipped,
    NotFound,
}

impl ResultKind {
    pub fn has_result(self) -> bool {
        !matches!(self, ResultKind::Skipped | ResultKind::NotFound)
    }
}

/// Resolution result for exactly one setlist song.
///
/// Constructed only through the named constructors, which keeps
/// `track.is_some() == kind.has_result()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchOutcome {
    song: Song,
    track: Option<CandidateTrack>,
    kind: ResultKind,
}

impl MatchOutcome {
    pub fn exact_match(song: Song, track: CandidateTrack) -> Self {
        Self::with_track(song, track, ResultKind::ExactMatch)
    }

    pub fn close_match(song: Song, track: CandidateTrack) -> Self {
        Self::with_track(song, track, ResultKind::CloseMatch)
    }

    pub fn cover_original(song: Song, track: CandidateTrack) -> Self {
        Self::with_track(song, track, ResultKind::CoverOriginal)
    }

    pub fn skipped(song: Song) -> Self {
        Self {
            song,
            track: None,
            kind: ResultKind::Skipped,
        }
    }

    pub fn not_found(song: Song) -> Self {
        Self {
            song,
            track: None,
            kind: ResultKind::NotFound,
        }
    }

    fn with_track(song: Song, track: CandidateTrack, kind: ResultKind) -> Self {
        Self {
            song,
            track: Some(track),
            kind,
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn track(&self) -> Option<&CandidateTrack> {
        self.track.as_ref()
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn has_result(&self) -> bool {
        self.kind.has_result()
    }

    /// Same match, relabelled as a cover original.
    pub fn into_cover_original(self) -> Self {
        match self.track {
            Some(track) => Self::cover_original(self.song, track),
            None => self,
        }
    }
}

/// Track ids of all outcomes that carry a result, in setlist order.
pub fn resolved_track_ids(outcomes: &[MatchOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter_map(MatchOutcome::track)
        .map(|t| t.id.clone())
        .collect()
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-kind counts over one resolution run.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionStats {
    pub total_songs: usize,
    pub exact_matches: usize,
    pub close_matches: usize,
    pub cover_originals: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub elapsed_seconds: f64,
}

impl ResolutionStats {
    pub fn from_outcomes(outcomes: &[MatchOutcome]) -> Self {
        let mut stats = ResolutionStats {
            total_songs: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.kind() {
                ResultKind::ExactMatch => stats.exact_matches += 1,
                ResultKind::CloseMatch => stats.close_matches += 1,
                ResultKind::CoverOriginal => stats.cover_originals += 1,
                ResultKind::Skipped => stats.skipped += 1,
                ResultKind::NotFound => stats.not_found += 1,
            }
        }
        stats
    }

    pub fn resolved(&self) -> usize {
        self.exact_matches + self.close_matches + self.cover_originals
    }

    /// Resolved songs as a percentage of all songs
    pub fn match_rate(&self) -> f64 {
        if self.total_songs == 0 {
            0.0
        } else {
            100.0 * self.resolved() as f64 / self.total_songs as f64
        }
    }

    /// Log stats in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            log::info!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(tape: bool, cover: bool, medley_part: bool) -> Song {
        Song {
            index: 1,
            name: "Song".into(),
            artist_name: "Band".into(),
            original_artist_name: if cover { "Other".into() } else { "Band".into() },
            tape,
            cover,
            medley_part,
        }
    }

    fn track(id: &str) -> CandidateTrack {
        CandidateTrack {
            id: id.into(),
            name: "Song".into(),
            artists: vec!["Band".into()],
            album_name: "Album".into(),
            album_artists: vec![],
            release_type: ReleaseType::Album,
            release_date: "2001".into(),
        }
    }

    #[test]
    fn test_has_result_follows_kind() {
        let s = song(false, false, false);
        assert!(MatchOutcome::exact_match(s.clone(), track("a")).has_result());
        assert!(MatchOutcome::close_match(s.clone(), track("a")).has_result());
        assert!(MatchOutcome::cover_original(s.clone(), track("a")).has_result());
        assert!(!MatchOutcome::skipped(s.clone()).has_result());
        assert!(!MatchOutcome::not_found(s).has_result());
    }

    #[test]
    fn test_query_artist_for_tapes() {
        let mut tape = song(true, true, false);
        assert_eq!(tape.query_artist(), "Other");
        tape.tape = false;
        assert_eq!(tape.query_artist(), "Band");
    }

    #[test]
    fn test_release_type_rank() {
        assert_eq!(serde_json::from_str::<ReleaseType>("\"compilation\"").unwrap(), ReleaseType::Compilation);
        assert!(ReleaseType::Album.rank() < ReleaseType::Single.rank());
        assert!(ReleaseType::Album.rank() < ReleaseType::Compilation.rank());
    }

    #[test]
    fn test_album_artist_fallback() {
        let mut t = track("a");
        assert_eq!(t.album_artist(), "Band");
        t.album_artists = vec!["Various Artists".into()];
        assert_eq!(t.album_artist(), "Various Artists");
    }

    #[test]
    fn test_stats_from_outcomes() {
        let s = song(false, false, false);
        let outcomes = vec![
            MatchOutcome::exact_match(s.clone(), track("a")),
            MatchOutcome::close_match(s.clone(), track("b")),
            MatchOutcome::skipped(s.clone()),
            MatchOutcome::not_found(s),
        ];
        let stats = ResolutionStats::from_outcomes(&outcomes);
        assert_eq!(stats.total_songs, 4);
        assert_eq!(stats.resolved(), 2);
        assert_eq!(stats.match_rate(), 50.0);
        assert_eq!(resolved_track_ids(&outcomes), vec!["a", "b"]);
    }

    #[test]
    fn test_largest_image() {
        let artist = CandidateArtist {
            id: "x".into(),
            name: "Band".into(),
            images: vec![
                ArtistImage { url: "small".into(), width: 160, height: 160 },
                ArtistImage { url: "large".into(), width: 640, height: 640 },
                ArtistImage { url: "medium".into(), width: 320, height: 320 },
            ],
        };
        assert_eq!(artist.largest_image().map(|i| i.url.as_str()), Some("large"));
    }

    #[test]
    fn test_setlist_deserializes_with_defaults() {
        let json = r#"{
            "artist_name": "Band",
            "event_date": "2024-03-09",
            "venue": "Hall",
            "city": "Berlin, Germany",
            "songs": [{"index": 1, "name": "Song", "artist_name": "Band", "original_artist_name": "Band"}]
        }"#;
        let setlist: Setlist = serde_json::from_str(json).unwrap();
        assert_eq!(setlist.tour(), None);
        assert!(setlist.songs[0].is_standalone());
        assert_eq!(setlist.event_date, jiff::civil::date(2024, 3, 9));
    }
}
