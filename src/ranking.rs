//! Candidate ranking against a target song.
//!
//! The ranker narrows the catalog candidates down to plausible matches
//! (same artist, not an unwanted variant, title contained), orders them
//! oldest release first and then walks the tie-break tiers, returning on
//! the first hit:
//!
//! 1. full-length album, artist and title equal            → exact
//! 2. title equal, any release                              → exact
//! 3. full-length album, artist and title start-contained   → close
//! 4. title start-contained, any release                    → close
//! 5. title contained after purification                    → close
//! 6. title similarity above the fuzzy threshold (optional) → close
//!
//! If nothing fires, the whole walk is repeated once with live and other
//! alternate recordings admitted.

use strsim::normalized_levenshtein;

use crate::models::{CandidateTrack, MatchOutcome, ResultKind, Song};
use crate::normalize::{
    contains_normalized, equals_ignore_case, is_alternate_version_marker, purify,
    starts_contained_normalized,
};

/// Tunable parts of the ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingPolicy {
    /// Allow the purified-substring tier. Off for strict-only searches.
    pub allow_substring: bool,
    /// Minimum normalized Levenshtein similarity (0.0 to 1.0) for the fuzzy
    /// tier. `None` disables fuzzy title matching entirely.
    pub fuzzy_title_threshold: Option<f64>,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            allow_substring: true,
            fuzzy_title_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ranker {
    policy: RankingPolicy,
}

impl Ranker {
    pub fn new(policy: RankingPolicy) -> Self {
        Self { policy }
    }

    /// Ranker for one request: strict-only searches never use the loose tiers.
    pub fn for_strict_only(&self, strict_only: bool) -> Ranker {
        if !strict_only {
            return self.clone();
        }
        Ranker::new(RankingPolicy {
            allow_substring: false,
            fuzzy_title_threshold: None,
        })
    }

    /// Rank `candidates` against the song's own name.
    pub fn rank(&self, song: &Song, candidates: &[CandidateTrack], query_artist: &str) -> MatchOutcome {
        self.rank_title(song, &song.name, candidates, query_artist)
    }

    /// Rank `candidates` against `title`, which may differ from the song
    /// name (e.g. with a leading article removed).
    pub fn rank_title(
        &self,
        song: &Song,
        title: &str,
        candidates: &[CandidateTrack],
        query_artist: &str,
    ) -> MatchOutcome {
        for allow_alternates in [false, true] {
            let shortlist = self.shortlist(title, candidates, query_artist, allow_alternates);
            if let Some((track, kind)) = self.pick(title, query_artist, &shortlist) {
                log::debug!(
                    "'{}' → '{}' by '{}' ({:?}, alternates allowed: {})",
                    title,
                    track.name,
                    track.primary_artist(),
                    kind,
                    allow_alternates
                );
                let song = song.clone();
                let track = track.clone();
                return match kind {
                    ResultKind::ExactMatch => MatchOutcome::exact_match(song, track),
                    _ => MatchOutcome::close_match(song, track),
                };
            }
        }
        MatchOutcome::not_found(song.clone())
    }

    /// Steps 1-4: artist filter, variant filter, title filter, oldest first.
    fn shortlist<'c>(
        &self,
        title: &str,
        candidates: &'c [CandidateTrack],
        query_artist: &str,
        allow_alternates: bool,
    ) -> Vec<&'c CandidateTrack> {
        let mut matching: Vec<&CandidateTrack> = candidates
            .iter()
            .filter(|t| starts_contained_normalized(query_artist, t.primary_artist()))
            .filter(|t| allow_alternates || !is_alternate_version_marker(&t.name, title))
            .filter(|t| contains_normalized(&t.name, title) || self.is_fuzzy_match(&t.name, title))
            .collect();
        // Stable: same date and release type keep strict-query order
        matching.sort_by(|a, b| {
            a.release_date
                .cmp(&b.release_date)
                .then_with(|| a.release_type.rank().cmp(&b.release_type.rank()))
        });
        matching
    }

    fn pick<'c>(
        &self,
        title: &str,
        query_artist: &str,
        shortlist: &[&'c CandidateTrack],
    ) -> Option<(&'c CandidateTrack, ResultKind)> {
        let find = |pred: &dyn Fn(&CandidateTrack) -> bool| shortlist.iter().copied().find(|t| pred(t));

        if let Some(t) = find(&|t| {
            t.is_on_album()
                && equals_ignore_case(query_artist, t.album_artist())
                && equals_ignore_case(&t.name, title)
        }) {
            return Some((t, ResultKind::ExactMatch));
        }
        if let Some(t) = find(&|t| equals_ignore_case(&t.name, title)) {
            return Some((t, ResultKind::ExactMatch));
        }
        if let Some(t) = find(&|t| {
            t.is_on_album()
                && starts_contained_normalized(query_artist, t.album_artist())
                && starts_contained_normalized(&t.name, title)
        }) {
            return Some((t, ResultKind::CloseMatch));
        }
        if let Some(t) = find(&|t| starts_contained_normalized(&t.name, title)) {
            return Some((t, ResultKind::CloseMatch));
        }
        if self.policy.allow_substring {
            if let Some(t) = find(&|t| contains_normalized(&t.name, title)) {
                return Some((t, ResultKind::CloseMatch));
            }
            if let Some(t) = find(&|t| self.is_fuzzy_match(&t.name, title)) {
                return Some((t, ResultKind::CloseMatch));
            }
        }
        None
    }

    fn is_fuzzy_match(&self, candidate_title: &str, title: &str) -> bool {
        match self.policy.fuzzy_title_threshold {
            Some(threshold) if self.policy.allow_substring => {
                normalized_levenshtein(&purify(candidate_title), &purify(title)) >= threshold
            }
            _ => false,
        }
    }
}
