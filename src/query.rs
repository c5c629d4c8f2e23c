//! Catalog query construction.
//!
//! Strict queries scope purified names to the artist and track fields;
//! loose queries are plain free text. Both are issued for every song so
//! the ranker sees the union of their candidates, strict ones first.

use crate::normalize::{normalize_punctuation, purify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Field-scoped quoted terms. Higher precision, lower recall.
    Strict,
    /// Free-text concatenation. Recovers titles with apostrophes and
    /// quotation artifacts that strict mode rejects.
    Loose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub mode: QueryMode,
    pub text: String,
}

/// Build a single catalog query for `song_name` by `artist_name`.
///
/// Strict: `artist:"metallica" track:"nothing else matters"`
/// Loose:  `Metallica Nothing Else Matters`
pub fn build_query(song_name: &str, artist_name: &str, strict: bool) -> String {
    if strict {
        format!(
            "artist:\"{}\" track:\"{}\"",
            purify(artist_name),
            purify(song_name)
        )
    } else {
        normalize_punctuation(&format!("{} {}", artist_name, song_name))
    }
}

/// All queries to issue for one song, strict first.
pub fn queries_for(song_name: &str, artist_name: &str, strict_only: bool) -> Vec<SearchQuery> {
    let mut queries = vec![SearchQuery {
        mode: QueryMode::Strict,
        text: build_query(song_name, artist_name, true),
    }];
    if !strict_only {
        queries.push(SearchQuery {
            mode: QueryMode::Loose,
            text: build_query(song_name, artist_name, false),
        });
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_query_is_purified_and_scoped() {
        assert_eq!(
            build_query("Sorry, You're Not a Winner", "Enter Shikari", true),
            "artist:\"enter shikari\" track:\"sorry you re not a winner\""
        );
        assert_eq!(
            build_query("Über sieben Brücken", "Karat", true),
            "artist:\"karat\" track:\"ueber sieben bruecken\""
        );
    }

    #[test]
    fn test_loose_query_is_free_text() {
        assert_eq!(
            build_query("Don\u{2019}t Stop Me Now", "Queen", false),
            "Queen Don't Stop Me Now"
        );
        assert_eq!(build_query("Evil Twin", " D-A-D ", false), "D-A-D Evil Twin");
    }

    #[test]
    fn test_queries_for_issues_both_modes() {
        let queries = queries_for("Ecce Homo", "Finsterforst", false);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].mode, QueryMode::Strict);
        assert_eq!(queries[1].mode, QueryMode::Loose);
        assert_eq!(queries[1].text, "Finsterforst Ecce Homo");
    }

    #[test]
    fn test_queries_for_strict_only() {
        let queries = queries_for("Ecce Homo", "Finsterforst", true);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].mode, QueryMode::Strict);
    }
}
