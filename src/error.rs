//! Error taxonomy for setlist resolution and collection housekeeping.
//!
//! Only `SourceNotFound` and `InsufficientMatches` are meant to reach the
//! requester as ordinary failures. Collaborator errors are wrapped in
//! `CatalogError`, which knows whether a retry is worthwhile.

use thiserror::Error;

use crate::models::MatchOutcome;

/// Failure reported by an external collaborator (catalog, collection store,
/// setlist source).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The platform rejected the call because of request bursts.
    #[error("rate limited by the catalog")]
    RateLimited,
    /// Intermittent "insufficient scope" / "forbidden" answers on mutation calls.
    #[error("insufficient client scope: {0}")]
    Scope(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("catalog request failed: {0}")]
    Request(String),
}

impl CatalogError {
    /// Rate limits and scope hiccups go away on their own; everything else does not.
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::RateLimited | CatalogError::Scope(_))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The setlist id does not resolve, or it resolves to an empty song list.
    #[error("setlist not found: {0}")]
    SourceNotFound(String),

    /// Fewer than one third of the songs could be matched.
    #[error("only {resolved} of {total} songs could be matched")]
    InsufficientMatches { resolved: usize, total: usize },

    /// A mutation call kept failing with transient errors until the retry
    /// budget was spent.
    #[error("catalog call still failing after {attempts} attempts: {source}")]
    TransientCatalog {
        attempts: u32,
        #[source]
        source: CatalogError,
    },

    /// One eviction failed during housekeeping. Logged and skipped by the
    /// cycle itself; exposed so reports can carry the cause.
    #[error("failed to evict collection {collection_id}: {source}")]
    HousekeepingEviction {
        collection_id: String,
        #[source]
        source: CatalogError,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Cancelled before the next song or between retries. Songs resolved
    /// before the cancellation keep their outcomes here.
    #[error("operation cancelled after {} processed songs", .completed.len())]
    Cancelled { completed: Vec<MatchOutcome> },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach `outcomes` to a cancellation raised after resolution had
    /// already finished. Other errors pass through unchanged.
    pub(crate) fn with_outcomes(self, outcomes: &[MatchOutcome]) -> Error {
        match self {
            Error::Cancelled { .. } => Error::Cancelled {
                completed: outcomes.to_vec(),
            },
            other => other,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CatalogError::RateLimited.is_transient());
        assert!(CatalogError::Scope("playlist-modify-public".into()).is_transient());
        assert!(!CatalogError::NotFound("abc".into()).is_transient());
        assert!(!CatalogError::Request("boom".into()).is_transient());
    }

    #[test]
    fn test_cancelled_message() {
        let err = Error::Cancelled { completed: Vec::new() };
        assert_eq!(err.to_string(), "operation cancelled after 0 processed songs");
    }

    #[test]
    fn test_with_outcomes_only_touches_cancellation() {
        let err = Error::Config("bad".into()).with_outcomes(&[]);
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_insufficient_message() {
        let err = Error::InsufficientMatches { resolved: 1, total: 6 };
        assert_eq!(err.to_string(), "only 1 of 6 songs could be matched");
    }
}
