//! Engine configuration, loaded from TOML.
//!
//! Every key is optional; missing sections fall back to the defaults the
//! engine uses without a config file.
//!
//! ```toml
//! [options]
//! include_cover_originals = true
//!
//! [ranking]
//! fuzzy_title_threshold = 0.9
//!
//! [retry]
//! max_attempts = 10
//! delay_ms = 500
//!
//! [housekeeping]
//! platform_limit = 11000
//! headroom = 1000
//! eviction_workers = 2
//! interval_secs = 86400
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::housekeeping::{QuotaPolicy, DEFAULT_EVICTION_WORKERS, DEFAULT_HEADROOM, PLATFORM_COLLECTION_LIMIT};
use crate::models::ResolutionOptions;
use crate::ranking::RankingPolicy;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Defaults for requests that do not carry their own options.
    pub options: ResolutionOptions,
    pub ranking: RankingConfig,
    pub retry: RetryConfig,
    pub housekeeping: HousekeepingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingConfig {
    pub fuzzy_title_threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            delay_ms: policy.delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HousekeepingConfig {
    pub platform_limit: usize,
    pub headroom: usize,
    pub eviction_workers: usize,
    pub interval_secs: u64,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            platform_limit: PLATFORM_COLLECTION_LIMIT,
            headroom: DEFAULT_HEADROOM,
            eviction_workers: DEFAULT_EVICTION_WORKERS,
            interval_secs: 86_400,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.ranking.fuzzy_title_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::Config(format!(
                    "fuzzy_title_threshold must be within 0.0..=1.0, got {threshold}"
                )));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.housekeeping.headroom > self.housekeeping.platform_limit {
            return Err(Error::Config(format!(
                "housekeeping.headroom ({}) exceeds platform_limit ({})",
                self.housekeeping.headroom, self.housekeeping.platform_limit
            )));
        }
        if self.housekeeping.eviction_workers == 0 {
            return Err(Error::Config("housekeeping.eviction_workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn ranking_policy(&self) -> RankingPolicy {
        RankingPolicy {
            fuzzy_title_threshold: self.ranking.fuzzy_title_threshold,
            ..Default::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            platform_limit: self.housekeeping.platform_limit,
            headroom: self.housekeeping.headroom,
        }
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.quota_policy(), QuotaPolicy::default());
        assert_eq!(config.ranking_policy(), RankingPolicy::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::parse(
            r#"
            [options]
            strict_search_only = true

            [ranking]
            fuzzy_title_threshold = 0.85

            [housekeeping]
            headroom = 500
            "#,
        )
        .unwrap();
        assert!(config.options.strict_search_only);
        assert!(config.options.include_cover_originals);
        assert_eq!(config.ranking_policy().fuzzy_title_threshold, Some(0.85));
        assert_eq!(config.quota_policy().target(), 10_500);
        assert_eq!(config.housekeeping.eviction_workers, DEFAULT_EVICTION_WORKERS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for raw in [
            "[ranking]\nfuzzy_title_threshold = 1.5",
            "[retry]\nmax_attempts = 0",
            "[housekeeping]\nplatform_limit = 10\nheadroom = 20",
            "[housekeeping]\neviction_workers = 0",
            "[unknown]\nkey = 1",
        ] {
            assert!(matches!(EngineConfig::parse(raw), Err(Error::Config(_))), "{raw}");
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_attempts = 3\ndelay_ms = 20").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.retry_policy(),
            RetryPolicy { max_attempts: 3, delay: Duration::from_millis(20) }
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
