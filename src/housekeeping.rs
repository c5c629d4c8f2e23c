//! Periodic cleanup of owned collections and dedup cache rebuilds.
//!
//! One cycle walks `Idle → Scanning → (Evicting) → Rebuilt → Idle`:
//!
//! - Scanning lists every owned collection. A failed scan aborts the cycle
//!   and leaves the cache as it was.
//! - Evicting only happens while the account holds more collections than
//!   the target (platform limit minus headroom). Dead collections are
//!   chosen oldest first, at most as many as the overflow, and deleted on
//!   a bounded worker pool. A failed deletion is logged and skipped.
//! - Rebuilt swaps the cache for one built from the survivors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::catalog::CollectionStore;
use crate::dedup::DedupCache;
use crate::error::{Error, Result};
use crate::models::OwnedCollection;
use crate::retry::Cancellation;

/// Maximum number of collections one account may own.
pub const PLATFORM_COLLECTION_LIMIT: usize = 11_000;
/// Collections kept free below the platform limit.
pub const DEFAULT_HEADROOM: usize = 1_000;
pub const DEFAULT_EVICTION_WORKERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HousekeepingState {
    Idle,
    Scanning,
    Evicting,
    Rebuilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub platform_limit: usize,
    pub headroom: usize,
}

impl QuotaPolicy {
    /// Collection count housekeeping tries to stay at or below.
    pub fn target(&self) -> usize {
        self.platform_limit.saturating_sub(self.headroom)
    }

    pub fn overflow(&self, owned: usize) -> usize {
        owned.saturating_sub(self.target())
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            platform_limit: PLATFORM_COLLECTION_LIMIT,
            headroom: DEFAULT_HEADROOM,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Default)]
pub struct HousekeepingReport {
    pub scanned: usize,
    pub evicted: Vec<String>,
    /// One `Error::HousekeepingEviction` per failed deletion.
    pub failures: Vec<Error>,
    /// Collection ids in the cache after the rebuild.
    pub cached: usize,
    pub elapsed: Duration,
}

pub struct Housekeeper<S: CollectionStore + Send + Sync> {
    store: Arc<S>,
    cache: Arc<DedupCache>,
    quota: QuotaPolicy,
    pool: rayon::ThreadPool,
    state: Mutex<HousekeepingState>,
}

impl<S: CollectionStore + Send + Sync> Housekeeper<S> {
    pub fn new(store: Arc<S>, cache: Arc<DedupCache>, quota: QuotaPolicy, workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("evict-{i}"))
            .build()
            .map_err(|e| Error::Config(format!("eviction pool: {e}")))?;
        Ok(Self {
            store,
            cache,
            quota,
            pool,
            state: Mutex::new(HousekeepingState::Idle),
        })
    }

    pub fn state(&self) -> HousekeepingState {
        *self.state.lock()
    }

    /// Run one full cycle.
    pub fn run_cycle(&self) -> Result<HousekeepingReport> {
        let start = Instant::now();
        self.set_state(HousekeepingState::Scanning);
        let owned = match self.store.list_owned() {
            Ok(owned) => owned,
            Err(e) => {
                log::warn!("Housekeeping scan failed, keeping current cache: {}", e);
                self.set_state(HousekeepingState::Idle);
                return Err(e.into());
            }
        };

        let mut report = HousekeepingReport {
            scanned: owned.len(),
            ..Default::default()
        };

        let victims = select_victims(&owned, self.quota);
        if !victims.is_empty() {
            self.set_state(HousekeepingState::Evicting);
            log::info!(
                "Owning {} collections (target {}), evicting {}",
                owned.len(),
                self.quota.target(),
                victims.len()
            );
            self.evict(&victims, &mut report);
        }

        let survivors: Vec<OwnedCollection> = owned
            .into_iter()
            .filter(|c| !report.evicted.contains(&c.id))
            .collect();
        self.cache.rebuild(&survivors);
        self.set_state(HousekeepingState::Rebuilt);
        report.cached = self.cache.collection_count();
        report.elapsed = start.elapsed();

        log::info!(
            "Housekeeping: scanned {}, evicted {}, failed {}, cached {} in {:.2}s",
            report.scanned,
            report.evicted.len(),
            report.failures.len(),
            report.cached,
            report.elapsed.as_secs_f64()
        );
        self.set_state(HousekeepingState::Idle);
        Ok(report)
    }

    /// Run a cycle now and then every `interval` until `cancel` fires.
    /// Returns the number of cycles started.
    pub fn run_schedule(&self, interval: Duration, cancel: &Cancellation) -> usize {
        let ticker = tick(interval);
        let mut cycles = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            cycles += 1;
            if let Err(e) = self.run_cycle() {
                log::warn!("Housekeeping cycle {} failed: {}", cycles, e);
            }
            select! {
                recv(cancel.receiver()) -> _ => break,
                recv(ticker) -> _ => {}
            }
        }
        log::info!("Housekeeping stopped after {} cycles", cycles);
        cycles
    }

    fn evict(&self, victims: &[&OwnedCollection], report: &mut HousekeepingReport) {
        let store = &self.store;
        let results: Vec<(String, std::result::Result<(), _>)> = self.pool.install(|| {
            victims
                .par_iter()
                .map(|c| (c.id.clone(), store.delete(&c.id)))
                .collect()
        });
        for (collection_id, result) in results {
            match result {
                Ok(()) => report.evicted.push(collection_id),
                Err(source) => {
                    let err = Error::HousekeepingEviction { collection_id, source };
                    log::warn!("{}", err);
                    report.failures.push(err);
                }
            }
        }
    }

    fn set_state(&self, next: HousekeepingState) {
        let mut state = self.state.lock();
        log::debug!("Housekeeping {:?} -> {:?}", *state, next);
        *state = next;
    }
}

/// Dead collections to delete, oldest first, capped at the overflow.
/// `owned` is in listing order (newest first).
pub fn select_victims(owned: &[OwnedCollection], quota: QuotaPolicy) -> Vec<&OwnedCollection> {
    let overflow = quota.overflow(owned.len());
    if overflow == 0 {
        return Vec::new();
    }
    owned
        .iter()
        .rev()
        .filter(|c| c.is_dead())
        .take(overflow)
        .collect()
}
