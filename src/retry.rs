//! Bounded retries and cooperative cancellation.
//!
//! Cancellation is a disconnected channel: once the `CancelHandle` fires,
//! every cloned `Cancellation` observes it, and any pending retry delay
//! wakes up immediately instead of sleeping out its interval.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;

// ============================================================================
// Cancellation
// ============================================================================

/// Owner side of a cancellation token.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<Mutex<Option<Sender<()>>>>,
}

impl CancelHandle {
    /// Fire the token. Idempotent.
    pub fn cancel(&self) {
        self.sender.lock().take();
    }
}

/// Observer side of a cancellation token.
#[derive(Debug, Clone)]
pub struct Cancellation {
    receiver: Receiver<()>,
}

impl Cancellation {
    pub fn new() -> (CancelHandle, Cancellation) {
        let (tx, rx) = unbounded();
        (
            CancelHandle {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            Cancellation { receiver: rx },
        )
    }

    /// A token that never fires.
    pub fn never() -> Cancellation {
        Cancellation { receiver: never() }
    }

    pub fn is_cancelled(&self) -> bool {
        // Nothing is ever sent; the only event is the sender going away.
        matches!(
            self.receiver.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    /// Wait for `delay` unless cancelled first. Returns `false` on cancellation.
    pub fn wait(&self, delay: Duration) -> bool {
        select! {
            recv(self.receiver) -> _ => false,
            default(delay) => true,
        }
    }

    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Cancellation::never()
    }
}

// ============================================================================
// Retry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(500),
        }
    }
}

/// How a retried operation ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed with a transient error.
    Exhausted { last_error: E, attempts: u32 },
    /// An attempt failed with an error not worth retrying.
    Aborted { error: E, attempts: u32 },
    Cancelled { attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Aborted { attempts, .. }
            | RetryOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }
}

/// Run `op` until it succeeds, fails permanently, runs out of attempts or
/// is cancelled. `op` receives the 1-based attempt number.
pub fn retry<T, E>(
    policy: RetryPolicy,
    cancel: &Cancellation,
    is_transient: impl Fn(&E) -> bool,
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> RetryOutcome<T, E>
where
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled { attempts: attempt };
        }
        attempt += 1;
        match op(attempt) {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt,
                }
            }
            Err(error) if !is_transient(&error) => {
                return RetryOutcome::Aborted {
                    error,
                    attempts: attempt,
                }
            }
            Err(error) if attempt >= max_attempts => {
                return RetryOutcome::Exhausted {
                    last_error: error,
                    attempts: attempt,
                }
            }
            Err(error) => {
                log::debug!("Attempt {}/{} failed: {}", attempt, max_attempts, error);
                if !cancel.wait(policy.delay) {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use std::time::Instant;

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 10,
            delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_success_after_transient_failures() {
        let outcome = retry(quick(), &Cancellation::never(), CatalogError::is_transient, |attempt| {
            if attempt < 3 {
                Err(CatalogError::RateLimited)
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(outcome, RetryOutcome::Success { value: 3, attempts: 3 });
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let mut calls = 0;
        let outcome: RetryOutcome<(), _> =
            retry(quick(), &Cancellation::never(), CatalogError::is_transient, |_| {
                calls += 1;
                Err(CatalogError::Scope("forbidden".into()))
            });
        assert_eq!(calls, 10);
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 10, .. }));
    }

    #[test]
    fn test_permanent_error_aborts_immediately() {
        let outcome: RetryOutcome<(), _> =
            retry(quick(), &Cancellation::never(), CatalogError::is_transient, |_| {
                Err(CatalogError::NotFound("playlist".into()))
            });
        assert_eq!(outcome.attempts(), 1);
        assert!(matches!(outcome, RetryOutcome::Aborted { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let (handle, cancel) = Cancellation::new();
        handle.cancel();
        let outcome: RetryOutcome<(), CatalogError> =
            retry(quick(), &cancel, CatalogError::is_transient, |_| Ok(()));
        assert_eq!(outcome, RetryOutcome::Cancelled { attempts: 0 });
    }

    #[test]
    fn test_cancel_interrupts_delay() {
        let (handle, cancel) = Cancellation::new();
        let policy = RetryPolicy {
            max_attempts: 10,
            delay: Duration::from_secs(60),
        };
        let start = Instant::now();
        let outcome: RetryOutcome<(), _> = retry(policy, &cancel, CatalogError::is_transient, |_| {
            handle.cancel();
            Err(CatalogError::RateLimited)
        });
        assert_eq!(outcome, RetryOutcome::Cancelled { attempts: 1 });
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancellation_observed_by_clones() {
        let (handle, cancel) = Cancellation::new();
        let other = cancel.clone();
        assert!(!cancel.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(cancel.is_cancelled());
        assert!(other.is_cancelled());
        assert!(!Cancellation::never().is_cancelled());
    }
}
