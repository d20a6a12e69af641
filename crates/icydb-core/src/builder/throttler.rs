//! Module: builder::throttler
//! Responsibility: AIMD-style adaptive batch sizing and backoff for the
//! online builder (spec.md §4.4 step 4: "success → grow batch, failure →
//! shrink batch and back off").
//! Does not own: error classification beyond retryable/non-retryable —
//! that's `InternalError::is_transient()`.
//! Boundary: pure state machine; does not itself sleep. The driver reads
//! `sleep` after a failure and is responsible for actually waiting.

use std::time::Duration;

const MIN_BATCH: usize = 16;
const MAX_BATCH: usize = 10_000;
const GROW_STEP: usize = 64;
const MAX_SLEEP: Duration = Duration::from_secs(30);
const BASE_SLEEP: Duration = Duration::from_millis(50);

///
/// Throttler
///
/// Additive increase on success (batch grows by a fixed step, sleep resets
/// to zero); multiplicative decrease on failure (batch halves, sleep
/// doubles from a floor). A non-retryable failure still shrinks the batch
/// (the batch itself may be implicated) but the caller decides whether to
/// keep looping at all.
///

#[derive(Clone, Debug)]
pub struct Throttler {
    pub batch_size: usize,
    pub sleep: Duration,
}

impl Default for Throttler {
    fn default() -> Self {
        Self {
            batch_size: MIN_BATCH * 4,
            sleep: Duration::ZERO,
        }
    }
}

impl Throttler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(&mut self) {
        self.batch_size = (self.batch_size + GROW_STEP).min(MAX_BATCH);
        self.sleep = Duration::ZERO;
    }

    pub fn on_failure(&mut self, retryable: bool) {
        self.batch_size = (self.batch_size / 2).max(MIN_BATCH);
        if retryable {
            self.sleep = self.sleep.saturating_mul(2).max(BASE_SLEEP).min(MAX_SLEEP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_grows_batch_and_clears_sleep() {
        let mut t = Throttler::new();
        t.sleep = Duration::from_secs(1);
        let before = t.batch_size;
        t.on_success();
        assert!(t.batch_size > before);
        assert_eq!(t.sleep, Duration::ZERO);
    }

    #[test]
    fn failure_shrinks_batch_and_grows_sleep_only_if_retryable() {
        let mut t = Throttler::new();
        let before = t.batch_size;
        t.on_failure(true);
        assert!(t.batch_size < before);
        assert!(t.sleep > Duration::ZERO);

        let mut t2 = Throttler::new();
        t2.on_failure(false);
        assert_eq!(t2.sleep, Duration::ZERO);
    }

    #[test]
    fn batch_size_never_drops_below_the_floor() {
        let mut t = Throttler::new();
        for _ in 0..20 {
            t.on_failure(true);
        }
        assert_eq!(t.batch_size, MIN_BATCH);
    }
}
