//! Token bucket with reservation-based waiting.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// A token bucket refilled at `refill_rate` tokens per second up to `burst`.
///
/// Waiters reserve a token up front, possibly driving the balance negative,
/// and sleep until their reservation is covered. Reservations are served in
/// the order they were taken.
pub struct TokenBucket {
    refill_rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(refill_rate: f64, burst: u32) -> Self {
        let burst = f64::from(burst);
        Self {
            refill_rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_update: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_update).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.burst);
        state.last_update = now;
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Reserve a token and return how long the caller must wait for it.
    fn reserve(&self) -> Duration {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens -= 1.0;
        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-state.tokens / self.refill_rate).unwrap_or(Duration::MAX)
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        state.tokens = (state.tokens + 1.0).min(self.burst);
    }

    /// Wait for a token.
    ///
    /// Returns how long the caller was held back, or `None` if `cancel` fired
    /// first. A reservation that is not waited out, whether through `cancel`
    /// or because the future was dropped, is handed back to the bucket.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<Duration> {
        if cancel.is_cancelled() {
            return None;
        }

        let wait = self.reserve();
        if wait.is_zero() {
            return Some(Duration::ZERO);
        }

        let reservation = Reservation {
            bucket: self,
            pending: true,
        };
        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                reservation.complete();
                Some(wait)
            }
            _ = cancel.cancelled() => None,
        }
    }

    /// Refill to full capacity.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.tokens = self.burst;
        state.last_update = Instant::now();
    }

    /// Tokens currently available; negative while reservations are pending.
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn burst(&self) -> u32 {
        self.burst as u32
    }
}

/// A token taken ahead of time, released on drop unless completed.
struct Reservation<'a> {
    bucket: &'a TokenBucket,
    pending: bool,
}

impl Reservation<'_> {
    fn complete(mut self) {
        self.pending = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.pending {
            self.bucket.release();
        }
    }
}

impl fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("refill_rate", &self.refill_rate())
            .field("burst", &self.burst())
            .finish_non_exhaustive()
    }
}
