//! Upstream call admission: concurrency slots, a rolling per-minute window,
//! and exponential backoff driven by explicit rate-limit signals.
//!
//! A caller holds a [`RateLimitPermit`] for the duration of one upstream
//! call; dropping the permit releases the slot and records the completion,
//! so every exit path (errors, cancellation, panics) releases exactly once.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ScrapeError;

/// Rolling admission window.
const WINDOW: Duration = Duration::from_secs(60);
/// Window for the completions-per-second stat.
const RATE_WINDOW: Duration = Duration::from_secs(30);
/// First backoff delay; doubles per level.
const BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Upper bound on a single backoff delay.
const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Backoff level saturates here.
const MAX_BACKOFF_LEVEL: u32 = 6;

#[derive(Debug, Default)]
struct LimiterState {
    /// Admission timestamps within the last [`WINDOW`].
    started: VecDeque<Instant>,
    /// Completion timestamps within the last [`RATE_WINDOW`].
    completed: VecDeque<Instant>,
    backoff_level: u32,
    /// No admission happens before this instant. Only ever moves forward
    /// while backoff is active.
    backoff_until: Option<Instant>,
    total_started: u64,
    total_completed: u64,
}

impl LimiterState {
    // An admission expires exactly WINDOW after it was recorded, so a
    // waiter sleeping until `oldest + WINDOW` is admitted on wakeup.
    fn trim(&mut self, now: Instant) {
        while let Some(&t) = self.started.front() {
            if now.duration_since(t) >= WINDOW {
                self.started.pop_front();
            } else {
                break;
            }
        }
        while let Some(&t) = self.completed.front() {
            if now.duration_since(t) >= RATE_WINDOW {
                self.completed.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Snapshot of limiter activity.
#[derive(Debug, Clone)]
pub struct LimiterStats {
    /// Upstream calls currently holding a thread slot.
    pub active_threads: usize,
    /// Calls admitted within the last rolling minute.
    pub started_last_minute: usize,
    pub backoff_level: u32,
    /// Time until the backoff deadline, zero when none is active.
    pub backoff_remaining: Duration,
    pub total_completed: u64,
    /// Completions per second over a 30-second sliding window.
    pub per_second: f64,
    /// Admitted but not yet completed.
    pub in_flight: u64,
}

/// Bounds concurrent upstream calls and the per-minute request rate.
#[derive(Debug)]
pub struct RateLimiter {
    max_threads: usize,
    max_per_minute: usize,
    semaphore: Arc<Semaphore>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(max_threads: usize, max_per_minute: usize) -> Self {
        let max_threads = max_threads.max(1);
        Self {
            max_threads,
            max_per_minute: max_per_minute.max(1),
            semaphore: Arc::new(Semaphore::new(max_threads)),
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Wait for a thread slot, window room, and any active backoff to elapse.
    ///
    /// Returns a permit whose drop releases the slot. Cancellation at any
    /// wait point returns [`ScrapeError::Cancelled`] without holding a slot.
    pub async fn acquire(
        self: &Arc<Self>,
        cancel: &CancellationToken,
    ) -> Result<RateLimitPermit, ScrapeError> {
        let permit = tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| ScrapeError::Api("rate limiter shut down".to_string()))?
            }
        };

        loop {
            let wait_until = {
                let mut state = self.state.lock();
                let now = Instant::now();
                state.trim(now);
                if let Some(deadline) = state.backoff_until.filter(|d| *d > now) {
                    Some(deadline)
                } else if state.started.len() >= self.max_per_minute {
                    // Window full: sleep until the oldest admission ages out.
                    let oldest = state.started.front().copied().unwrap_or(now);
                    Some(oldest + WINDOW)
                } else {
                    state.started.push_back(now);
                    state.total_started += 1;
                    None
                }
            };

            match wait_until {
                None => {
                    return Ok(RateLimitPermit {
                        limiter: Arc::clone(self),
                        _permit: permit,
                    });
                }
                Some(deadline) => {
                    tokio::select! {
                        // Dropping `permit` here returns the slot.
                        _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
            }
        }
    }

    /// Raise the backoff level (saturating) and push the admission deadline
    /// to `base * 2^(level-1)` from now, clamped. Deadlines never move
    /// backwards while backoff is active.
    pub fn trigger_backoff(&self) {
        let mut state = self.state.lock();
        state.backoff_level = (state.backoff_level + 1).min(MAX_BACKOFF_LEVEL);
        let delay = BACKOFF_BASE
            .saturating_mul(1 << (state.backoff_level - 1))
            .min(BACKOFF_CAP);
        let deadline = Instant::now() + delay;
        state.backoff_until = match state.backoff_until {
            Some(existing) if existing > deadline => Some(existing),
            _ => Some(deadline),
        };
    }

    /// Clear backoff after a successful upstream response.
    pub fn reset_backoff(&self) {
        let mut state = self.state.lock();
        state.backoff_level = 0;
        state.backoff_until = None;
    }

    pub fn stats(&self) -> LimiterStats {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.trim(now);
        let backoff_remaining = state
            .backoff_until
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or_default();
        LimiterStats {
            active_threads: self.max_threads - self.semaphore.available_permits(),
            started_last_minute: state.started.len(),
            backoff_level: state.backoff_level,
            backoff_remaining,
            total_completed: state.total_completed,
            per_second: state.completed.len() as f64 / RATE_WINDOW.as_secs_f64(),
            in_flight: state.total_started - state.total_completed,
        }
    }
}

/// Held for the duration of one upstream call; drop releases the slot.
#[derive(Debug)]
pub struct RateLimitPermit {
    limiter: Arc<RateLimiter>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for RateLimitPermit {
    fn drop(&mut self) {
        let mut state = self.limiter.state.lock();
        let now = Instant::now();
        state.completed.push_back(now);
        state.total_completed += 1;
        state.trim(now);
    }
}

#[cfg(test)]
#[path = "tests/limiter_tests.rs"]
mod tests;
