//! Refresh admission: debounce, coalescing and retry timing
//!
//! The scheduler never reads the clock; callers pass `now` in. It owns the one
//! pending-retry slot, so any number of rejected requests collapse into a
//! single retry.

use std::time::Duration;
use tokio::time::Instant;

use balance_core::RefreshConfig;

use crate::state::RefreshState;

/// A deferred retry. Only the most recently armed one is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRetry {
    pub id: u64,
    pub due: Instant,
}

/// Outcome of a refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start a refresh now; the scheduler is now loading
    ProceedNow,
    /// Do not fetch now; a retry is armed for `due`
    DeferUntil(PendingRetry),
    /// The scheduler is closed
    Dropped,
}

#[derive(Debug)]
pub struct RefreshScheduler {
    retry_interval: Duration,
    min_interval: Duration,
    state: RefreshState,
    pending: Option<PendingRetry>,
    next_retry_id: u64,
    closed: bool,
}

impl RefreshScheduler {
    pub fn new(retry_interval: Duration, min_interval: Duration) -> Self {
        Self {
            retry_interval,
            min_interval,
            state: RefreshState::default(),
            pending: None,
            next_retry_id: 0,
            closed: false,
        }
    }

    pub fn from_config(config: &RefreshConfig) -> Self {
        Self::new(config.retry_interval(), config.min_interval())
    }

    /// Decide what to do with a refresh request.
    ///
    /// An empty store proceeds immediately unless a fetch is in flight, so the
    /// caller can publish an empty snapshot without waiting out the minimum
    /// interval.
    pub fn request(&mut self, now: Instant, wallet_count: usize) -> Decision {
        if self.closed {
            return Decision::Dropped;
        }

        if self.state.loading {
            return self.defer(now + self.retry_interval);
        }

        if wallet_count > 0 {
            if let Some(elapsed) = self.state.since_completed(now) {
                if elapsed < self.min_interval {
                    return self.defer(now + (self.min_interval - elapsed));
                }
            }
        }

        // The refresh about to start covers whatever the pending retry was for
        self.pending = None;
        self.state.loading = true;
        Decision::ProceedNow
    }

    /// Arm the retry slot without a request, replacing any pending retry
    pub fn schedule_follow_up(&mut self, now: Instant, delay: Duration) -> Option<PendingRetry> {
        if self.closed {
            return None;
        }
        match self.defer(now + delay) {
            Decision::DeferUntil(retry) => Some(retry),
            _ => None,
        }
    }

    /// Consume the pending retry if `id` is still the live one
    pub fn fire(&mut self, id: u64) -> bool {
        match self.pending {
            Some(retry) if retry.id == id => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Leave the loading state and start the minimum interval
    pub fn mark_completed(&mut self, now: Instant) {
        self.state.loading = false;
        self.state.last_completed = Some(now);
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.pending = None;
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    pub fn pending(&self) -> Option<PendingRetry> {
        self.pending
    }

    fn defer(&mut self, due: Instant) -> Decision {
        self.next_retry_id += 1;
        let retry = PendingRetry {
            id: self.next_retry_id,
            due,
        };
        self.pending = Some(retry);
        Decision::DeferUntil(retry)
    }
}
