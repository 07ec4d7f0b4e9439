//! Refresh state owned by the coordinator

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Scheduler-side state: loading flag and last completion
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshState {
    pub loading: bool,
    pub last_completed: Option<Instant>,
}

impl RefreshState {
    /// Time since the last completed refresh, `None` if none completed yet
    pub fn since_completed(&self, now: Instant) -> Option<std::time::Duration> {
        self.last_completed
            .map(|last| now.saturating_duration_since(last))
    }
}

/// Observer-facing view of the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    pub loading: bool,
    pub first_load_completed: bool,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub retry_pending: bool,
    pub cycles_published: u64,
    pub cycles_aborted: u64,
}
