//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CoreError, CoreResult};

/// Title given to the synthetic wallet summing all others
pub const DEFAULT_AGGREGATE_TITLE: &str = "All Wallets";

/// Refresh timing and behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Delay before retrying a request that arrived while a fetch was in flight
    pub retry_interval_ms: u64,
    /// Minimum spacing between the end of one refresh and the start of the next
    pub min_interval_ms: u64,
    /// Delay between the primary-only first load and the full load
    pub progressive_delay_ms: u64,
    /// Load the primary wallet alone on the first refresh
    pub progressive_loading: bool,
    /// Inbound trigger queue size; overflow is coalesced
    pub trigger_capacity: usize,
    /// Published-event queue size per subscriber
    pub event_capacity: usize,
    pub aggregate_title: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 500,
            min_interval_ms: 250,
            progressive_delay_ms: 500,
            progressive_loading: true,
            trigger_capacity: 64,
            event_capacity: 256,
            aggregate_title: DEFAULT_AGGREGATE_TITLE.to_string(),
        }
    }
}

impl RefreshConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn progressive_delay(&self) -> Duration {
        Duration::from_millis(self.progressive_delay_ms)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.retry_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "retry_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.trigger_capacity == 0 || self.event_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "channel capacities must be greater than zero".to_string(),
            ));
        }
        if self.aggregate_title.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "aggregate_title must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
