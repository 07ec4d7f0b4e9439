//! Published refresh results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{aggregate, Wallet, WalletSet};

/// Result of one refresh cycle, replaced as a whole on every publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSnapshot {
    /// Cycle that produced this snapshot; 0 before the first publish
    pub cycle: u64,
    pub wallets: WalletSet,
    /// Present iff `wallets` holds more than one entry
    pub aggregated: Option<Wallet>,
    pub published_at: DateTime<Utc>,
}

impl RefreshSnapshot {
    pub fn empty(cycle: u64) -> Self {
        Self {
            cycle,
            wallets: vec![],
            aggregated: None,
            published_at: Utc::now(),
        }
    }

    /// Build a snapshot, computing the aggregate when there is more than one wallet
    pub fn assemble(cycle: u64, wallets: WalletSet, aggregate_title: &str) -> Self {
        let aggregated = if wallets.len() > 1 {
            aggregate(&wallets, aggregate_title)
        } else {
            None
        };

        Self {
            cycle,
            wallets,
            aggregated,
            published_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    /// Wallets in presentation order: the aggregate first, then each wallet
    pub fn tabs(&self) -> impl Iterator<Item = &Wallet> {
        self.aggregated.iter().chain(self.wallets.iter())
    }
}

impl Default for RefreshSnapshot {
    fn default() -> Self {
        Self::empty(0)
    }
}
