//! Collaborators the coordinator depends on

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use balance_core::{Wallet, WalletSet};

/// Mutation notification emitted by a wallet store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletChange {
    Added(Address),
    Changed(Address),
    Removed(Address),
}

impl WalletChange {
    pub fn address(&self) -> Address {
        match self {
            WalletChange::Added(a) | WalletChange::Changed(a) | WalletChange::Removed(a) => *a,
        }
    }
}

/// Persistent wallet storage
pub trait WalletStore: Send + Sync {
    fn count(&self) -> usize;

    /// The designated primary wallet, if any wallet is stored
    fn load_primary(&self) -> Option<Wallet>;

    fn load_all(&self) -> WalletSet;

    /// Subscribe to add/change/remove notifications
    fn subscribe(&self) -> broadcast::Receiver<WalletChange>;
}

/// Fills in balances for a wallet set.
///
/// Must answer with every input wallet, even when the remote source fails;
/// stale values are acceptable.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn enrich(&self, wallets: WalletSet) -> WalletSet;
}

/// Fills in CDPs for a wallet set. Same completeness contract as
/// [`BalanceProvider`].
#[async_trait]
pub trait CdpProvider: Send + Sync {
    async fn enrich(&self, wallets: WalletSet) -> WalletSet;
}
