//! In-memory wallet store
//!
//! Keeps wallets in insertion order behind a single lock and broadcasts a
//! [`WalletChange`] after every mutation.

use alloy_primitives::Address;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use balance_core::{Wallet, WalletSet};

use crate::traits::{WalletChange, WalletStore};

const CHANGE_CAPACITY: usize = 128;

#[derive(Debug, Default)]
struct Inner {
    wallets: Vec<Wallet>,
    primary: Option<Address>,
}

/// Wallet store backed by memory
#[derive(Debug)]
pub struct MemoryWalletStore {
    inner: RwLock<Inner>,
    changes: broadcast::Sender<WalletChange>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            changes,
        }
    }

    /// Seed a store without emitting notifications
    pub fn with_wallets(wallets: Vec<Wallet>, primary: Option<Address>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            inner.wallets = wallets;
            inner.primary = primary;
        }
        store
    }

    /// Insert a wallet, replacing any stored wallet with the same address
    pub fn add(&self, wallet: Wallet) {
        let address = wallet.address;
        let change = {
            let mut inner = self.inner.write();
            match inner.wallets.iter_mut().find(|w| w.address == address) {
                Some(existing) => {
                    *existing = wallet;
                    WalletChange::Changed(address)
                }
                None => {
                    inner.wallets.push(wallet);
                    WalletChange::Added(address)
                }
            }
        };
        self.notify(change);
    }

    /// Replace a stored wallet; returns false when the address is unknown
    pub fn update(&self, wallet: Wallet) -> bool {
        let address = wallet.address;
        let replaced = {
            let mut inner = self.inner.write();
            match inner.wallets.iter_mut().find(|w| w.address == address) {
                Some(existing) => {
                    *existing = wallet;
                    true
                }
                None => false,
            }
        };

        if replaced {
            self.notify(WalletChange::Changed(address));
        }
        replaced
    }

    pub fn remove(&self, address: &Address) -> Option<Wallet> {
        let removed = {
            let mut inner = self.inner.write();
            let position = inner.wallets.iter().position(|w| w.address == *address)?;
            if inner.primary == Some(*address) {
                inner.primary = None;
            }
            inner.wallets.remove(position)
        };

        self.notify(WalletChange::Removed(*address));
        Some(removed)
    }

    /// Designate the primary wallet; returns false when the address is unknown
    pub fn set_primary(&self, address: Address) -> bool {
        {
            let mut inner = self.inner.write();
            if !inner.wallets.iter().any(|w| w.address == address) {
                return false;
            }
            inner.primary = Some(address);
        }
        self.notify(WalletChange::Changed(address));
        true
    }

    pub fn primary_address(&self) -> Option<Address> {
        self.inner.read().primary
    }

    fn notify(&self, change: WalletChange) {
        // No subscribers is fine; nobody is waiting for a refresh yet.
        if self.changes.send(change).is_err() {
            debug!("Wallet change {:?} had no subscribers", change);
        }
    }
}

impl Default for MemoryWalletStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletStore for MemoryWalletStore {
    fn count(&self) -> usize {
        self.inner.read().wallets.len()
    }

    /// Falls back to the first stored wallet when no primary is designated
    fn load_primary(&self) -> Option<Wallet> {
        let inner = self.inner.read();
        inner
            .primary
            .and_then(|primary| inner.wallets.iter().find(|w| w.address == primary))
            .or_else(|| inner.wallets.first())
            .cloned()
    }

    fn load_all(&self) -> WalletSet {
        self.inner.read().wallets.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletChange> {
        self.changes.subscribe()
    }
}
