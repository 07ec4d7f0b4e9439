//! Wallet balance refresh coordination
//!
//! Features:
//! - Debounced, coalesced refresh requests from timers, users and storage
//! - Concurrent balance and CDP enrichment joined before merging
//! - Progressive loading: primary wallet first, then the full set
//! - Atomic snapshot publishing over a watch channel

pub mod coordinator;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod traits;

pub use coordinator::{CoordinatorHandle, RefreshCoordinator, RefreshEvent, Trigger};
pub use scheduler::{Decision, PendingRetry, RefreshScheduler};
pub use state::{RefreshState, RefreshStatus};
pub use store::MemoryWalletStore;
pub use traits::{BalanceProvider, CdpProvider, WalletChange, WalletStore};
