//! Error types

use alloy_primitives::Address;
use std::fmt;
use thiserror::Error;

/// Which enrichment produced a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentKind {
    Balances,
    Cdps,
}

impl EnrichmentKind {
    pub fn name(&self) -> &'static str {
        match self {
            EnrichmentKind::Balances => "balance",
            EnrichmentKind::Cdps => "cdp",
        }
    }
}

impl fmt::Display for EnrichmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Enrichment results that cannot be combined with the candidate set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("Length mismatch: {candidates} candidates, {balances} balance results, {cdps} cdp results")]
    LengthMismatch {
        candidates: usize,
        balances: usize,
        cdps: usize,
    },

    #[error("{kind} result has no entry for wallet {address}")]
    MissingWallet { kind: EnrichmentKind, address: Address },

    #[error("{kind} result lists wallet {address} more than once")]
    DuplicateWallet { kind: EnrichmentKind, address: Address },
}

/// Refresh errors
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("Refresh coordinator is not running")]
    Stopped,

    #[error("Merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("Enrichment task panicked")]
    ProviderPanicked,
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type MergeResult<T> = Result<T, MergeError>;
pub type RefreshResult<T> = Result<T, RefreshError>;
