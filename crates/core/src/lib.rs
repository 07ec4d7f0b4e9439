//! Core types and pure logic for the wallet balance refresher
//!
//! This crate provides shared types used across all components:
//! - Wallet, balance and CDP definitions
//! - Published refresh snapshots
//! - Merging of per-provider enrichment results
//! - Aggregation of several wallets into one "all wallets" view
//! - Refresh configuration

pub mod types;
pub mod snapshot;
pub mod merge;
pub mod aggregate;
pub mod config;
pub mod errors;

pub use types::*;
pub use snapshot::*;
pub use merge::*;
pub use aggregate::*;
pub use config::*;
pub use errors::*;
