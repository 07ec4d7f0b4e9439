//! Wallet balance daemon
//!
//! Wires a configured wallet list and static enrichment data into the refresh
//! coordinator, drives it from a poll timer and logs every snapshot.

pub mod config;
pub mod providers;

pub use config::{DaemonConfig, WalletEntry};
pub use providers::{StaticBalanceProvider, StaticCdpProvider};
