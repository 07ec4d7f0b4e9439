//! Daemon configuration
//!
//! Read from an optional TOML file, then overridden by `BALANCE_*`
//! environment variables (nested keys separated by `__`, e.g.
//! `BALANCE_REFRESH__MIN_INTERVAL_MS=400`).

use std::collections::HashSet;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{bail, Context};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use balance_core::{Balance, Cdp, RefreshConfig, Wallet};

fn default_poll_interval_secs() -> u64 {
    60
}

/// A tracked wallet and the values served for it
#[derive(Debug, Clone, Deserialize)]
pub struct WalletEntry {
    pub address: Address,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub balance: Option<Balance>,
    #[serde(default)]
    pub cdps: Vec<Cdp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Periodic refresh; 0 disables the timer
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
}

impl DaemonConfig {
    /// Load from `path` (missing file is fine) plus environment overrides
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("BALANCE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder).with_context(|| format!("Failed to load configuration from {}", path))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Self::build(config::Config::builder().add_source(File::from_str(contents, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let config: DaemonConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.refresh.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.wallets {
            if !seen.insert(entry.address) {
                bail!("Wallet {} is listed more than once", entry.address);
            }
        }

        let primaries = self.wallets.iter().filter(|w| w.primary).count();
        if primaries > 1 {
            bail!("{} wallets are marked primary, at most one is allowed", primaries);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        match self.poll_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Wallet records as storage holds them: identity only, nothing fetched yet
    pub fn stored_wallets(&self) -> Vec<Wallet> {
        self.wallets
            .iter()
            .map(|entry| Wallet::new(entry.address, entry.title.clone()))
            .collect()
    }

    pub fn primary(&self) -> Option<Address> {
        self.wallets.iter().find(|w| w.primary).map(|w| w.address)
    }
}
