//! Enrichment providers serving configured values
//!
//! Wallets without configured data keep whatever they already carried, the
//! same way a network-backed provider degrades when its source is down.

use std::collections::HashMap;

use alloy_primitives::Address;
use async_trait::async_trait;
use tracing::debug;

use balance_core::{Balance, Cdp, WalletSet};
use balance_refresh::{BalanceProvider, CdpProvider};

use crate::config::WalletEntry;

pub struct StaticBalanceProvider {
    balances: HashMap<Address, Balance>,
}

impl StaticBalanceProvider {
    pub fn new(balances: HashMap<Address, Balance>) -> Self {
        Self { balances }
    }

    pub fn from_entries(entries: &[WalletEntry]) -> Self {
        Self::new(
            entries
                .iter()
                .filter_map(|e| e.balance.clone().map(|b| (e.address, b)))
                .collect(),
        )
    }
}

#[async_trait]
impl BalanceProvider for StaticBalanceProvider {
    async fn enrich(&self, wallets: WalletSet) -> WalletSet {
        wallets
            .into_iter()
            .map(|mut wallet| {
                match self.balances.get(&wallet.address) {
                    Some(balance) => wallet.balance = Some(balance.clone()),
                    None => debug!("No balance configured for {}, keeping previous", wallet.address),
                }
                wallet
            })
            .collect()
    }
}

pub struct StaticCdpProvider {
    cdps: HashMap<Address, Vec<Cdp>>,
}

impl StaticCdpProvider {
    pub fn new(cdps: HashMap<Address, Vec<Cdp>>) -> Self {
        Self { cdps }
    }

    pub fn from_entries(entries: &[WalletEntry]) -> Self {
        Self::new(entries.iter().map(|e| (e.address, e.cdps.clone())).collect())
    }
}

#[async_trait]
impl CdpProvider for StaticCdpProvider {
    async fn enrich(&self, wallets: WalletSet) -> WalletSet {
        wallets
            .into_iter()
            .map(|mut wallet| {
                if let Some(cdps) = self.cdps.get(&wallet.address) {
                    wallet.cdps = cdps.clone();
                }
                wallet
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_core::Wallet;
    use rust_decimal::Decimal;

    fn entry(byte: u8, eth: Option<i64>) -> WalletEntry {
        WalletEntry {
            address: Address::repeat_byte(byte),
            title: String::new(),
            primary: false,
            balance: eth.map(|e| Balance::eth(Decimal::from(e), Decimal::ZERO)),
            cdps: vec![Cdp {
                id: byte as u64,
                collateral_type: "ETH-A".to_string(),
                collateral: Decimal::ONE,
                debt: Decimal::ONE,
            }],
        }
    }

    #[tokio::test]
    async fn test_balances_fill_known_wallets_only() {
        let provider = StaticBalanceProvider::from_entries(&[entry(1, Some(7)), entry(2, None)]);
        let stale = Balance::eth(Decimal::from(3), Decimal::ZERO);
        let wallets = vec![
            Wallet::new(Address::repeat_byte(1), "a"),
            Wallet::new(Address::repeat_byte(2), "b").with_balance(stale.clone()),
            Wallet::new(Address::repeat_byte(3), "c"),
        ];

        let enriched = provider.enrich(wallets).await;

        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched[0].balance.as_ref().unwrap().eth, Decimal::from(7));
        assert_eq!(enriched[1].balance, Some(stale));
        assert!(enriched[2].balance.is_none());
    }

    #[tokio::test]
    async fn test_cdps_keep_order() {
        let provider = StaticCdpProvider::from_entries(&[entry(1, None), entry(2, None)]);
        let wallets = vec![
            Wallet::new(Address::repeat_byte(2), "b"),
            Wallet::new(Address::repeat_byte(1), "a"),
        ];

        let enriched = provider.enrich(wallets).await;

        assert_eq!(enriched[0].cdps[0].id, 2);
        assert_eq!(enriched[1].cdps[0].id, 1);
    }
}
