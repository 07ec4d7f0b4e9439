//! Core type definitions

use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of wallets. Order drives display order.
pub type WalletSet = Vec<Wallet>;

/// ERC-20 holding inside a wallet balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub contract: Address,
    pub symbol: String,
    pub amount: Decimal,
    pub usd_value: Decimal,
}

/// Balance snapshot for a wallet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub eth: Decimal,
    pub usd_value: Decimal,
    #[serde(default)]
    pub tokens: Vec<TokenBalance>,
}

impl Balance {
    /// Balance holding only ether
    pub fn eth(eth: Decimal, usd_value: Decimal) -> Self {
        Self {
            eth,
            usd_value,
            tokens: vec![],
        }
    }
}

/// Collateralized debt position attached to a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cdp {
    pub id: u64,
    pub collateral_type: String,
    pub collateral: Decimal,
    pub debt: Decimal,
}

impl Cdp {
    /// Collateral per unit of debt, `None` when nothing is owed
    pub fn collateral_ratio(&self) -> Option<Decimal> {
        if self.debt.is_zero() {
            return None;
        }
        Some(self.collateral / self.debt)
    }
}

/// A tracked wallet. Replaced as a whole record, never edited field by field
/// from several writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: Address,
    #[serde(default)]
    pub title: String,
    /// Absent until a balance provider has filled it in
    #[serde(default)]
    pub balance: Option<Balance>,
    #[serde(default)]
    pub cdps: Vec<Cdp>,
}

impl Wallet {
    pub fn new(address: Address, title: impl Into<String>) -> Self {
        Self {
            address,
            title: title.into(),
            balance: None,
            cdps: vec![],
        }
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_cdps(mut self, cdps: Vec<Cdp>) -> Self {
        self.cdps = cdps;
        self
    }

    /// Label used for the wallet's tab; falls back to a shortened address
    pub fn tab_title(&self) -> String {
        let title = self.title.trim();
        if !title.is_empty() {
            return title.to_string();
        }

        let full = self.address.to_string();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }

    pub fn total_debt(&self) -> Decimal {
        self.cdps.iter().map(|c| c.debt).sum()
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.tab_title(), self.address)
    }
}

/// Addresses of a wallet set, in order
pub fn addresses(wallets: &[Wallet]) -> Vec<Address> {
    wallets.iter().map(|w| w.address).collect()
}
