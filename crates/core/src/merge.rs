//! Combining the balance and CDP enrichment results
//!
//! Both providers receive the same candidate set and answer independently.
//! Entries are matched by wallet address, so a provider that reorders its
//! answer still merges correctly. Output order is candidate order.

use alloy_primitives::Address;
use std::collections::HashMap;

use crate::{EnrichmentKind, MergeError, MergeResult, Wallet, WalletSet};

/// Index a result set by address, rejecting duplicates
fn index_by_address(
    kind: EnrichmentKind,
    wallets: WalletSet,
) -> MergeResult<HashMap<Address, Wallet>> {
    let mut index = HashMap::with_capacity(wallets.len());
    for wallet in wallets {
        let address = wallet.address;
        if index.insert(address, wallet).is_some() {
            return Err(MergeError::DuplicateWallet { kind, address });
        }
    }
    Ok(index)
}

/// Merge balance-enriched and CDP-enriched results into one set.
///
/// `out[i]` keeps identity and title from `candidates[i]`, takes its balance
/// from the balance result and its CDPs from the CDP result.
pub fn merge(candidates: &[Wallet], balances: WalletSet, cdps: WalletSet) -> MergeResult<WalletSet> {
    if balances.len() != candidates.len() || cdps.len() != candidates.len() {
        return Err(MergeError::LengthMismatch {
            candidates: candidates.len(),
            balances: balances.len(),
            cdps: cdps.len(),
        });
    }

    let mut balances = index_by_address(EnrichmentKind::Balances, balances)?;
    let mut cdps = index_by_address(EnrichmentKind::Cdps, cdps)?;

    candidates
        .iter()
        .map(|candidate| {
            let address = candidate.address;
            let with_balance = balances.remove(&address).ok_or(MergeError::MissingWallet {
                kind: EnrichmentKind::Balances,
                address,
            })?;
            let with_cdps = cdps.remove(&address).ok_or(MergeError::MissingWallet {
                kind: EnrichmentKind::Cdps,
                address,
            })?;

            Ok(Wallet {
                address,
                title: candidate.title.clone(),
                balance: with_balance.balance,
                cdps: with_cdps.cdps,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Balance, Cdp};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn wallet(byte: u8) -> Wallet {
        Wallet::new(Address::repeat_byte(byte), format!("wallet {}", byte))
    }

    fn cdp(id: u64) -> Cdp {
        Cdp {
            id,
            collateral_type: "ETH-A".to_string(),
            collateral: Decimal::from(10),
            debt: Decimal::from(id),
        }
    }

    fn with_balances(wallets: &[Wallet]) -> WalletSet {
        wallets
            .iter()
            .cloned()
            .map(|w| {
                let eth = Decimal::from(w.address[0]);
                w.with_balance(Balance::eth(eth, eth * Decimal::from(2000)))
            })
            .collect()
    }

    fn with_cdps(wallets: &[Wallet]) -> WalletSet {
        wallets
            .iter()
            .cloned()
            .map(|w| {
                let id = w.address[0] as u64;
                w.with_cdps(vec![cdp(id)])
            })
            .collect()
    }

    #[test]
    fn test_merge_combines_both_results() {
        let candidates = vec![wallet(1), wallet(2)];
        let merged = merge(&candidates, with_balances(&candidates), with_cdps(&candidates)).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].address, Address::repeat_byte(1));
        assert_eq!(merged[0].balance.as_ref().unwrap().eth, Decimal::from(1));
        assert_eq!(merged[0].cdps, vec![cdp(1)]);
        assert_eq!(merged[1].balance.as_ref().unwrap().eth, Decimal::from(2));
        assert_eq!(merged[1].cdps, vec![cdp(2)]);
    }

    #[test]
    fn test_merge_keeps_candidate_titles() {
        let candidates = vec![wallet(1)];
        let mut balances = with_balances(&candidates);
        balances[0].title = "renamed by provider".to_string();

        let merged = merge(&candidates, balances, with_cdps(&candidates)).unwrap();
        assert_eq!(merged[0].title, "wallet 1");
    }

    #[test]
    fn test_merge_matches_reordered_results() {
        let candidates = vec![wallet(1), wallet(2), wallet(3)];
        let mut balances = with_balances(&candidates);
        balances.reverse();

        let merged = merge(&candidates, balances, with_cdps(&candidates)).unwrap();
        assert_eq!(merged[0].balance.as_ref().unwrap().eth, Decimal::from(1));
        assert_eq!(merged[2].balance.as_ref().unwrap().eth, Decimal::from(3));
    }

    #[test]
    fn test_merge_rejects_length_mismatch() {
        let candidates = vec![wallet(1), wallet(2), wallet(3)];
        let mut balances = with_balances(&candidates);
        balances.pop();

        let err = merge(&candidates, balances, with_cdps(&candidates)).unwrap_err();
        assert_eq!(
            err,
            MergeError::LengthMismatch {
                candidates: 3,
                balances: 2,
                cdps: 3
            }
        );
    }

    #[test]
    fn test_merge_rejects_unknown_wallet() {
        let candidates = vec![wallet(1), wallet(2)];
        let cdps = with_cdps(&[wallet(1), wallet(9)]);

        let err = merge(&candidates, with_balances(&candidates), cdps).unwrap_err();
        assert_eq!(
            err,
            MergeError::MissingWallet {
                kind: EnrichmentKind::Cdps,
                address: Address::repeat_byte(2)
            }
        );
    }

    #[test]
    fn test_merge_rejects_duplicates() {
        let candidates = vec![wallet(1), wallet(2)];
        let balances = with_balances(&[wallet(1), wallet(1)]);

        let err = merge(&candidates, balances, with_cdps(&candidates)).unwrap_err();
        assert!(matches!(
            err,
            MergeError::DuplicateWallet { kind: EnrichmentKind::Balances, .. }
        ));
    }

    #[test]
    fn test_merge_empty_sets() {
        let merged = merge(&[], vec![], vec![]).unwrap();
        assert!(merged.is_empty());
    }

    proptest! {
        #[test]
        fn merge_ignores_provider_ordering(
            count in 1usize..12,
            balance_seed in any::<u64>(),
            cdp_seed in any::<u64>(),
        ) {
            let candidates: Vec<Wallet> = (1..=count as u8).map(wallet).collect();
            let expected = merge(&candidates, with_balances(&candidates), with_cdps(&candidates)).unwrap();

            let mut balances = with_balances(&candidates);
            let mut cdps = with_cdps(&candidates);
            balances.rotate_left((balance_seed % count as u64) as usize);
            cdps.rotate_right((cdp_seed % count as u64) as usize);

            let merged = merge(&candidates, balances, cdps).unwrap();
            prop_assert_eq!(merged, expected);
        }
    }
}
