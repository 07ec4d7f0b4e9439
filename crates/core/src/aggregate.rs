//! Aggregation of several wallets into one "all wallets" record

use alloy_primitives::Address;
use std::collections::HashMap;

use crate::{Balance, Wallet};

/// Sum balances and concatenate CDPs across `wallets`.
///
/// Returns `None` for an empty slice. Numeric outputs do not depend on input
/// order; tokens keep first-seen order and CDPs keep input order. Wallets
/// without a balance contribute nothing, and the result has no balance when
/// none of them had one.
pub fn aggregate(wallets: &[Wallet], title: &str) -> Option<Wallet> {
    if wallets.is_empty() {
        return None;
    }

    let balances: Vec<&Balance> = wallets.iter().filter_map(|w| w.balance.as_ref()).collect();
    let balance = if balances.is_empty() {
        None
    } else {
        Some(sum_balances(&balances))
    };

    let cdps = wallets.iter().flat_map(|w| w.cdps.iter().cloned()).collect();

    Some(Wallet {
        address: Address::ZERO,
        title: title.to_string(),
        balance,
        cdps,
    })
}

fn sum_balances(balances: &[&Balance]) -> Balance {
    let mut total = Balance::default();
    let mut token_slots: HashMap<Address, usize> = HashMap::new();

    for balance in balances {
        total.eth += balance.eth;
        total.usd_value += balance.usd_value;

        for token in &balance.tokens {
            match token_slots.get(&token.contract) {
                Some(&slot) => {
                    let merged = &mut total.tokens[slot];
                    merged.amount += token.amount;
                    merged.usd_value += token.usd_value;
                }
                None => {
                    token_slots.insert(token.contract, total.tokens.len());
                    total.tokens.push(token.clone());
                }
            }
        }
    }

    total
}
