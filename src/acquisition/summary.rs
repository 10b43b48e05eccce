//! Reduce a transaction history to a snapshot row

use chrono::{DateTime, FixedOffset};

use super::{ContractAddresses, WalletTransaction};
use crate::model::{Chain, ChainActivity, Field, Record};

/// Earliest matching interaction seen so far for one chain
struct Earliest<'a> {
    at: DateTime<FixedOffset>,
    value: Option<&'a str>,
    hash: &'a str,
}

/// Summarize a wallet's history into a record
///
/// Activation is the earliest transaction sent by the wallet. Each chain's
/// activity is the earliest native transfer from the wallet to that chain's
/// contract. Address comparisons ignore case; transactions with an
/// unparseable timestamp are ignored.
pub fn summarize(
    wallet: &str,
    transactions: &[WalletTransaction],
    contracts: &ContractAddresses,
) -> Record {
    let mut activation: Option<DateTime<FixedOffset>> = None;
    let mut earliest: [Option<Earliest<'_>>; Chain::COUNT] = Default::default();

    for tx in transactions {
        let Ok(at) = DateTime::parse_from_rfc3339(tx.block_timestamp.trim()) else {
            continue;
        };

        if tx.from_address.eq_ignore_ascii_case(wallet) && activation.map_or(true, |a| at < a) {
            activation = Some(at);
        }

        for transfer in &tx.native_transfers {
            if !transfer.from_address.eq_ignore_ascii_case(wallet) {
                continue;
            }
            for chain in Chain::ALL {
                if !transfer.to_address.eq_ignore_ascii_case(contracts.get(chain)) {
                    continue;
                }
                let slot = &mut earliest[chain.index()];
                if slot.as_ref().map_or(true, |e| at < e.at) {
                    *slot = Some(Earliest {
                        at,
                        value: transfer.value_formatted.as_deref(),
                        hash: &tx.hash,
                    });
                }
            }
        }
    }

    let activity = earliest.map(|slot| match slot {
        Some(e) => ChainActivity {
            date: Field::Known(e.at.date_naive()),
            value: e.value.map_or(Field::Unknown, Field::parse_number),
            hash: if e.hash.is_empty() {
                Field::Unknown
            } else {
                Field::Known(e.hash.to_string())
            },
        },
        None => ChainActivity::default(),
    });

    Record::derive(
        wallet,
        activation.map(|a| a.date_naive()).into(),
        activity,
    )
}
