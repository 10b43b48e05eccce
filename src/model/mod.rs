//! Wallet activity records
//!
//! A [`Record`] is one wallet's row of the input snapshot: activation day,
//! and for each tracked chain the earliest interaction date, the value
//! transferred and the transaction hash, plus the derived day differences
//! between chains. Records are built once and never mutated.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod dimension;

pub use dimension::Dimension;

/// Tracked chains, in snapshot column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Zk,
    Scroll,
    Arb,
    Zora,
    /// Clusters protocol contract. Acquired and rendered, never a dimension.
    Cluster,
}

impl Chain {
    pub const COUNT: usize = 5;

    pub const ALL: [Chain; Chain::COUNT] = [
        Chain::Zk,
        Chain::Scroll,
        Chain::Arb,
        Chain::Zora,
        Chain::Cluster,
    ];

    /// Column label used in snapshot headers
    pub fn label(&self) -> &'static str {
        match self {
            Chain::Zk => "zk",
            Chain::Scroll => "scroll",
            Chain::Arb => "arb",
            Chain::Zora => "zora",
            Chain::Cluster => "cluster",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An ordered chain pair; its difference is `date(to) - date(from)` in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainPair {
    pub from: Chain,
    pub to: Chain,
}

impl ChainPair {
    pub const COUNT: usize = 10;

    pub const ALL: [ChainPair; ChainPair::COUNT] = [
        ChainPair::new(Chain::Zk, Chain::Scroll),
        ChainPair::new(Chain::Zk, Chain::Arb),
        ChainPair::new(Chain::Zk, Chain::Zora),
        ChainPair::new(Chain::Zk, Chain::Cluster),
        ChainPair::new(Chain::Scroll, Chain::Arb),
        ChainPair::new(Chain::Scroll, Chain::Zora),
        ChainPair::new(Chain::Scroll, Chain::Cluster),
        ChainPair::new(Chain::Arb, Chain::Zora),
        ChainPair::new(Chain::Arb, Chain::Cluster),
        ChainPair::new(Chain::Zora, Chain::Cluster),
    ];

    pub const fn new(from: Chain, to: Chain) -> Self {
        Self { from, to }
    }

    /// Position of this pair in [`ChainPair::ALL`]
    pub fn index(&self) -> usize {
        // Pairs are (i, j) with i < j in chain order
        let (i, j) = (self.from.index(), self.to.index());
        debug_assert!(i < j, "chain pair must follow column order");
        let n = Chain::COUNT;
        i * (2 * n - i - 1) / 2 + (j - i - 1)
    }
}

impl fmt::Display for ChainPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// A snapshot cell that may be missing
///
/// Missing cells stay an explicit `Unknown` through every stage so column
/// alignment never shifts, and every comparison against one fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Known(T),
    Unknown,
}

impl<T> Field<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Field::Known(v) => Some(v),
            Field::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Field::Unknown)
    }
}

impl<T: Copy> Field<T> {
    pub fn get(&self) -> Option<T> {
        self.known().copied()
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Unknown
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Known(v),
            None => Field::Unknown,
        }
    }
}

impl Field<NaiveDate> {
    /// Parse `YYYY-MM-DD`, or an RFC 3339 timestamp truncated to its day
    pub fn parse_date(cell: &str) -> Self {
        let cell = cell.trim();
        if let Ok(date) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
            return Field::Known(date);
        }
        DateTime::parse_from_rfc3339(cell)
            .map(|ts| ts.date_naive())
            .ok()
            .into()
    }
}

impl Field<f64> {
    /// Parse a finite number; anything else is unknown
    pub fn parse_number(cell: &str) -> Self {
        cell.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .into()
    }
}

/// One chain's earliest interaction for a wallet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainActivity {
    pub date: Field<NaiveDate>,
    pub value: Field<f64>,
    pub hash: Field<String>,
}

/// One wallet's row of the input snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub address: String,
    pub activation: Field<NaiveDate>,
    /// Indexed by [`Chain::index`]
    pub activity: [ChainActivity; Chain::COUNT],
    /// Indexed by [`ChainPair::index`]
    pub pair_diffs: [Field<f64>; ChainPair::COUNT],
    /// Days from activation to each chain, indexed by [`Chain::index`]
    pub activation_diffs: [Field<f64>; Chain::COUNT],
}

impl Record {
    /// A record with every field unknown
    pub fn unknown(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            activation: Field::Unknown,
            activity: std::array::from_fn(|_| ChainActivity::default()),
            pair_diffs: std::array::from_fn(|_| Field::Unknown),
            activation_diffs: std::array::from_fn(|_| Field::Unknown),
        }
    }

    /// Build a record and derive its day differences from the dates
    pub fn derive(
        address: impl Into<String>,
        activation: Field<NaiveDate>,
        activity: [ChainActivity; Chain::COUNT],
    ) -> Self {
        let days_between = |a: &Field<NaiveDate>, b: &Field<NaiveDate>| -> Field<f64> {
            match (a.known(), b.known()) {
                (Some(a), Some(b)) => Field::Known((*b - *a).num_days() as f64),
                _ => Field::Unknown,
            }
        };

        let pair_diffs = ChainPair::ALL.map(|pair| {
            days_between(
                &activity[pair.from.index()].date,
                &activity[pair.to.index()].date,
            )
        });
        let activation_diffs =
            Chain::ALL.map(|chain| days_between(&activation, &activity[chain.index()].date));

        Self {
            address: address.into(),
            activation,
            activity,
            pair_diffs,
            activation_diffs,
        }
    }

    pub fn chain(&self, chain: Chain) -> &ChainActivity {
        &self.activity[chain.index()]
    }

    pub fn pair_diff(&self, pair: ChainPair) -> &Field<f64> {
        &self.pair_diffs[pair.index()]
    }

    pub fn activation_diff(&self, chain: Chain) -> &Field<f64> {
        &self.activation_diffs[chain.index()]
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Record builders shared by unit tests

    use super::*;

    pub(crate) fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub(crate) struct RecordBuilder {
        record: Record,
    }

    impl RecordBuilder {
        pub(crate) fn new(address: &str) -> Self {
            Self {
                record: Record::unknown(address),
            }
        }

        pub(crate) fn activation(mut self, day: &str) -> Self {
            self.record.activation = Field::Known(date(day));
            self
        }

        pub(crate) fn chain(mut self, chain: Chain, day: &str, value: f64) -> Self {
            self.record.activity[chain.index()] = ChainActivity {
                date: Field::Known(date(day)),
                value: Field::Known(value),
                hash: Field::Known(format!("0x{}{}", chain.label(), self.record.address)),
            };
            self
        }

        pub(crate) fn diff(mut self, pair: ChainPair, days: f64) -> Self {
            self.record.pair_diffs[pair.index()] = Field::Known(days);
            self
        }

        pub(crate) fn build(self) -> Record {
            self.record
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::date;
    use super::*;

    #[test]
    fn test_pair_index_matches_table_order() {
        for (i, pair) in ChainPair::ALL.iter().enumerate() {
            assert_eq!(pair.index(), i, "{pair}");
        }
    }

    #[test]
    fn test_field_parsing() {
        assert_eq!(Field::parse_date("2024-03-01"), Field::Known(date("2024-03-01")));
        assert_eq!(
            Field::parse_date("2024-03-01T10:22:01.000Z"),
            Field::Known(date("2024-03-01"))
        );
        assert!(Field::parse_date("-").is_unknown());
        assert!(Field::parse_date("N/A").is_unknown());

        assert_eq!(Field::parse_number(" 0.25 "), Field::Known(0.25));
        assert_eq!(Field::parse_number("12.0"), Field::Known(12.0));
        assert!(Field::parse_number("-").is_unknown());
        assert!(Field::parse_number("NaN").is_unknown());
    }

    #[test]
    fn test_derive_day_differences() {
        let mut activity: [ChainActivity; Chain::COUNT] =
            std::array::from_fn(|_| ChainActivity::default());
        activity[Chain::Zk.index()].date = Field::Known(date("2024-01-01"));
        activity[Chain::Scroll.index()].date = Field::Known(date("2024-01-11"));

        let record = Record::derive("0xabc", Field::Known(date("2023-12-25")), activity);

        let zk_scroll = ChainPair::new(Chain::Zk, Chain::Scroll);
        assert_eq!(record.pair_diff(zk_scroll).get(), Some(10.0));
        assert!(record
            .pair_diff(ChainPair::new(Chain::Zk, Chain::Arb))
            .is_unknown());
        assert_eq!(record.activation_diff(Chain::Zk).get(), Some(7.0));
        assert_eq!(record.activation_diff(Chain::Scroll).get(), Some(17.0));
        assert!(record.activation_diff(Chain::Zora).is_unknown());
    }
}
