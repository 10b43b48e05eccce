//! Clustering dimensions
//!
//! A dimension is one chain pair: its day-difference column drives the
//! ordering, its two value columns bound value dispersion and its two date
//! columns (plus activation day) bound timing drift.

use chrono::NaiveDate;
use std::fmt;

use super::{Chain, ChainPair, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension {
    pair: ChainPair,
}

impl Dimension {
    pub const COUNT: usize = 6;

    /// Every pair among the four clustering chains
    pub const ALL: [Dimension; Dimension::COUNT] = [
        Dimension::new(Chain::Zk, Chain::Scroll),
        Dimension::new(Chain::Zk, Chain::Arb),
        Dimension::new(Chain::Zk, Chain::Zora),
        Dimension::new(Chain::Scroll, Chain::Arb),
        Dimension::new(Chain::Scroll, Chain::Zora),
        Dimension::new(Chain::Arb, Chain::Zora),
    ];

    const fn new(from: Chain, to: Chain) -> Self {
        Self {
            pair: ChainPair::new(from, to),
        }
    }

    pub fn pair(&self) -> ChainPair {
        self.pair
    }

    /// Day difference between the pair's chains, if known
    pub fn difference(&self, record: &Record) -> Option<f64> {
        record.pair_diff(self.pair).get()
    }

    pub fn values(&self, record: &Record) -> [Option<f64>; 2] {
        [
            record.chain(self.pair.from).value.get(),
            record.chain(self.pair.to).value.get(),
        ]
    }

    /// The pair's two dates followed by the activation day
    pub fn dates(&self, record: &Record) -> [Option<NaiveDate>; 3] {
        [
            record.chain(self.pair.from).date.get(),
            record.chain(self.pair.to).date.get(),
            record.activation.get(),
        ]
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dif", self.pair)
    }
}
