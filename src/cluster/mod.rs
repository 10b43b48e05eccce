//! Sybil clustering core
//!
//! Records are split into partitions, each partition is clustered once per
//! dimension by the greedy clusterer, and the collector merges every
//! work unit's clusters into one deterministic list for rendering.

use crate::config::EngineConfig;
use crate::model::{Dimension, Record};

pub mod collector;
pub mod greedy;
pub mod partition;
pub mod render;

pub use collector::{ClusterCollector, Collection, UnitFailure};
pub use greedy::GreedyClusterer;
pub use partition::{partition, work_units, Partition, WorkUnit};
pub use render::render;

/// Acceptance limits for joining a cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Max gap between difference values of candidate and last member
    pub diff: f64,
    /// Max relative deviation from a value column's running mean
    pub value: f64,
    /// Max day gap per date column against the last member
    pub date_days: i64,
    /// Gap used when either date is unknown
    pub missing_date_penalty_days: i64,
}

impl From<&EngineConfig> for Tolerances {
    fn from(config: &EngineConfig) -> Self {
        Self {
            diff: config.diff_tolerance,
            value: config.value_tolerance,
            date_days: config.date_tolerance_days,
            missing_date_penalty_days: config.missing_date_penalty_days,
        }
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Records grouped under one dimension, in insertion order
///
/// Running sums of the dimension's value columns are kept alongside the
/// members so the mean test stays O(1) per candidate.
#[derive(Debug, Clone)]
pub struct Cluster {
    dimension: Dimension,
    members: Vec<Record>,
    value_sums: [f64; 2],
    /// Set once any member lacks the column's value
    value_gaps: [bool; 2],
}

impl Cluster {
    pub fn seed(dimension: Dimension, record: Record) -> Self {
        let mut cluster = Self {
            dimension,
            members: Vec::new(),
            value_sums: [0.0; 2],
            value_gaps: [false; 2],
        };
        cluster.push(record);
        cluster
    }

    pub fn push(&mut self, record: Record) {
        for (i, value) in self.dimension.values(&record).into_iter().enumerate() {
            match value {
                Some(v) => self.value_sums[i] += v,
                None => self.value_gaps[i] = true,
            }
        }
        self.members.push(record);
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn members(&self) -> &[Record] {
        &self.members
    }

    pub fn into_members(self) -> Vec<Record> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Most recently appended member
    pub fn last(&self) -> Option<&Record> {
        self.members.last()
    }

    /// Mean of a value column over all members; `None` when any member's
    /// value is unknown
    pub fn value_mean(&self, column: usize) -> Option<f64> {
        if self.members.is_empty() || self.value_gaps[column] {
            return None;
        }
        Some(self.value_sums[column] / self.members.len() as f64)
    }
}
