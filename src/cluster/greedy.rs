//! Greedy first-fit clustering for one partition and one dimension
//!
//! Records are visited in ascending order of the dimension's day difference.
//! Each record joins the first cluster (in creation order) that accepts it,
//! otherwise it seeds a new cluster. Acceptance compares the candidate with
//! the cluster's last member for the difference and date checks, and with
//! the cluster's running mean for the value checks.

use chrono::NaiveDate;

use super::{Cluster, Tolerances};
use crate::model::{Dimension, Record};

#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyClusterer {
    tolerances: Tolerances,
}

impl GreedyClusterer {
    pub fn new(tolerances: Tolerances) -> Self {
        Self { tolerances }
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    /// Cluster one partition under one dimension; clusters are returned in
    /// creation order
    pub fn cluster(&self, records: &[Record], dimension: Dimension) -> Vec<Cluster> {
        // Unknown differences carry no signal and sort with the zeros
        let mut ordered: Vec<(f64, &Record)> = records
            .iter()
            .map(|r| (dimension.difference(r).unwrap_or(0.0), r))
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut clusters: Vec<Cluster> = Vec::new();

        for (diff, record) in ordered {
            if diff == 0.0 {
                continue;
            }

            let fit = clusters
                .iter()
                .position(|cluster| self.accepts(cluster, record, diff));
            match fit {
                Some(idx) => clusters[idx].push(record.clone()),
                None => clusters.push(Cluster::seed(dimension, record.clone())),
            }
        }

        clusters
    }

    fn accepts(&self, cluster: &Cluster, candidate: &Record, diff: f64) -> bool {
        let Some(last) = cluster.last() else {
            return false;
        };
        let dimension = cluster.dimension();

        let last_diff = dimension.difference(last).unwrap_or(0.0);
        if (diff - last_diff).abs() > self.tolerances.diff {
            return false;
        }

        self.values_within(cluster, candidate) && self.dates_within(dimension, last, candidate)
    }

    /// Every value column within tolerance of the cluster's running mean
    fn values_within(&self, cluster: &Cluster, candidate: &Record) -> bool {
        cluster
            .dimension()
            .values(candidate)
            .into_iter()
            .enumerate()
            .all(|(column, value)| match (value, cluster.value_mean(column)) {
                (Some(value), Some(mean)) => {
                    relative_deviation(value, mean) <= self.tolerances.value
                }
                _ => false,
            })
    }

    /// Every date column (and activation day) within tolerance of the last member
    fn dates_within(&self, dimension: Dimension, last: &Record, candidate: &Record) -> bool {
        dimension
            .dates(candidate)
            .into_iter()
            .zip(dimension.dates(last))
            .all(|(a, b)| self.date_gap(a, b) <= self.tolerances.date_days)
    }

    fn date_gap(&self, a: Option<NaiveDate>, b: Option<NaiveDate>) -> i64 {
        match (a, b) {
            (Some(a), Some(b)) => (a - b).num_days().abs(),
            _ => self.tolerances.missing_date_penalty_days,
        }
    }
}

/// |value - mean| / |mean|; a zero mean always passes
fn relative_deviation(value: f64, mean: f64) -> f64 {
    if mean == 0.0 {
        0.0
    } else {
        (value - mean).abs() / mean.abs()
    }
}
