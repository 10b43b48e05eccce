//! Concurrent execution of clustering work units
//!
//! Every work unit runs on the blocking pool with its own read-only
//! partition and hands its clusters back as a value; nothing is shared
//! between units. Results are merged in (partition, dimension) order so
//! identifiers assigned downstream are reproducible regardless of which
//! unit finished first.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::{Cluster, GreedyClusterer, WorkUnit};
use crate::config::EngineConfig;
use crate::model::{Dimension, Record};

/// A work unit whose contribution was dropped
#[derive(Debug, Clone)]
pub struct UnitFailure {
    /// (partition, dimension index); `None` when the task could not be joined
    pub tag: Option<(usize, usize)>,
    pub reason: String,
}

/// Merged output of all work units
#[derive(Debug, Default)]
pub struct Collection {
    /// Clusters at or above the minimum size, in merge order
    pub clusters: Vec<Cluster>,
    pub units: usize,
    /// Clusters produced before size filtering
    pub candidates: usize,
    pub failures: Vec<UnitFailure>,
}

struct UnitOutcome {
    tag: (usize, usize),
    dimension: Dimension,
    result: std::result::Result<Vec<Cluster>, String>,
}

pub struct ClusterCollector {
    workers: usize,
    min_cluster_size: usize,
}

impl ClusterCollector {
    pub fn new(workers: usize, min_cluster_size: usize) -> Self {
        Self {
            workers: workers.max(1),
            min_cluster_size,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.worker_count(), config.min_cluster_size)
    }

    /// Run the greedy clusterer over every work unit
    pub async fn collect(&self, units: Vec<WorkUnit>, clusterer: GreedyClusterer) -> Collection {
        self.collect_with(units, move |records, dimension| {
            clusterer.cluster(records, dimension)
        })
        .await
    }

    /// Run `cluster_fn` over every work unit, at most `workers` at a time
    ///
    /// A unit that panics is logged and skipped; the remaining units still
    /// contribute.
    pub async fn collect_with<F>(&self, units: Vec<WorkUnit>, cluster_fn: F) -> Collection
    where
        F: Fn(&[Record], Dimension) -> Vec<Cluster> + Send + Sync + 'static,
    {
        let unit_count = units.len();
        let cluster_fn = Arc::new(cluster_fn);
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for unit in units {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                error!("Worker permits closed, skipping remaining work units");
                break;
            };
            let cluster_fn = Arc::clone(&cluster_fn);

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    (*cluster_fn)(&unit.records[..], unit.dimension)
                }))
                .map_err(|payload| panic_message(payload.as_ref()));

                UnitOutcome {
                    tag: unit.tag(),
                    dimension: unit.dimension,
                    result,
                }
            });
        }

        let mut outcomes = Vec::with_capacity(unit_count);
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(error = %e, "Work unit task could not be joined");
                    failures.push(UnitFailure {
                        tag: None,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Completion order is arbitrary; merge by origin
        outcomes.sort_by_key(|o| o.tag);

        let mut collection = Collection {
            units: unit_count,
            ..Default::default()
        };

        for outcome in outcomes {
            let (partition, _) = outcome.tag;
            match outcome.result {
                Ok(found) => {
                    debug!(
                        partition,
                        dimension = %outcome.dimension,
                        clusters = found.len(),
                        "Work unit complete"
                    );
                    collection.candidates += found.len();
                    collection.clusters.extend(
                        found
                            .into_iter()
                            .filter(|c| c.len() >= self.min_cluster_size),
                    );
                }
                Err(reason) => {
                    error!(
                        partition,
                        dimension = %outcome.dimension,
                        reason = %reason,
                        "Work unit panicked, contribution dropped"
                    );
                    collection.failures.push(UnitFailure {
                        tag: Some(outcome.tag),
                        reason,
                    });
                }
            }
        }
        collection.failures.extend(failures);

        info!(
            units = collection.units,
            failed = collection.failures.len(),
            candidates = collection.candidates,
            kept = collection.clusters.len(),
            min_size = self.min_cluster_size,
            "Cluster collection complete"
        );

        collection
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{partition, work_units};
    use std::time::Duration;

    fn records(n: usize) -> Vec<Record> {
        (0..n).map(|i| Record::unknown(format!("0x{:04x}", i))).collect()
    }

    /// One cluster holding the whole partition
    fn whole_partition(records: &[Record], dimension: Dimension) -> Vec<Cluster> {
        let mut iter = records.iter().cloned();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut cluster = Cluster::seed(dimension, first);
        iter.for_each(|r| cluster.push(r));
        vec![cluster]
    }

    #[tokio::test]
    async fn test_merge_order_is_deterministic() {
        let input = records(60);
        let units = work_units(&partition(&input, 3), &Dimension::ALL[..2]);

        let collector = ClusterCollector::new(4, 20);
        let collection = collector
            .collect_with(units, |records, dimension| {
                // Earlier partitions finish last
                let first: usize = usize::from_str_radix(&records[0].address[2..], 16).unwrap();
                std::thread::sleep(Duration::from_millis((60 - first as u64) / 4));
                whole_partition(records, dimension)
            })
            .await;

        assert_eq!(collection.units, 6);
        assert!(collection.failures.is_empty());
        assert_eq!(collection.clusters.len(), 6);

        let order: Vec<(String, Dimension)> = collection
            .clusters
            .iter()
            .map(|c| (c.members()[0].address.clone(), c.dimension()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("0x0000".to_string(), Dimension::ALL[0]),
                ("0x0000".to_string(), Dimension::ALL[1]),
                ("0x0014".to_string(), Dimension::ALL[0]),
                ("0x0014".to_string(), Dimension::ALL[1]),
                ("0x0028".to_string(), Dimension::ALL[0]),
                ("0x0028".to_string(), Dimension::ALL[1]),
            ]
        );
    }

    #[tokio::test]
    async fn test_small_clusters_discarded() {
        // Partitions of 20, 20 and 5
        let input = records(45);
        let units = work_units(&partition(&input, 3), &Dimension::ALL[..1]);

        let collection = ClusterCollector::new(2, 20)
            .collect_with(units, whole_partition)
            .await;

        assert_eq!(collection.candidates, 3);
        assert_eq!(collection.clusters.len(), 2);
        assert!(collection.clusters.iter().all(|c| c.len() == 20));
    }

    #[tokio::test]
    async fn test_panicking_unit_is_isolated() {
        let input = records(40);
        let units = work_units(&partition(&input, 2), &Dimension::ALL);
        let poisoned = Dimension::ALL[2];

        let collection = ClusterCollector::new(3, 1)
            .collect_with(units, move |records, dimension| {
                if dimension == poisoned {
                    panic!("type mismatch in {}", dimension);
                }
                whole_partition(records, dimension)
            })
            .await;

        assert_eq!(collection.units, 12);
        assert_eq!(collection.failures.len(), 2);
        assert_eq!(collection.failures[0].tag, Some((0, 2)));
        assert_eq!(collection.failures[1].tag, Some((1, 2)));
        assert!(collection.failures[0].reason.contains("zk to zora dif"));
        assert_eq!(collection.clusters.len(), 10);
        assert!(collection.clusters.iter().all(|c| c.dimension() != poisoned));
    }

    #[tokio::test]
    async fn test_no_units() {
        let collection = ClusterCollector::new(4, 20)
            .collect(Vec::new(), GreedyClusterer::default())
            .await;
        assert_eq!(collection.units, 0);
        assert!(collection.clusters.is_empty());
    }
}
