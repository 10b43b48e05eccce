//! Clustering engine
//!
//! Drives one clustering run end to end: partition the snapshot, cluster
//! every (partition, dimension) unit concurrently, render the merged
//! clusters, then consolidate the rendered table.

use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cluster::{self, ClusterCollector, GreedyClusterer, Tolerances, UnitFailure};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{Dimension, Record};
use crate::pipeline::{self, Consolidation};
use crate::table::{cluster_count, TableRow};

/// Outcome of one clustering run
#[derive(Debug, Clone)]
pub struct ClusterReport {
    pub run_id: String,
    pub records: usize,
    pub partitions: usize,
    pub units: usize,
    /// Clusters produced before the minimum size filter
    pub candidates: usize,
    pub failures: Vec<UnitFailure>,
    /// Table before consolidation
    pub rendered: Vec<TableRow>,
    pub consolidation: Consolidation,
    pub elapsed: Duration,
}

impl ClusterReport {
    /// The consolidated table
    pub fn final_rows(&self) -> &[TableRow] {
        &self.consolidation.final_rows
    }

    pub fn cluster_count(&self) -> usize {
        cluster_count(self.final_rows())
    }
}

pub struct ClusterEngine {
    config: EngineConfig,
}

impl ClusterEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cluster `records` and consolidate the result
    pub async fn run(&self, records: &[Record]) -> Result<ClusterReport> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let duplicates = count_duplicates(records);
        if duplicates > 0 {
            warn!(
                run_id = %run_id,
                duplicates,
                "Snapshot repeats wallet addresses; consolidation keeps one copy"
            );
        }

        let partitions = cluster::partition(records, self.config.partition_count());
        let units = cluster::work_units(&partitions, &Dimension::ALL);
        info!(
            run_id = %run_id,
            records = records.len(),
            partitions = partitions.len(),
            units = units.len(),
            workers = self.config.worker_count(),
            "Starting clustering run"
        );

        let clusterer = GreedyClusterer::new(Tolerances::from(&self.config));
        let collection = ClusterCollector::from_config(&self.config)
            .collect(units, clusterer)
            .await;

        if !collection.failures.is_empty() {
            warn!(
                run_id = %run_id,
                failed = collection.failures.len(),
                "Some work units failed; their clusters are missing from this run"
            );
        }

        let rendered = cluster::render(collection.clusters);
        let consolidation = pipeline::consolidate(&rendered, self.config.min_cluster_size)?;

        let report = ClusterReport {
            run_id,
            records: records.len(),
            partitions: partitions.len(),
            units: collection.units,
            candidates: collection.candidates,
            failures: collection.failures,
            rendered,
            consolidation,
            elapsed: started.elapsed(),
        };

        info!(
            run_id = %report.run_id,
            clusters = report.cluster_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Clustering run complete"
        );
        Ok(report)
    }
}

fn count_duplicates(records: &[Record]) -> usize {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|r| !seen.insert(r.address.as_str()))
        .count()
}
