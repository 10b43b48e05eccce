//! Flatten clusters into a rendered table

use super::Cluster;
use crate::table::{ClusterHeader, TableRow};

/// Identifier for the `n`th rendered cluster (1-based)
pub fn cluster_id(n: usize) -> String {
    format!("Cluster {}", n)
}

/// Emit one header per cluster followed by its members, numbering clusters
/// in the order given
pub fn render(clusters: Vec<Cluster>) -> Vec<TableRow> {
    let mut rows = Vec::with_capacity(clusters.iter().map(|c| c.len() + 1).sum());

    for (idx, cluster) in clusters.into_iter().enumerate() {
        rows.push(TableRow::Header(ClusterHeader {
            id: cluster_id(idx + 1),
            size: cluster.len(),
        }));
        rows.extend(cluster.into_members().into_iter().map(TableRow::Member));
    }

    rows
}
