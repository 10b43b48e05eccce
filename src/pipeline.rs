//! Consolidation of rendered cluster tables
//!
//! Three passes run in order, each reading one table and producing a new
//! one:
//! 1. sort blocks by declared size, largest first
//! 2. keep every wallet only in the first (largest) block that claims it
//! 3. drop blocks left below the minimum size, restate declared sizes and
//!    re-sort by the restated sizes
//!
//! Afterwards every wallet appears at most once, and every block's declared
//! size equals its member count and meets the minimum.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::Result;
use crate::table::{cluster_count, join_blocks, split_blocks, Block, TableRow};

/// Tables produced by each consolidation pass
#[derive(Debug, Clone, Default)]
pub struct Consolidation {
    pub sorted: Vec<TableRow>,
    pub deduped: Vec<TableRow>,
    pub final_rows: Vec<TableRow>,
}

/// Run all three passes
pub fn consolidate(rows: &[TableRow], min_cluster_size: usize) -> Result<Consolidation> {
    let sorted = sort_by_size(rows)?;
    let deduped = dedup_by_address(&sorted)?;
    let final_rows = prune_and_recompute(&deduped, min_cluster_size)?;

    info!(
        rendered = cluster_count(rows),
        deduped = cluster_count(&deduped),
        surviving = cluster_count(&final_rows),
        "Consolidation complete"
    );

    Ok(Consolidation {
        sorted,
        deduped,
        final_rows,
    })
}

/// Stable sort of blocks by declared size, descending
pub fn sort_by_size(rows: &[TableRow]) -> Result<Vec<TableRow>> {
    let mut blocks = split_blocks(rows)?;
    blocks.sort_by(|a, b| b.header.size.cmp(&a.header.size));
    Ok(join_blocks(blocks))
}

/// Keep each address only in the first block it appears in
///
/// Declared sizes are left as they were; blocks with no remaining members
/// are dropped.
pub fn dedup_by_address(rows: &[TableRow]) -> Result<Vec<TableRow>> {
    let blocks = split_blocks(rows)?;
    let mut claimed: HashSet<String> = HashSet::new();
    let mut dropped_rows = 0usize;
    let mut kept = Vec::with_capacity(blocks.len());

    for block in blocks {
        let mut members = Vec::with_capacity(block.members.len());
        for record in block.members {
            if claimed.insert(record.address.clone()) {
                members.push(record);
            } else {
                dropped_rows += 1;
            }
        }

        if members.is_empty() {
            debug!(cluster = %block.header.id, "Cluster emptied by dedup");
            continue;
        }
        kept.push(Block {
            header: block.header,
            members,
        });
    }

    debug!(
        dropped_rows,
        wallets = claimed.len(),
        "Duplicate addresses removed"
    );
    Ok(join_blocks(kept))
}

/// Drop blocks below `min_cluster_size` members, set each surviving
/// header's size to its member count and order blocks by that size
///
/// Dedup can shrink a block below one that followed it, so the order from
/// the first pass no longer holds. The sort is stable: equal sizes keep
/// their incoming order.
pub fn prune_and_recompute(rows: &[TableRow], min_cluster_size: usize) -> Result<Vec<TableRow>> {
    let blocks = split_blocks(rows)?;
    let before = blocks.len();

    let mut surviving: Vec<Block> = blocks
        .into_iter()
        .filter(|block| block.true_size() >= min_cluster_size)
        .map(|mut block| {
            block.header.size = block.true_size();
            block
        })
        .collect();
    surviving.sort_by(|a, b| b.header.size.cmp(&a.header.size));

    debug!(
        pruned = before - surviving.len(),
        surviving = surviving.len(),
        min_cluster_size,
        "Small clusters pruned"
    );
    Ok(join_blocks(surviving))
}
