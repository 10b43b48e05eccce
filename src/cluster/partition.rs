//! Row partitioning and work unit construction

use std::sync::Arc;

use crate::model::{Dimension, Record};

/// A contiguous slice of the snapshot, owned by its work units
#[derive(Debug, Clone)]
pub struct Partition {
    pub index: usize,
    pub records: Arc<[Record]>,
}

/// One (partition, dimension) clustering job
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub partition: usize,
    pub dimension_index: usize,
    pub dimension: Dimension,
    pub records: Arc<[Record]>,
}

impl WorkUnit {
    /// Origin tag used to merge results deterministically
    pub fn tag(&self) -> (usize, usize) {
        (self.partition, self.dimension_index)
    }
}

/// Split records into `ceil(n / ceil(n / slots))` contiguous, order-preserving
/// partitions; the last one may be smaller
pub fn partition(records: &[Record], slots: usize) -> Vec<Partition> {
    if records.is_empty() {
        return Vec::new();
    }

    let chunk_size = records.len().div_ceil(slots.max(1));
    records
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| Partition {
            index,
            records: Arc::from(chunk.to_vec()),
        })
        .collect()
}

/// Cross every partition with every dimension
pub fn work_units(partitions: &[Partition], dimensions: &[Dimension]) -> Vec<WorkUnit> {
    partitions
        .iter()
        .flat_map(|p| {
            dimensions
                .iter()
                .enumerate()
                .map(move |(dimension_index, dimension)| WorkUnit {
                    partition: p.index,
                    dimension_index,
                    dimension: *dimension,
                    records: Arc::clone(&p.records),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<Record> {
        (0..n).map(|i| Record::unknown(format!("0x{:04x}", i))).collect()
    }

    #[test]
    fn test_partition_counts() {
        for (n, slots, expected) in [(10, 3, 3), (10, 4, 4), (9, 4, 3), (5, 8, 5), (100, 32, 25), (1, 1, 1)] {
            let parts = partition(&records(n), slots);
            let chunk = n.div_ceil(slots);
            assert_eq!(parts.len(), n.div_ceil(chunk), "n={n} slots={slots}");
            assert_eq!(parts.len(), expected, "n={n} slots={slots}");
        }
    }

    #[test]
    fn test_partition_covers_in_order() {
        let input = records(23);
        let parts = partition(&input, 4);

        let flattened: Vec<&Record> = parts.iter().flat_map(|p| p.records.iter()).collect();
        assert_eq!(flattened.len(), input.len());
        for (a, b) in flattened.iter().zip(input.iter()) {
            assert_eq!(a.address, b.address);
        }
        assert_eq!(parts.last().unwrap().records.len(), 5);
        assert!(parts.iter().enumerate().all(|(i, p)| p.index == i));
    }

    #[test]
    fn test_edge_cases() {
        assert!(partition(&[], 4).is_empty());
        // Zero slots behaves as one
        assert_eq!(partition(&records(7), 0).len(), 1);
    }

    #[test]
    fn test_work_units_cross_product() {
        let parts = partition(&records(12), 3);
        let units = work_units(&parts, &Dimension::ALL);
        assert_eq!(units.len(), 3 * Dimension::COUNT);

        assert_eq!(units[0].tag(), (0, 0));
        assert_eq!(units[Dimension::COUNT].tag(), (1, 0));
        assert_eq!(units.last().unwrap().tag(), (2, Dimension::COUNT - 1));
        assert_eq!(units[7].dimension, Dimension::ALL[1]);
        assert!(Arc::ptr_eq(&units[0].records, &units[5].records));
    }
}
