//! Rendered cluster tables
//!
//! A rendered table is a flat sequence of rows where each cluster block is
//! one [`TableRow::Header`] followed by its [`TableRow::Member`] rows. Block
//! boundaries are found by row type, never by matching cell text.

use crate::error::{Error, Result};
use crate::model::Record;

pub mod io;

pub use io::TableFormat;

/// Header row of a cluster block
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterHeader {
    pub id: String,
    /// Declared size; may diverge from the true member count between
    /// dedup and prune
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRow {
    Header(ClusterHeader),
    Member(Record),
}

impl TableRow {
    pub fn is_header(&self) -> bool {
        matches!(self, TableRow::Header(_))
    }
}

/// One header together with the member rows that follow it
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub header: ClusterHeader,
    pub members: Vec<Record>,
}

impl Block {
    pub fn true_size(&self) -> usize {
        self.members.len()
    }
}

/// Split a table into blocks at header rows
///
/// A member row appearing before the first header has no block to belong to
/// and is rejected as a schema violation.
pub fn split_blocks(rows: &[TableRow]) -> Result<Vec<Block>> {
    let mut blocks: Vec<Block> = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        match row {
            TableRow::Header(header) => blocks.push(Block {
                header: header.clone(),
                members: Vec::new(),
            }),
            TableRow::Member(record) => match blocks.last_mut() {
                Some(block) => block.members.push(record.clone()),
                None => {
                    return Err(Error::schema(
                        idx,
                        format!("member {} precedes any cluster header", record.address),
                    ))
                }
            },
        }
    }

    Ok(blocks)
}

/// Flatten blocks back into header + member rows
pub fn join_blocks(blocks: Vec<Block>) -> Vec<TableRow> {
    let mut rows = Vec::with_capacity(blocks.iter().map(|b| b.members.len() + 1).sum());
    for block in blocks {
        rows.push(TableRow::Header(block.header));
        rows.extend(block.members.into_iter().map(TableRow::Member));
    }
    rows
}

/// Number of header rows in a table
pub fn cluster_count(rows: &[TableRow]) -> usize {
    rows.iter().filter(|r| r.is_header()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(id: &str, size: usize) -> TableRow {
        TableRow::Header(ClusterHeader {
            id: id.to_string(),
            size,
        })
    }

    fn member(address: &str) -> TableRow {
        TableRow::Member(Record::unknown(address))
    }

    #[test]
    fn test_split_and_join() {
        let rows = vec![
            header("Cluster 1", 2),
            member("0x01"),
            member("0x02"),
            header("Cluster 2", 0),
            header("Cluster 3", 1),
            member("0x03"),
        ];

        let blocks = split_blocks(&rows).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].true_size(), 2);
        assert_eq!(blocks[1].true_size(), 0);
        assert_eq!(blocks[2].members[0].address, "0x03");
        assert_eq!(cluster_count(&rows), 3);

        assert_eq!(join_blocks(blocks), rows);
    }

    #[test]
    fn test_orphan_member_is_schema_violation() {
        let rows = vec![member("0x01"), header("Cluster 1", 1), member("0x02")];
        match split_blocks(&rows) {
            Err(Error::Schema { row, .. }) => assert_eq!(row, 0),
            other => panic!("expected schema violation, got {:?}", other),
        }
    }
}
