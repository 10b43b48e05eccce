//! CSV reading and writing for snapshots and rendered tables
//!
//! Columns are located by header name, so snapshots carrying a subset of the
//! schema still load: absent columns read as unknown. Unknown cells are
//! written back as the configured missing token.

use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::TableConfig;
use crate::error::{Error, Result};
use crate::model::{Chain, ChainActivity, ChainPair, Field, Record};
use crate::table::{ClusterHeader, TableRow};

pub const ADDRESS_COLUMN: &str = "Wallet Address";
pub const ACTIVATION_COLUMN: &str = "Activation day";
pub const CLUSTER_ID_COLUMN: &str = "Cluster ID";
pub const SIZE_COLUMN: &str = "Size";

/// Tokens other tools commonly emit for missing cells
const MISSING_TOKENS: [&str; 6] = ["-", "N/A", "nan", "NaN", "None", "null"];

fn date_column(chain: Chain) -> String {
    format!("{} date", chain)
}

fn value_column(chain: Chain) -> String {
    format!("{} value", chain)
}

fn hash_column(chain: Chain) -> String {
    format!("Hash {}", chain)
}

fn pair_column(pair: ChainPair) -> String {
    format!("{} dif", pair)
}

fn activation_diff_column(chain: Chain) -> String {
    format!("Activation to {} dif", chain)
}

/// Snapshot columns in output order
pub fn record_columns() -> Vec<String> {
    let mut columns = vec![ADDRESS_COLUMN.to_string(), ACTIVATION_COLUMN.to_string()];
    columns.extend(Chain::ALL.iter().map(|c| date_column(*c)));
    columns.extend(Chain::ALL.iter().map(|c| value_column(*c)));
    columns.extend(ChainPair::ALL.iter().map(|p| pair_column(*p)));
    columns.extend(Chain::ALL.iter().map(|c| activation_diff_column(*c)));
    columns.extend(Chain::ALL.iter().map(|c| hash_column(*c)));
    columns
}

/// Rendered table columns: cluster id and size, then the snapshot columns
pub fn table_columns() -> Vec<String> {
    let mut columns = vec![CLUSTER_ID_COLUMN.to_string(), SIZE_COLUMN.to_string()];
    columns.extend(record_columns());
    columns
}

/// Header name -> column position
struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { positions }
    }

    fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Cell text, or "" when the column is absent
    fn cell<'r>(&self, row: &'r StringRecord, name: &str) -> &'r str {
        self.positions
            .get(name)
            .and_then(|&i| row.get(i))
            .map(str::trim)
            .unwrap_or("")
    }
}

/// Cell conventions for reading and writing tables
#[derive(Debug, Clone)]
pub struct TableFormat {
    missing_token: String,
    header_marker: String,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self::new(&TableConfig::default())
    }
}

impl TableFormat {
    pub fn new(config: &TableConfig) -> Self {
        Self {
            missing_token: config.missing_token.clone(),
            header_marker: config.header_marker.clone(),
        }
    }

    fn is_missing(&self, cell: &str) -> bool {
        let cell = cell.trim();
        cell.is_empty() || cell == self.missing_token || MISSING_TOKENS.contains(&cell)
    }

    fn text(&self, cell: &str) -> Field<String> {
        if self.is_missing(cell) {
            Field::Unknown
        } else {
            Field::Known(cell.trim().to_string())
        }
    }

    fn parse_record(&self, index: &ColumnIndex, row: &StringRecord) -> Record {
        let activity = Chain::ALL.map(|chain| ChainActivity {
            date: Field::parse_date(index.cell(row, &date_column(chain))),
            value: Field::parse_number(index.cell(row, &value_column(chain))),
            hash: self.text(index.cell(row, &hash_column(chain))),
        });

        Record {
            address: index.cell(row, ADDRESS_COLUMN).to_string(),
            activation: Field::parse_date(index.cell(row, ACTIVATION_COLUMN)),
            activity,
            pair_diffs: ChainPair::ALL
                .map(|pair| Field::parse_number(index.cell(row, &pair_column(pair)))),
            activation_diffs: Chain::ALL
                .map(|chain| Field::parse_number(index.cell(row, &activation_diff_column(chain)))),
        }
    }

    fn date_cell(&self, field: &Field<NaiveDate>) -> String {
        match field {
            Field::Known(date) => date.format("%Y-%m-%d").to_string(),
            Field::Unknown => self.missing_token.clone(),
        }
    }

    fn number_cell(&self, field: &Field<f64>) -> String {
        match field {
            Field::Known(v) => v.to_string(),
            Field::Unknown => self.missing_token.clone(),
        }
    }

    fn text_cell(&self, field: &Field<String>) -> String {
        match field {
            Field::Known(s) => s.clone(),
            Field::Unknown => self.missing_token.clone(),
        }
    }

    /// Record cells in [`record_columns`] order
    fn record_cells(&self, record: &Record) -> Vec<String> {
        let mut cells = Vec::with_capacity(2 + 4 * Chain::COUNT + ChainPair::COUNT);
        cells.push(record.address.clone());
        cells.push(self.date_cell(&record.activation));
        cells.extend(record.activity.iter().map(|a| self.date_cell(&a.date)));
        cells.extend(record.activity.iter().map(|a| self.number_cell(&a.value)));
        cells.extend(record.pair_diffs.iter().map(|d| self.number_cell(d)));
        cells.extend(record.activation_diffs.iter().map(|d| self.number_cell(d)));
        cells.extend(record.activity.iter().map(|a| self.text_cell(&a.hash)));
        cells
    }

    /// Read an input snapshot
    pub fn read_records<R: Read>(&self, reader: R) -> Result<Vec<Record>> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let index = ColumnIndex::new(reader.headers()?);
        if !index.contains(ADDRESS_COLUMN) {
            return Err(Error::schema(0, format!("missing '{}' column", ADDRESS_COLUMN)));
        }

        let mut records = Vec::new();
        for (idx, row) in reader.records().enumerate() {
            let row = row?;
            let record = self.parse_record(&index, &row);
            if record.address.is_empty() {
                warn!(row = idx + 1, "Skipping snapshot row without wallet address");
                continue;
            }
            records.push(record);
        }

        debug!(records = records.len(), "Snapshot loaded");
        Ok(records)
    }

    pub fn write_records<W: Write>(&self, writer: W, records: &[Record]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(record_columns())?;
        for record in records {
            writer.write_record(self.record_cells(record))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a rendered table; rows whose address is the header marker are
    /// cluster headers
    pub fn read_table<R: Read>(&self, reader: R) -> Result<Vec<TableRow>> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let index = ColumnIndex::new(reader.headers()?);
        for column in [CLUSTER_ID_COLUMN, SIZE_COLUMN, ADDRESS_COLUMN] {
            if !index.contains(column) {
                return Err(Error::schema(0, format!("missing '{}' column", column)));
            }
        }

        let mut rows = Vec::new();
        for (idx, row) in reader.records().enumerate() {
            let row = row?;
            let address = index.cell(&row, ADDRESS_COLUMN);

            if address == self.header_marker {
                let id = index.cell(&row, CLUSTER_ID_COLUMN);
                if id.is_empty() {
                    return Err(Error::schema(idx, "cluster header without an id"));
                }
                let size = parse_size(index.cell(&row, SIZE_COLUMN)).ok_or_else(|| {
                    Error::schema(idx, format!("cluster header {} has no valid size", id))
                })?;
                rows.push(TableRow::Header(ClusterHeader {
                    id: id.to_string(),
                    size,
                }));
            } else if address.is_empty() {
                return Err(Error::schema(idx, "row is neither a header nor a member"));
            } else {
                rows.push(TableRow::Member(self.parse_record(&index, &row)));
            }
        }

        Ok(rows)
    }

    pub fn write_table<W: Write>(&self, writer: W, rows: &[TableRow]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        let columns = table_columns();
        writer.write_record(&columns)?;

        for row in rows {
            match row {
                TableRow::Header(header) => {
                    let mut cells = vec![String::new(); columns.len()];
                    cells[0] = header.id.clone();
                    cells[1] = header.size.to_string();
                    cells[2] = self.header_marker.clone();
                    writer.write_record(&cells)?;
                }
                TableRow::Member(record) => {
                    let mut cells = vec![String::new(), String::new()];
                    cells.extend(self.record_cells(record));
                    writer.write_record(&cells)?;
                }
            }
        }

        writer.flush()?;
        Ok(())
    }

    /// Read a wallet list: the first column of every row, skipping blanks
    /// and a leading title row
    pub fn read_wallet_list<R: Read>(&self, reader: R) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut wallets = Vec::new();
        for (idx, row) in reader.records().enumerate() {
            let row = row?;
            let wallet = row.get(0).unwrap_or("").trim();
            if wallet.is_empty() {
                continue;
            }
            if idx == 0 && !wallet.starts_with("0x") {
                debug!(title = wallet, "Skipping wallet list title row");
                continue;
            }
            wallets.push(wallet.to_string());
        }

        debug!(wallets = wallets.len(), "Wallet list loaded");
        Ok(wallets)
    }

    pub fn read_wallet_list_file(&self, path: &Path) -> Result<Vec<String>> {
        self.read_wallet_list(File::open(path)?)
    }

    pub fn read_records_file(&self, path: &Path) -> Result<Vec<Record>> {
        self.read_records(File::open(path)?)
    }

    pub fn write_records_file(&self, path: &Path, records: &[Record]) -> Result<()> {
        self.write_records(File::create(path)?, records)
    }

    pub fn read_table_file(&self, path: &Path) -> Result<Vec<TableRow>> {
        self.read_table(File::open(path)?)
    }

    pub fn write_table_file(&self, path: &Path, rows: &[TableRow]) -> Result<()> {
        self.write_table(File::create(path)?, rows)
    }
}

/// Sizes may come back as "25" or "25.0" depending on the writer
fn parse_size(cell: &str) -> Option<usize> {
    if let Ok(size) = cell.parse::<usize>() {
        return Some(size);
    }
    let value = cell.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0).then_some(value as usize)
}
