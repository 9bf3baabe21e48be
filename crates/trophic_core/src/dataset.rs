//! Column-oriented result tables and the CSV boundary format consumed by
//! the external plotting collaborator.
//!
//! The column set is fixed per sweep kind: chain tables are `(q, extremum)`
//! rows, one file per species; web tables are `(q, diversity)` rows, one
//! file per interaction-strength regime.

use anyhow::{Context, Result};
use csv::{Reader, Writer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// One observed oscillation extremum (or equilibrium value) of one species
/// at one sweep point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BifurcationRecord {
    pub q: f64,
    pub extremum: f64,
}

/// Surviving-species count of one web run at one sweep point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiversityRecord {
    pub q: f64,
    pub diversity: u32,
}

/// Growing per-worker (and post-merge) result buffer.
#[derive(Debug, Clone)]
pub struct Table<R> {
    rows: Vec<R>,
}

impl<R> Table<R> {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn append(&mut self, row: R) {
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = R>) {
        self.rows.extend(rows);
    }

    /// Absorbs another table, preserving its row order.
    pub fn merge(&mut self, other: Table<R>) {
        self.rows.extend(other.rows);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn finalize(self) -> Vec<R> {
        self.rows
    }
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed base filenames of the chain sweep output, in species order
/// (basal, intermediate, top).
pub const CHAIN_BASENAMES: [&str; 3] = [
    "chain_basal.csv",
    "chain_intermediate.csv",
    "chain_top.csv",
];

/// Fixed base filename of the web sweep output (a regime label may be
/// appended before the extension by the caller).
pub const WEB_BASENAME: &str = "web_diversity.csv";

/// Writes rows as CSV with a header, creating missing parent directories on
/// first use. Unrecoverable I/O errors (permissions, disk full) propagate.
pub fn write_csv<R: Serialize>(path: &Path, rows: &[R]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }
    }

    let file =
        File::create(path).with_context(|| format!("Failed to create output file {:?}", path))?;
    let mut writer = Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a CSV table written by [`write_csv`].
pub fn read_csv<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut reader = Reader::from_reader(file);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.with_context(|| format!("Failed to parse row in {:?}", path))?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn table_preserves_append_order_across_merge() {
        let mut left: Table<DiversityRecord> = Table::new();
        left.append(DiversityRecord { q: 0.0, diversity: 9 });
        let mut right = Table::new();
        right.append(DiversityRecord { q: 0.1, diversity: 7 });
        right.append(DiversityRecord { q: 0.2, diversity: 10 });

        left.merge(right);
        let rows = left.finalize();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].q, 0.1);
        assert_eq!(rows[2].diversity, 10);
    }

    #[test]
    fn csv_round_trip_preserves_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CHAIN_BASENAMES[0]);
        let rows = vec![
            BifurcationRecord { q: 0.0, extremum: 0.8215 },
            BifurcationRecord { q: 0.1, extremum: 0.1234 },
            BifurcationRecord { q: 0.1, extremum: 0.9876 },
        ];

        write_csv(&path, &rows).unwrap();
        let restored: Vec<BifurcationRecord> = read_csv(&path).unwrap();
        assert_eq!(restored, rows);
    }

    #[test]
    fn csv_header_names_the_fixed_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(WEB_BASENAME);
        write_csv(&path, &[DiversityRecord { q: 0.3, diversity: 6 }]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(header, "q,diversity");
    }

    #[test]
    fn reruns_produce_byte_identical_files() {
        let dir = tempdir().unwrap();
        let rows = vec![
            BifurcationRecord { q: 0.2, extremum: 0.333333333333 },
            BifurcationRecord { q: 0.2, extremum: 1.0 / 3.0 },
        ];
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        write_csv(&a, &rows).unwrap();
        write_csv(&b, &rows).unwrap();
        assert_eq!(
            std::fs::read(&a).unwrap(),
            std::fs::read(&b).unwrap()
        );
    }
}
