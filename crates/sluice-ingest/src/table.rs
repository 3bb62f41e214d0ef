//! Tabular parser for sensor export files.
//!
//! # File Layout
//!
//! ```text
//! ;Temperature : TT-1;Pressure : PT-7      <- header, index column is unnamed
//! s;°C;bar                                <- unit row, always discarded
//! 1550092560;12,5;1,013                   <- seconds since epoch; values
//! 1550092620;12,6;
//! ```
//!
//! Files are `;`-separated and encoded as ISO-8859-1. Every byte is decoded to
//! the code point of the same value, so headers and units never fail to
//! decode but are also never misread as UTF-8.

use crate::{Error, Result};
use sluice_core::parse_timestamp_millis;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

/// Field delimiter of the input files.
pub const DELIMITER: u8 = b';';

/// Problems with the content of a single file.
#[derive(Error, Debug)]
pub enum TableError {
    /// The file could not be read.
    #[error("cannot read file: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid delimited text.
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    /// A data row has more fields than the header names.
    #[error("line {line}: {found} fields, header has {expected}")]
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// No column with an empty header carries the timestamps.
    #[error("no timestamp column (a column with an empty header)")]
    MissingIndexColumn,

    /// A data row carries an index cell that is not a whole number of seconds.
    #[error("line {line}: {source}")]
    InvalidTimestamp {
        line: u64,
        #[source]
        source: sluice_core::Error,
    },
}

/// A value column: its raw header and one raw cell per data row.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: String,
    pub cells: Vec<String>,
}

/// Column-oriented content of one file, unit row already removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Milliseconds since the epoch, one per data row.
    pub timestamps: Vec<i64>,

    /// Value columns in header order.
    pub columns: Vec<Column>,
}

impl Table {
    /// Parse a table from raw file bytes.
    pub fn from_reader<R: Read>(reader: R) -> std::result::Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader.byte_headers()?.iter().map(decode_latin1).collect();
        let index = headers
            .iter()
            .position(|h| h.trim().is_empty())
            .ok_or(TableError::MissingIndexColumn)?;

        let value_fields: Vec<usize> = (0..headers.len()).filter(|&i| i != index).collect();
        let mut columns: Vec<Column> = value_fields
            .iter()
            .map(|&i| Column {
                header: headers[i].clone(),
                cells: Vec::new(),
            })
            .collect();
        let mut timestamps = Vec::new();

        let mut record = csv::ByteRecord::new();
        let mut rows = 0usize;
        while reader.read_byte_record(&mut record)? {
            rows += 1;
            if rows == 1 {
                // Unit annotations, not data.
                continue;
            }

            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.len() > headers.len() {
                return Err(TableError::TooManyFields {
                    line,
                    expected: headers.len(),
                    found: record.len(),
                });
            }

            let raw = decode_latin1(record.get(index).unwrap_or_default());
            let timestamp = parse_timestamp_millis(&raw)
                .map_err(|source| TableError::InvalidTimestamp { line, source })?;
            timestamps.push(timestamp);

            // Short rows leave their trailing cells empty.
            for (column, &field) in columns.iter_mut().zip(&value_fields) {
                column.cells.push(decode_latin1(record.get(field).unwrap_or_default()));
            }
        }

        Ok(Self {
            timestamps,
            columns,
        })
    }

    /// Number of data rows (excluding header and unit row).
    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Read and parse one file.
///
/// A file that no longer exists yields [`Error::Vanished`]; every other
/// problem is an [`Error::Parse`].
pub fn parse_file(path: &Path) -> Result<Table> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::Vanished(path.to_path_buf()));
        }
        Err(e) => {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                source: TableError::Io(e),
            });
        }
    };

    Table::from_reader(bytes.as_slice()).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode ISO-8859-1 bytes.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> Table {
        Table::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_unit_row_discarded_and_index_removed() {
        let table = parse(";A:ext1;B:ext2\nunit;unit;unit\n1000;1.5;\n2000;;3,0\n");

        assert_eq!(table.timestamps, vec![1_000_000, 2_000_000]);
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[0].header, "A:ext1");
        assert_eq!(table.columns[0].cells, vec!["1.5", ""]);
        assert_eq!(table.columns[1].header, "B:ext2");
        assert_eq!(table.columns[1].cells, vec!["", "3,0"]);
    }

    #[test]
    fn test_index_column_need_not_be_first() {
        let table = parse("A:ext1;;B:ext2\nu;s;u\n7;1000;8\n");

        assert_eq!(table.timestamps, vec![1_000_000]);
        assert_eq!(table.columns[0].cells, vec!["7"]);
        assert_eq!(table.columns[1].cells, vec!["8"]);
    }

    #[test]
    fn test_header_only_file_has_no_rows() {
        let table = parse(";A:ext1\n");
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.columns.len(), 1);
        assert!(table.columns[0].cells.is_empty());
    }

    #[test]
    fn test_quoted_fields() {
        let table = parse(";\"Flow; total : FT-1\"\nu;u\n1000;\"12,5\"\n");
        assert_eq!(table.columns[0].header, "Flow; total : FT-1");
        assert_eq!(table.columns[0].cells, vec!["12,5"]);
    }

    #[test]
    fn test_latin1_bytes_decode_to_same_code_points() {
        // "Temp °C" with the degree sign as the single byte 0xB0.
        let mut bytes = b";Temp \xb0C:TT-1\nu;u\n1000;1\n".to_vec();
        bytes.extend_from_slice(b"2000;\xe9\n");
        let table = Table::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(table.columns[0].header, "Temp °C:TT-1");
        assert_eq!(table.columns[0].cells, vec!["1", "é"]);
    }

    #[test]
    fn test_missing_index_column() {
        let err = Table::from_reader("A:ext1;B:ext2\nu;u\n1;2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::MissingIndexColumn));
    }

    #[test]
    fn test_bad_timestamp_fails_file() {
        let err = Table::from_reader(";A:ext1\nu;u\n1000;1\nlater;2\n".as_bytes()).unwrap_err();
        match err {
            TableError::InvalidTimestamp { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_row_leaves_missing_cells_empty() {
        let table = parse(";A:ext1;B:ext2\nunit;unit;unit\n1000;1,5;2\n2000;3\n");

        assert_eq!(table.timestamps, vec![1_000_000, 2_000_000]);
        assert_eq!(table.columns[0].cells, vec!["1,5", "3"]);
        assert_eq!(table.columns[1].cells, vec!["2", ""]);
    }

    #[test]
    fn test_short_unit_row_is_accepted() {
        let table = parse(";A:ext1;B:ext2\nunit\n1000;1;2\n");
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_long_row_fails_file() {
        let err = Table::from_reader(";A:ext1\nu;u\n1000;1;2\n".as_bytes()).unwrap_err();
        match err {
            TableError::TooManyFields {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.csv");
        fs::write(&path, "A;B\n1;2\n").unwrap();

        let err = parse_file(&path).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("broken.csv"));
    }

    #[test]
    fn test_parse_file_missing_is_vanished() {
        let tmp = TempDir::new().unwrap();
        let err = parse_file(&tmp.path().join("gone.csv")).unwrap_err();
        assert!(matches!(err, Error::Vanished(_)));
    }
}
