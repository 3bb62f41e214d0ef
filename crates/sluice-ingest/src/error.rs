//! Error types for the ingestion pipeline.
//!
//! Only [`Error::ListingFetch`] and [`Error::Config`] ever end the process;
//! everything else is recovered per file or per column.

use crate::store::StoreError;
use crate::table::TableError;
use sluice_core::SeriesId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// The input folder could not be listed.
    #[error("failed to list {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be read or does not have the expected layout.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    /// The file disappeared before it could be opened (another extractor took it).
    #[error("file vanished before it could be read: {}", .0.display())]
    Vanished(PathBuf),

    /// Creating a missing series failed.
    #[error("failed to create series {id}: {source}")]
    SeriesCreate {
        id: SeriesId,
        #[source]
        source: StoreError,
    },

    /// Writing a batch of points failed.
    #[error("failed to post {series} series from {}: {source}", .path.display())]
    Dispatch {
        path: PathBuf,
        series: usize,
        #[source]
        source: StoreError,
    },

    /// Deleting or moving a file after processing failed.
    #[error("failed to archive {}: {source}", .path.display())]
    Archival {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The startup listing of known series could not be fetched.
    #[error("could not fetch time series listing after {attempts} attempts: {source}")]
    ListingFetch {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A blocking parse worker panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_file() {
        let err = Error::Parse {
            path: PathBuf::from("/data/in/TEBIS_FK_1550092560.csv"),
            source: TableError::MissingIndexColumn,
        };
        let msg = err.to_string();
        assert!(msg.contains("TEBIS_FK_1550092560.csv"));
        assert!(msg.contains("timestamp column"));
    }

    #[test]
    fn test_listing_fetch_display() {
        let err = Error::ListingFetch {
            attempts: 10,
            source: StoreError::Unavailable("connection refused".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("10 attempts"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_archival_error_keeps_io_source() {
        let err = Error::Archival {
            path: PathBuf::from("/data/in/done.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("done.csv"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("denied"));
    }
}
