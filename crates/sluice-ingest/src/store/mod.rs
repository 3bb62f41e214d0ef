//! Remote time-series store adapters.
//!
//! The pipeline only talks to the store through the [`SeriesStore`] trait:
//!
//! - [`HttpSeriesStore`] - JSON over HTTP, used in production
//! - [`MemoryStore`] - in-process store that records every call, used by
//!   tests and by `--dry-run`

mod http;
mod memory;

pub use http::{HttpSeriesStore, HttpStoreConfig};
pub use memory::MemoryStore;

use crate::batcher::Batch;
use async_trait::async_trait;
use sluice_core::SeriesId;
use thiserror::Error;

/// A series as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesInfo {
    pub id: SeriesId,
    pub name: String,
}

/// Request to create a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSeries {
    pub id: SeriesId,
    pub name: String,
    pub description: String,
}

/// Errors returned by store adapters.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level failure (connect, timeout, body decoding).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The adapter could not be configured.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// The store is not reachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A remote time-series store.
///
/// Every call is a fallible RPC. Callers decide how failures affect a file;
/// adapters never retry on their own.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Human-readable name for this store (used in logs).
    fn name(&self) -> &'static str;

    /// List every series that has an identifier.
    async fn list_series(&self) -> Result<Vec<SeriesInfo>, StoreError>;

    /// Create a series. Creating a series that already exists succeeds.
    async fn create_series(&self, series: &NewSeries) -> Result<(), StoreError>;

    /// Write all points of a batch in one request.
    async fn write_batch(&self, batch: &Batch) -> Result<(), StoreError>;
}
