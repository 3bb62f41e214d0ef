//! Core types, value normalization, and shared utilities for the Sluice extractor.
//!
//! This crate provides:
//! - Series identity (`SeriesId`, column-header splitting) and point types
//! - Normalization of raw cells (decimal comma, second-resolution timestamps)
//! - Prometheus metrics helpers
//! - Shared error types

mod error;
pub mod metrics;
mod series;
mod value;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Maximum number of series entries in a single write request.
pub const BATCH_MAX: usize = 1000;

/// Description attached to series the extractor has to create itself.
pub const AUTO_SERIES_DESCRIPTION: &str = "Auto-generated time series, external ID not found";

pub use error::{Error, Result};
pub use series::{Point, SeriesHeader, SeriesId, SeriesPoints};
pub use value::{parse_cell_value, parse_timestamp_millis};
