//! Conversion of parsed columns into bounded write batches.
//!
//! A [`Batch`] is the unit sent to the store in one request. The [`Batcher`]
//! accumulates per-series entries and hands back a full batch as soon as it
//! reaches the configured series count, so request size and memory stay
//! bounded no matter how many columns a file has.

use sluice_core::{Point, SeriesPoints, parse_cell_value};
use tracing::debug;

/// Series entries destined for a single write request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    entries: Vec<SeriesPoints>,
}

impl Batch {
    /// Create a batch from entries.
    pub fn from_entries(entries: Vec<SeriesPoints>) -> Self {
        Self { entries }
    }

    /// Number of series entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total points across all entries.
    pub fn point_count(&self) -> usize {
        self.entries.iter().map(|e| e.points.len()).sum()
    }

    pub fn entries(&self) -> &[SeriesPoints] {
        &self.entries
    }
}

/// Pair raw cells with their row timestamps, keeping only parseable values.
///
/// # Panics
///
/// Panics if `cells` and `timestamps` differ in length; the parser always
/// produces one cell per row.
pub fn build_points(cells: &[String], timestamps: &[i64]) -> Vec<Point> {
    assert_eq!(
        cells.len(),
        timestamps.len(),
        "column cells must line up with row timestamps"
    );

    cells
        .iter()
        .zip(timestamps)
        .filter_map(|(cell, &timestamp)| match parse_cell_value(cell) {
            Ok(Some(value)) => Some(Point::new(timestamp, value)),
            Ok(None) => None,
            Err(e) => {
                debug!("Skipping cell at {}: {}", timestamp, e);
                None
            }
        })
        .collect()
}

/// Accumulates series entries and cuts them into batches of at most
/// `max_series` entries.
#[derive(Debug)]
pub struct Batcher {
    max_series: usize,
    current: Batch,
}

impl Batcher {
    /// Create a batcher.
    ///
    /// # Panics
    ///
    /// Panics if `max_series` is zero.
    pub fn new(max_series: usize) -> Self {
        assert!(max_series > 0, "batch size must be positive");
        Self {
            max_series,
            current: Batch::default(),
        }
    }

    /// Add an entry; returns the batch it completed, if any.
    ///
    /// Entries without points are ignored.
    pub fn push(&mut self, entry: SeriesPoints) -> Option<Batch> {
        if entry.points.is_empty() {
            return None;
        }

        self.current.entries.push(entry);
        if self.current.len() >= self.max_series {
            return Some(std::mem::take(&mut self.current));
        }
        None
    }

    /// Entries accumulated since the last full batch.
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    /// Return the final, partially filled batch.
    pub fn finish(self) -> Option<Batch> {
        (!self.current.is_empty()).then_some(self.current)
    }
}
