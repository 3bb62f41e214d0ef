//! Series identity and point types.
//!
//! Column headers in the input files follow the `"<DisplayName> : <SeriesId>"`
//! convention. The identifier after the last `:` is the only key used to
//! de-duplicate series; the display name is only needed when a series has to
//! be created in the remote store.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Stable identifier of a time series in the remote store.
///
/// Always trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesId(String);

impl SeriesId {
    /// Create an identifier, trimming surrounding whitespace.
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::MissingSeriesId {
                header: id.as_ref().to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SeriesId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SeriesId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A column header split into display name and series identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesHeader {
    /// Human-readable label, used when creating the series.
    pub name: String,

    /// Identifier of the series this column feeds.
    pub id: SeriesId,
}

impl SeriesHeader {
    /// Split a header on its last `:` and trim both halves.
    ///
    /// A header without a separator is taken to be a bare identifier with an
    /// empty display name.
    pub fn parse(header: &str) -> Result<Self> {
        let (name, id) = header.rsplit_once(':').unwrap_or(("", header));
        let id = SeriesId::new(id).map_err(|_| Error::MissingSeriesId {
            header: header.to_string(),
        })?;

        Ok(Self {
            name: name.trim().to_string(),
            id,
        })
    }
}

/// A single reading: milliseconds since the Unix epoch and its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,

    /// The reading.
    pub value: f64,
}

impl Point {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// All points a single file contributes to one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoints {
    pub id: SeriesId,
    pub points: Vec<Point>,
}
