//! Normalization of raw cells into timestamps and values.
//!
//! Files are written with a decimal comma (`12,5`); the store expects
//! ordinary floating point numbers. Index cells carry whole seconds since the
//! epoch, points carry milliseconds.

use crate::error::{Error, Result};

/// Parse a value cell.
///
/// Returns `Ok(None)` for empty cells and an error for cells that are not a
/// finite number after replacing the decimal comma with a decimal point.
pub fn parse_cell_value(cell: &str) -> Result<Option<f64>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let normalized = trimmed.replace(',', ".");
    let value = normalized
        .parse::<f64>()
        .map_err(|e| Error::InvalidValue {
            value: cell.to_string(),
            reason: e.to_string(),
        })?;

    if !value.is_finite() {
        return Err(Error::InvalidValue {
            value: cell.to_string(),
            reason: "not a finite number".to_string(),
        });
    }

    Ok(Some(value))
}

/// Parse an index cell (integer seconds) into milliseconds since the epoch.
pub fn parse_timestamp_millis(cell: &str) -> Result<i64> {
    let seconds = cell
        .trim()
        .parse::<i64>()
        .map_err(|e| Error::InvalidTimestamp {
            value: cell.to_string(),
            reason: e.to_string(),
        })?;

    seconds.checked_mul(1000).ok_or_else(|| Error::InvalidTimestamp {
        value: cell.to_string(),
        reason: "out of range".to_string(),
    })
}
