//! Error types for value and header normalization.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while normalizing raw cells and headers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A cell could not be read as a number, even after decimal-comma normalization.
    #[error("invalid value {value:?}: {reason}")]
    InvalidValue {
        /// The raw cell text.
        value: String,
        /// Description of what's wrong.
        reason: String,
    },

    /// An index cell is not an integer number of seconds since the epoch.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The raw index cell text.
        value: String,
        /// Description of what's wrong.
        reason: String,
    },

    /// A column header has no usable series identifier.
    #[error("column header {header:?} does not name a series")]
    MissingSeriesId {
        /// The raw header text.
        header: String,
    },
}
