//! error types for meshwire-store.

use thiserror::Error;

/// errors surfaced by store backends.
#[derive(Debug, Error)]
pub enum Error {
    /// no record exists for the key in the table.
    #[error("no record found for key {key} in table {table}")]
    EmptyRecord {
        /// the table that was queried.
        table: String,
        /// the key that was absent. empty for whole-table reads.
        key: String,
    },

    /// the backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl Error {
    /// build an [`Error::EmptyRecord`] for a `(table, key)` pair.
    pub fn empty_record(table: &str, key: &str) -> Self {
        Self::EmptyRecord {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    /// whether this error means the record simply does not exist.
    pub fn is_empty_record(&self) -> bool {
        matches!(self, Self::EmptyRecord { .. })
    }
}

/// result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;
