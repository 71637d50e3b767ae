//! Error types for tasklist store operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during `SqliteStore` operations.
#[derive(Error, Debug)]
pub enum SqliteStoreError {
    /// The database file could not be opened or initialized.
    #[error("Failed to open task database at {path}: {source}")]
    Open {
        /// Location of the database file.
        path: PathBuf,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite reported an error while running a statement.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A due timestamp cannot be represented as milliseconds since the epoch.
    #[error("Due timestamp out of range: {0}")]
    TimestampOutOfRange(String),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("Database lock error")]
    LockError,
}
