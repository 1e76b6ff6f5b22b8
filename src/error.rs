//! Error type shared by the reader and writer.
//!
//! A missing key is not an error: lookups express absence as `None` or an
//! empty iterator, so `Error` only covers conditions that stop an operation.

use std::io;

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by database operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying read, write, seek, sync or rename failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is truncated or structurally inconsistent.
    #[error("invalid database format: {0}")]
    Format(&'static str),

    /// A key, value or the whole database exceeds the 32-bit layout.
    #[error("capacity exceeded: {0}")]
    Capacity(&'static str),

    /// The builder has already published its database.
    #[error("builder already finished")]
    Finished,
}
