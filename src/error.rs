//! Error types for the Xiphos library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`XiphosError`] enum. Codec-level failures are surfaced immediately to the
//! segment aggregate; multi-step operations report the first failure and
//! abort the remaining steps.

use std::io;

use anyhow;
use thiserror::Error;

/// The main error type for Xiphos operations.
#[derive(Error, Debug)]
pub enum XiphosError {
    /// I/O errors (file operations, sync, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// An expected file or blob is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// A blob could not be opened; carries the OS/transport error text
    #[error("Open failure: {0}")]
    OpenFailure(String),

    /// A ranged read exceeds the stored extent
    #[error("Range out of bounds: offset {offset} exceeds stored extent {extent}")]
    RangeOutOfBounds { offset: u64, extent: u64 },

    /// Attribute byte-width/uid-count inconsistency on add or merge
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// One of several independent blob writes failed; siblings already
    /// written are left in place
    #[error("Partial write: {0}")]
    PartialWrite(String),

    /// Similarity-index errors
    #[error("Index error: {0}")]
    Index(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with XiphosError.
pub type Result<T> = std::result::Result<T, XiphosError>;

impl XiphosError {
    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        XiphosError::Storage(msg.into())
    }

    /// Create a new not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        XiphosError::NotFound(msg.into())
    }

    /// Create a new open-failure error.
    pub fn open_failure<S: Into<String>>(msg: S) -> Self {
        XiphosError::OpenFailure(msg.into())
    }

    /// Create a new shape-mismatch error.
    pub fn shape_mismatch<S: Into<String>>(msg: S) -> Self {
        XiphosError::ShapeMismatch(msg.into())
    }

    /// Create a new partial-write error.
    pub fn partial_write<S: Into<String>>(msg: S) -> Self {
        XiphosError::PartialWrite(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        XiphosError::Index(msg.into())
    }

    /// Create a new invalid-operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        XiphosError::InvalidOperation(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        XiphosError::Other(msg.into())
    }
}
