//! Storage abstraction trait and common types.

use std::io::{Read, Seek, Write};

use crate::error::{Result, XiphosError};

/// A trait for storage backends that hold one segment directory's blobs.
///
/// A handle is constructed per segment directory and used for the duration of
/// one read or write operation. Implementations must be usable from multiple
/// threads; the per-artifact locking discipline lives in the codecs, not here.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a blob for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a blob for writing, truncating any existing content.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a blob exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a blob. Deleting an absent blob is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List the names of all blobs currently stored under this directory.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a blob in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Rename a blob. Object-store backends implement this as
    /// copy-then-delete since they have no native rename.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Create a uniquely named temporary blob.
    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)>;

    /// Materialize the directory itself. Object-store backends may make this
    /// a no-op since the prefix convention replaces real directories.
    fn create_directory(&self) -> Result<()>;

    /// Sync all pending writes to storage.
    fn sync(&self) -> Result<()>;

    /// Close the storage and release resources.
    fn close(&mut self) -> Result<()>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;

    /// Close the input stream.
    fn close(&mut self) -> Result<()>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffered data and make it durable.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Close the output stream, flushing pending writes.
    fn close(&mut self) -> Result<()>;
}

impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        self.as_ref().size()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

/// Configuration for storage backends.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Buffer size for I/O operations.
    pub buffer_size: usize,

    /// Whether to sync writes as they happen instead of at close.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            buffer_size: 65536,
            sync_writes: false,
        }
    }
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Blob not found.
    FileNotFound(String),

    /// Blob exists but could not be opened; carries the OS/transport error.
    OpenFailed(String, String),

    /// I/O error.
    IoError(String),

    /// Storage is closed.
    StorageClosed,

    /// Invalid operation.
    InvalidOperation(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::OpenFailed(name, err) => {
                write!(f, "Failed to open file: {name}, error: {err}")
            }
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::StorageClosed => write!(f, "Storage is closed"),
            StorageError::InvalidOperation(msg) => write!(f, "Invalid operation: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for XiphosError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileNotFound(name) => XiphosError::NotFound(name),
            StorageError::OpenFailed(..) => XiphosError::OpenFailure(err.to_string()),
            other => XiphosError::storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();

        assert_eq!(config.buffer_size, 65536);
        assert!(!config.sync_writes);
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("deleted_docs".to_string());
        assert_eq!(err.to_string(), "File not found: deleted_docs");

        let err = StorageError::OpenFailed("v.rv".to_string(), "permission denied".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to open file: v.rv, error: permission denied"
        );

        let err = StorageError::StorageClosed;
        assert_eq!(err.to_string(), "Storage is closed");
    }

    #[test]
    fn test_storage_error_typed_conversion() {
        let err: XiphosError = StorageError::FileNotFound("bloom_filter".to_string()).into();
        assert!(matches!(err, XiphosError::NotFound(_)));

        let err: XiphosError =
            StorageError::OpenFailed("v.rv".to_string(), "eacces".to_string()).into();
        assert!(matches!(err, XiphosError::OpenFailure(_)));

        let err: XiphosError = StorageError::IoError("short read".to_string()).into();
        assert!(matches!(err, XiphosError::Storage(_)));
    }
}
