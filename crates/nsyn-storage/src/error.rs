//! Error types for the storage layer

use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Invalid file format or corrupted data
    #[error("Invalid format: {reason}")]
    InvalidFormat {
        /// Reason for invalid format
        reason: String
    },

    /// A single field does not fit into an empty chunk
    #[error("Chunk size {chunk_size} cannot hold a field of {field_len} bytes")]
    ChunkTooSmall {
        /// Configured chunk size
        chunk_size: usize,
        /// Length of the field that did not fit
        field_len: usize,
    },

    /// Write past the end of a reserved file region
    #[error("Region {region} overflow: {requested} bytes requested, {available} available")]
    RegionOverflow {
        /// Region index
        region: usize,
        /// Bytes the caller tried to write
        requested: usize,
        /// Bytes left in the region
        available: usize,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        /// Source I/O error
        source: std::io::Error,
    },
}

impl StorageError {
    /// Create an invalid format error
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StorageError::invalid_format("truncated record");
        assert!(matches!(err, StorageError::InvalidFormat { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::ChunkTooSmall {
            chunk_size: 4,
            field_len: 8,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Chunk size 4"));
        assert!(msg.contains("8 bytes"));
    }
}
