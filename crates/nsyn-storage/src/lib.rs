//! Checkpoint storage layer for the nsyn connection framework
//!
//! This crate owns the bit-exact record layout of connection dumps and the
//! sinks that write them: a plain streaming sink, a chunked sink for parallel
//! file layouts, and memory-mapped files split into pre-reserved regions.
//! It also provides the decoding side used by offline inspection tools.

#![deny(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod error;
pub mod record;
pub mod sink;

// Shared-file backend
pub mod region;

// Re-export essential types
pub use error::{StorageError, Result};
pub use record::{decode_records, CheckpointRecord, RecordReader};
pub use region::{RegionWriter, ReservedFile};
pub use sink::{CheckpointSink, ChunkedSink, StreamSink};

/// Storage crate version for compatibility checking
pub const STORAGE_VERSION: u32 = 1;
