//! Error types for kmercov.
//!
//! Configuration and I/O failures are fatal and surface through
//! [`KmerCovError`]. Recoverable conditions (invalid bases, saturated
//! counters, reprobe exhaustion) are absorbed inside the counting table and
//! the ingestion coordinator and never reach this module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in kmercov operations.
#[derive(Debug, Error)]
pub enum KmerCovError {
    /// K-mer length is outside the valid range (1-32).
    #[error("invalid k-mer length {k}: must be between {min} and {max}")]
    InvalidKmerLength { k: usize, min: u8, max: u8 },

    /// A configuration value was rejected before any work started.
    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    /// Failed to open or read a sequence file.
    #[error("failed to read sequence file '{path}': {source}")]
    SequenceRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to parse a sequence record.
    #[error("failed to parse sequence record: {details}")]
    SequenceParse { details: String },

    /// Failed to write output.
    #[error("failed to write output: {source}")]
    WriteError {
        #[source]
        source: std::io::Error,
    },

    /// The output file already exists.
    #[error("output file '{path}' already exists, will not overwrite it")]
    OutputExists { path: PathBuf },

    /// The counting table could not grow any further.
    #[error(transparent)]
    Table(#[from] TableError),

    /// A binary profile file is truncated or malformed.
    #[error("invalid profile file '{path}': {details}")]
    InvalidProfile { details: String, path: PathBuf },

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {details}")]
    ThreadPool { details: String },
}

/// Error for invalid k-mer length.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("k-mer length {k} is out of range: must be between {min} and {max}")]
pub struct KmerLengthError {
    /// The invalid k value that was provided.
    pub k: usize,
    /// Minimum valid k-mer length.
    pub min: u8,
    /// Maximum valid k-mer length.
    pub max: u8,
}

/// Error for invalid DNA base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBaseError {
    /// The invalid byte value.
    pub base: u8,
    /// Position of the invalid byte in the window.
    pub position: usize,
}

impl std::fmt::Display for InvalidBaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.base.is_ascii_graphic() || self.base == b' ' {
            write!(
                f,
                "invalid base '{}' (0x{:02x}) at position {}",
                self.base as char, self.base, self.position
            )
        } else {
            write!(
                f,
                "invalid base 0x{:02x} at position {}",
                self.base, self.position
            )
        }
    }
}

impl std::error::Error for InvalidBaseError {}

/// Errors raised by the counting table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    /// Growing the table would exceed the configured maximum capacity.
    #[error("hash table is full: growing past {capacity} slots would exceed the maximum of {max_capacity}")]
    CapacityExceeded { capacity: usize, max_capacity: usize },
}

impl From<std::io::Error> for KmerCovError {
    fn from(source: std::io::Error) -> Self {
        Self::WriteError { source }
    }
}

impl From<KmerLengthError> for KmerCovError {
    fn from(err: KmerLengthError) -> Self {
        Self::InvalidKmerLength {
            k: err.k,
            min: err.min,
            max: err.max,
        }
    }
}

/// Errors that can occur when using the builder API.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// K-mer length was not set before calling a counting method.
    #[error("k-mer length not set; call .k() first")]
    KmerLengthNotSet,

    /// Invalid k-mer length provided.
    #[error(transparent)]
    KmerLength(#[from] KmerLengthError),

    /// Error reading input or counting.
    #[error(transparent)]
    KmerCov(#[from] KmerCovError),
}
