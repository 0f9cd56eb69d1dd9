//! Errors raised while reading or writing coverage artifacts.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for the coverage crate.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The artifact has zero length, usually because the process was killed.
    #[error("coverage artifact is empty")]
    Empty,

    /// The artifact does not start with the expected magic bytes.
    #[error("not a coverage artifact (bad magic)")]
    BadMagic,

    /// The artifact was written by an incompatible format version.
    #[error("unsupported coverage format version {0}")]
    UnsupportedVersion(u16),

    /// The artifact ends before a complete record could be read.
    #[error("coverage artifact truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        /// Byte offset of the incomplete read.
        offset: usize,
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the input.
        available: usize,
    },

    /// The trailing checksum does not match the content.
    #[error("coverage artifact checksum mismatch")]
    ChecksumMismatch,

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the string content.
        offset: usize,
    },

    /// A field holds a value the format does not allow.
    #[error("invalid coverage artifact: {message}")]
    Invalid {
        /// Description of the invalid field.
        message: String,
    },
}

/// Convenience alias for coverage results.
pub type Result<T> = std::result::Result<T, CoverageError>;
