//! Unified error types for the covrig workspace.
//!
//! The coverage crate defines its own artifact error enum; everything
//! touching the container lifecycle reports through [`CovrigError`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CovrigError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The container could not be started.
    #[error("failed to launch {image}: {message}")]
    Launch {
        /// Image reference that failed to start.
        image: String,
        /// Description of the failure.
        message: String,
    },

    /// The launched process never became ready.
    #[error("{target} not ready after {elapsed:?} (timeout {timeout:?})")]
    ReadinessTimeout {
        /// Address or URL that was polled.
        target: String,
        /// Time spent polling before giving up.
        elapsed: Duration,
        /// Configured timeout.
        timeout: Duration,
    },

    /// The container runtime could not be reached or rejected a command.
    #[error("runtime command `{command}` failed: {message}")]
    Runtime {
        /// Command line that was executed.
        command: String,
        /// Stderr output or spawn error.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CovrigError {
    /// Returns `true` for failures that occur before the test body runs.
    #[must_use]
    pub const fn is_setup_failure(&self) -> bool {
        matches!(self, Self::Launch { .. } | Self::ReadinessTimeout { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CovrigError>;
