//! Service error types.

use std::net::SocketAddr;

/// Errors raised while serving or flushing coverage.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The server loop failed.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// A shutdown signal handler could not be installed.
    #[error("failed to install {signal} handler: {source}")]
    Signal {
        /// Signal name.
        signal: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Coverage could not be flushed.
    #[error(transparent)]
    Coverage(#[from] covrig_coverage::error::CoverageError),
}

/// Convenience alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
