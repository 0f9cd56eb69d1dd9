//! `pingsvc`: the service image the harness launches in end-to-end runs.
//!
//! Every handled route bumps a coverage probe. When a shutdown signal
//! arrives the server drains and the probes are flushed to the configured
//! artifact path. A SIGKILL skips that flush entirely.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod routes;
pub mod server;
