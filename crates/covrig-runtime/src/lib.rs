//! Container lifecycle for coverage runs.
//!
//! Launch a service image with the coverage directory bound in, wait for it
//! to accept connections, then stop it with SIGTERM and a grace period so
//! the service can flush its coverage data before SIGKILL.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod backend;
pub mod engine;
pub mod fixture;
pub mod handle;
pub mod launcher;
pub mod readiness;
pub mod stopper;
