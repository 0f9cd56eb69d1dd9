//! # covrig-coverage
//!
//! Route-level coverage for services that only run inside a container.
//!
//! - [`CoverageRecorder`](recorder::CoverageRecorder): the in-process agent.
//!   Counts probe hits in memory and persists them only from the exit hook.
//! - [`CoverageData`](artifact::CoverageData): the binary artifact written
//!   to the bound output directory.
//! - [`CoverageReport`](report::CoverageReport): covered/uncovered probes
//!   rendered as text or JSON.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod artifact;
pub mod error;
pub mod recorder;
pub mod report;
