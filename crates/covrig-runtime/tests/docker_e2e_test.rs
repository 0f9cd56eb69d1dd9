//! Full pipeline against a real container runtime.
//!
//! Needs a running Docker daemon and the service image built from the
//! repository `Dockerfile`:
//!
//! ```text
//! docker build -t covrig/pingsvc:latest .
//! cargo test -p covrig-runtime --test docker_e2e_test -- --ignored
//! ```
//!
//! `COVRIG_E2E_IMAGE` selects another image.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::time::Duration;

use covrig_common::config::HarnessConfig;
use covrig_common::constants::{self, SERVICE_PORT};
use covrig_coverage::artifact::CoverageData;
use covrig_coverage::report::CoverageReport;
use covrig_runtime::engine::Harness;
use covrig_runtime::fixture::run_scoped;
use covrig_runtime::launcher::LaunchSpec;

fn image() -> String {
    std::env::var("COVRIG_E2E_IMAGE").unwrap_or_else(|_| "covrig/pingsvc:latest".into())
}

fn harness() -> Harness {
    let config = HarnessConfig::default()
        .with_env_overrides()
        .expect("config");
    Harness::from_config(config).expect("container runtime")
}

#[test]
#[ignore = "requires a Docker daemon and the pingsvc image"]
fn ping_is_covered_and_unused_is_not() {
    let out = tempfile::tempdir().expect("tempdir");
    let harness = harness();

    let handle = harness
        .launch(
            LaunchSpec::new(image())
                .expose(SERVICE_PORT)
                .with_coverage_agent(out.path()),
        )
        .expect("launch");
    assert_eq!(handle.grace_period(), Duration::from_secs(10));

    let scoped = run_scoped(handle, |h| -> Result<String, Box<dyn std::error::Error>> {
        let _ = h.wait_ready(SERVICE_PORT, &harness.tcp_ready())?;
        let body = reqwest::blocking::get(h.url(SERVICE_PORT, constants::PING_ROUTE)?)?
            .error_for_status()?
            .text()?;
        Ok(body)
    })
    .expect("scoped run");

    assert_eq!(scoped.value, constants::PING_BODY);
    assert!(scoped.outcome.is_graceful(), "outcome: {}", scoped.outcome);

    let artifact = out.path().join(constants::COVERAGE_FILE_NAME);
    let metadata = std::fs::metadata(&artifact).expect("coverage artifact");
    assert!(metadata.len() > 0);

    let data = CoverageData::read(&artifact).expect("decode artifact");
    assert!(data.is_hit("GET /ping"));
    assert!(!data.is_hit("GET /unused"));

    let report = CoverageReport::from_data(&data);
    assert!(report.uncovered().any(|line| line.probe == "GET /unused"));
}

#[test]
#[ignore = "requires a Docker daemon and the pingsvc image"]
fn abrupt_stop_leaves_no_artifact() {
    let out = tempfile::tempdir().expect("tempdir");
    let harness = harness();

    let mut handle = harness
        .launch(
            LaunchSpec::new(image())
                .expose(SERVICE_PORT)
                .with_coverage_agent(out.path()),
        )
        .expect("launch");
    let _ = handle
        .wait_ready(SERVICE_PORT, &harness.tcp_ready())
        .expect("ready");
    handle.set_stopper(covrig_runtime::stopper::GracefulStopper::abrupt());

    let outcome = handle.stop().expect("stop");
    assert!(!outcome.is_graceful());
    assert!(!out.path().join(constants::COVERAGE_FILE_NAME).exists());
}
