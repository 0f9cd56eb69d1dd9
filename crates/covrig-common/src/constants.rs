//! System-wide constants and default values.

/// Container runtime CLI used when none is configured.
pub const DEFAULT_RUNTIME_BINARY: &str = "docker";

/// Grace period, in seconds, a stop request waits before escalating to SIGKILL.
///
/// Long enough for the coverage agent to flush on a cold container.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;

/// Upper bound, in seconds, on how long the readiness waiter polls.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 60;

/// Interval between readiness and stop-status polls, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// How long to wait for the runtime to report exit after SIGKILL, in seconds.
pub const KILL_CONFIRM_TIMEOUT_SECS: u64 = 5;

/// Port the demo service listens on inside its container.
pub const SERVICE_PORT: u16 = 8080;

/// Default bind address of the demo service.
pub const DEFAULT_SERVICE_BIND: &str = "0.0.0.0:8080";

/// Route exercised by the end-to-end test.
pub const PING_ROUTE: &str = "/ping";

/// Fixed body returned by [`PING_ROUTE`].
pub const PING_BODY: &str = "pong";

/// Route that is never called and must show up as uncovered.
pub const UNUSED_ROUTE: &str = "/unused";

/// Fixed body returned by [`UNUSED_ROUTE`].
pub const UNUSED_BODY: &str = "unused";

/// Liveness route used by HTTP readiness probes. Not a coverage probe.
pub const HEALTH_ROUTE: &str = "/health";

/// Path of the service binary inside the image.
pub const SERVICE_BINARY_PATH: &str = "/usr/local/bin/pingsvc";

/// Directory inside the container the coverage artifact is written to.
pub const COVERAGE_CONTAINER_DIR: &str = "/coverage";

/// File name of the coverage artifact.
pub const COVERAGE_FILE_NAME: &str = "covrig.exec";

/// Startup flag that attaches the coverage agent to the service.
pub const COVERAGE_AGENT_FLAG: &str = "--coverage-out";

/// Environment variable selecting the runtime CLI.
pub const ENV_RUNTIME: &str = "COVRIG_RUNTIME";
/// Environment variable overriding the grace period.
pub const ENV_GRACE_PERIOD_SECS: &str = "COVRIG_GRACE_PERIOD_SECS";
/// Environment variable overriding the readiness timeout.
pub const ENV_READY_TIMEOUT_SECS: &str = "COVRIG_READY_TIMEOUT_SECS";
/// Environment variable overriding the poll interval.
pub const ENV_POLL_INTERVAL_MS: &str = "COVRIG_POLL_INTERVAL_MS";
/// Environment variable naming the coverage output file of the service.
pub const ENV_COVERAGE_OUT: &str = "COVRIG_COVERAGE_OUT";

/// Label attached to every container the harness launches.
pub const OWNER_LABEL: &str = "io.covrig.owner";

/// Application name used in CLI output and container names.
pub const APP_NAME: &str = "covrig";

/// Returns the in-container path of the coverage artifact.
#[must_use]
pub fn coverage_container_path() -> String {
    format!("{COVERAGE_CONTAINER_DIR}/{COVERAGE_FILE_NAME}")
}

/// Returns the command override that starts the service with the agent attached.
#[must_use]
pub fn agent_command() -> Vec<String> {
    vec![
        SERVICE_BINARY_PATH.to_string(),
        COVERAGE_AGENT_FLAG.to_string(),
        coverage_container_path(),
    ]
}
