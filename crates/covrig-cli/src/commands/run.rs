//! `covrig run`: launch, exercise, stop gracefully, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use covrig_common::constants;
use covrig_common::types::{Binding, StopOutcome};
use covrig_coverage::artifact::CoverageData;
use covrig_coverage::report::CoverageReport;
use covrig_runtime::fixture::{ScopeError, run_scoped};
use covrig_runtime::handle::ContainerHandle;
use covrig_runtime::launcher::LaunchSpec;

use super::GlobalOpts;
use crate::output::{BOLD, DIM, GREEN, RESET, YELLOW, format_duration, format_outcome, format_percent};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Service image to launch.
    pub image: String,

    /// Container port to publish on an ephemeral host port.
    #[arg(short, long = "port", default_values_t = [constants::SERVICE_PORT])]
    pub ports: Vec<u16>,

    /// Extra bind mount, `host:container[:ro|rw]`.
    #[arg(short, long = "volume")]
    pub volumes: Vec<Binding>,

    /// Host directory that receives the coverage artifact. Attaches the agent.
    #[arg(long)]
    pub coverage_dir: Option<PathBuf>,

    /// Path to request once ready (repeatable).
    #[arg(long = "probe", default_value = constants::PING_ROUTE)]
    pub probes: Vec<String>,

    /// Body every probed path must return.
    #[arg(long, default_value = constants::PING_BODY)]
    pub expect_body: Option<String>,

    /// Accept any body from the probed paths.
    #[arg(long, conflicts_with = "expect_body")]
    pub any_body: bool,

    /// Readiness timeout in seconds.
    #[arg(long)]
    pub ready_timeout: Option<u64>,

    /// Seconds between SIGTERM and SIGKILL. `0` kills immediately.
    #[arg(long)]
    pub grace_period: Option<u64>,

    /// Wait for `GET PATH` to return 200 instead of a TCP connect.
    #[arg(long)]
    pub http_health: Option<String>,

    /// Keep the container running until Ctrl+C.
    #[arg(long)]
    pub hold: bool,

    /// Command override; replaces the agent command when given.
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Body the probed paths must return, unless `--any-body` is set.
    fn expected_body(&self) -> Option<&str> {
        if self.any_body {
            None
        } else {
            self.expect_body.as_deref()
        }
    }
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if the launch, readiness wait, a probe, or the stop fails.
pub fn execute(globals: &GlobalOpts, args: RunArgs) -> anyhow::Result<()> {
    let total_start = Instant::now();
    let mut config = globals.harness_config()?;
    if let Some(secs) = args.ready_timeout {
        config.ready_timeout_secs = secs;
    }
    if let Some(secs) = args.grace_period {
        config.grace_period_secs = secs;
    }
    config.validate()?;

    let harness = super::harness(config)?;
    let coverage_dir = args
        .coverage_dir
        .as_deref()
        .map(prepare_coverage_dir)
        .transpose()?;

    eprintln!();
    eprintln!("  {BOLD}covrig{RESET} {DIM}v{}{RESET}", env!("CARGO_PKG_VERSION"));
    eprintln!();

    let spec = build_spec(&args, coverage_dir.as_deref());
    let handle = harness.launch(spec)?;
    eprintln!(
        "  {GREEN}●{RESET} {BOLD}{}{RESET} {DIM}[{}]{RESET}",
        handle.name(),
        handle.id().short()
    );

    let ready_port = args.ports.first().copied().unwrap_or(constants::SERVICE_PORT);
    let strategy = args
        .http_health
        .as_deref()
        .map_or_else(|| harness.tcp_ready(), |path| harness.http_ready(path));

    let scoped = run_scoped(handle, |h| exercise(h, ready_port, &strategy, &args));
    let outcome = match scoped {
        Ok(scoped) => scoped.outcome,
        Err(ScopeError::Body {
            error,
            outcome,
            stop_error,
        }) => {
            if let Some(outcome) = outcome {
                eprintln!("  stopped: {}", format_outcome(&outcome));
            }
            if let Some(e) = stop_error {
                tracing::error!(error = %e, "stop after failure also failed");
            }
            return Err(error);
        }
        Err(ScopeError::Stop(e)) => return Err(e.into()),
    };

    eprintln!("  stopped: {}", format_outcome(&outcome));
    if let Some(dir) = coverage_dir {
        summarize(&dir, &outcome)?;
    }
    eprintln!();
    eprintln!("  {DIM}done in {}{RESET}", format_duration(total_start.elapsed()));
    Ok(())
}

fn build_spec(args: &RunArgs, coverage_dir: Option<&Path>) -> LaunchSpec {
    let mut spec = args
        .ports
        .iter()
        .fold(LaunchSpec::new(&args.image), |spec, &port| spec.expose(port));
    for binding in &args.volumes {
        spec = spec.binding(binding.clone());
    }
    if let Some(dir) = coverage_dir {
        spec = spec.with_coverage_agent(dir);
    }
    if !args.command.is_empty() {
        spec = spec.command(args.command.iter().cloned());
    }
    spec
}

/// Bind mounts need an absolute, existing host directory.
fn prepare_coverage_dir(dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let dir = std::fs::canonicalize(dir).with_context(|| format!("resolving {}", dir.display()))?;
    let stale = dir.join(constants::COVERAGE_FILE_NAME);
    if stale.exists() {
        std::fs::remove_file(&stale).with_context(|| format!("removing {}", stale.display()))?;
    }
    Ok(dir)
}

fn exercise(
    handle: &ContainerHandle,
    port: u16,
    strategy: &covrig_runtime::readiness::WaitStrategy,
    args: &RunArgs,
) -> anyhow::Result<()> {
    let waited = handle.wait_ready(port, strategy).inspect_err(|_| {
        if let Ok(logs) = handle.logs() {
            tracing::debug!(%logs, "container output");
        }
    })?;
    eprintln!(
        "  ready at {BOLD}{}{RESET} {DIM}after {}{RESET}",
        handle.url(port, "")?,
        format_duration(waited)
    );

    let client = reqwest::blocking::Client::new();
    for path in &args.probes {
        let url = handle.url(port, path)?;
        let response = client.get(&url).send().with_context(|| format!("GET {url}"))?;
        let status = response.status();
        let body = response.text().with_context(|| format!("reading body of {url}"))?;
        eprintln!("  GET {path} {DIM}->{RESET} {status} {body:?}");
        anyhow::ensure!(status.is_success(), "GET {path} returned {status}");
        if let Some(expected) = args.expected_body() {
            anyhow::ensure!(
                body == expected,
                "GET {path} returned {body:?}, expected {expected:?}"
            );
        }
    }

    if args.hold {
        wait_for_ctrl_c()?;
    }
    Ok(())
}

fn wait_for_ctrl_c() -> anyhow::Result<()> {
    eprintln!();
    eprintln!("  Press {BOLD}Ctrl+C{RESET} to stop the container...");

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(250));
    }
    eprintln!();
    Ok(())
}

fn summarize(dir: &Path, outcome: &StopOutcome) -> anyhow::Result<()> {
    let artifact = dir.join(constants::COVERAGE_FILE_NAME);
    if !artifact.exists() {
        eprintln!(
            "  {YELLOW}no coverage artifact at {}{RESET}",
            artifact.display()
        );
        if !outcome.is_graceful() {
            eprintln!("  {DIM}the container was killed before its agent could flush{RESET}");
        }
        anyhow::bail!("coverage artifact missing: {}", artifact.display());
    }
    let data = CoverageData::read(&artifact)?;
    let report = CoverageReport::from_data(&data);
    eprintln!(
        "  coverage: {BOLD}{}/{}{RESET} probes ({}) {DIM}{}{RESET}",
        report.covered,
        report.total,
        format_percent(report.percent()),
        artifact.display()
    );
    for line in report.uncovered() {
        eprintln!("    {YELLOW}MISSED{RESET} {}", line.probe);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Command};

    fn parse(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(args).expect("parse");
        match cli.command {
            Command::Run(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn defaults_expose_service_port() {
        let args = parse(&["covrig", "run", "pingsvc"]);
        assert_eq!(args.ports, vec![8080]);
        assert!(args.command.is_empty());
        assert!(args.grace_period.is_none());
    }

    #[test]
    fn defaults_request_ping_and_expect_pong() {
        let args = parse(&["covrig", "run", "pingsvc"]);
        assert_eq!(args.probes, vec![constants::PING_ROUTE.to_string()]);
        assert_eq!(args.expected_body(), Some(constants::PING_BODY));
    }

    #[test]
    fn explicit_paths_replace_the_default() {
        let args = parse(&[
            "covrig", "run", "pingsvc", "--probe", "/unused", "--probe", "/health", "--any-body",
        ]);
        assert_eq!(args.probes, vec!["/unused".to_string(), "/health".to_string()]);
        assert_eq!(args.expected_body(), None);
    }

    #[test]
    fn any_body_conflicts_with_explicit_expectation() {
        let result = Cli::try_parse_from([
            "covrig", "run", "pingsvc", "--expect-body", "x", "--any-body",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn trailing_command_overrides_agent_command() {
        let args = parse(&[
            "covrig", "run", "pingsvc", "--coverage-dir", "/tmp/cov", "--", "/bin/sh", "-c", "true",
        ]);
        let spec = build_spec(&args, Some(Path::new("/tmp/cov")))
            .into_request()
            .expect("request");
        assert_eq!(
            spec.command,
            Some(vec!["/bin/sh".to_string(), "-c".to_string(), "true".to_string()])
        );
        assert_eq!(spec.bindings.len(), 1);
    }

    #[test]
    fn volumes_and_ports_reach_the_spec() {
        let args = parse(&[
            "covrig", "run", "pingsvc", "-p", "8080", "-p", "9090", "-v", "/data:/srv:ro",
        ]);
        let request = build_spec(&args, None).into_request().expect("request");
        assert_eq!(request.exposed_ports, vec![8080, 9090]);
        assert!(request.bindings[0].read_only);
        assert!(request.command.is_none());
    }

    #[test]
    fn coverage_dir_is_created_and_cleared() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("cov");
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join(constants::COVERAGE_FILE_NAME), b"old").expect("write");

        let prepared = prepare_coverage_dir(&dir).expect("prepare");
        assert!(prepared.is_absolute());
        assert!(!prepared.join(constants::COVERAGE_FILE_NAME).exists());
    }

    #[test]
    fn missing_artifact_after_forced_stop_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let outcome = StopOutcome::Forced {
            elapsed: Duration::from_secs(10),
        };
        assert!(summarize(tmp.path(), &outcome).is_err());
    }
}
