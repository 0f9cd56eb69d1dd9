//! `covrig stop`: stop a container with a grace period.

use std::time::Duration;

use clap::Args;
use covrig_common::types::ContainerId;

use super::GlobalOpts;
use crate::output::format_outcome;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container IDs or names to stop.
    #[arg(required = true)]
    pub containers: Vec<String>,

    /// Seconds to wait after SIGTERM before SIGKILL. Defaults to the
    /// configured grace period.
    #[arg(short, long)]
    pub time: Option<u64>,

    /// Kill without a grace period. The coverage agent will not flush.
    #[arg(short, long, conflicts_with = "time")]
    pub force: bool,
}

impl StopArgs {
    fn grace_period(&self, configured: Duration) -> Duration {
        if self.force {
            Duration::ZERO
        } else {
            self.time.map_or(configured, Duration::from_secs)
        }
    }
}

/// Executes the `stop` command.
///
/// Every container is attempted; the first failure is returned afterwards.
///
/// # Errors
///
/// Returns an error if the runtime is unavailable or any stop fails.
pub fn execute(globals: &GlobalOpts, args: StopArgs) -> anyhow::Result<()> {
    let harness = super::harness(globals.harness_config()?)?;
    let grace = args.grace_period(harness.config().grace_period());
    tracing::info!(count = args.containers.len(), grace_secs = grace.as_secs(), "stopping containers");

    let mut first_error = None;
    for name in &args.containers {
        match harness.stop(&ContainerId::new(name.as_str()), grace) {
            Ok(outcome) => eprintln!("  {name}: {}", format_outcome(&outcome)),
            Err(e) => {
                eprintln!("  {name}: {e}");
                let _ = first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), |e| Err(e.into()))
}
