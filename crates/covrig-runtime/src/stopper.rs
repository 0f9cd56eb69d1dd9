//! Two-phase container stop: SIGTERM, bounded wait, then SIGKILL.
//!
//! State flow: `Running -> StopRequested -> ExitedGracefully | ExitedForcibly`.
//! Exit hooks inside the container (the coverage flush) only run on the
//! graceful branch.

use std::time::{Duration, Instant};

use covrig_common::constants;
use covrig_common::error::{CovrigError, Result};
use covrig_common::types::{ContainerId, ProcessStatus, StopOutcome, StopSignal, StopState};

use crate::backend::ContainerRuntime;

/// Stops containers with an explicit grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracefulStopper {
    grace_period: Duration,
    poll_interval: Duration,
    kill_timeout: Duration,
}

impl GracefulStopper {
    /// Creates a stopper that waits up to `grace_period` after SIGTERM.
    ///
    /// A zero grace period kills immediately.
    #[must_use]
    pub const fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
            kill_timeout: Duration::from_secs(constants::KILL_CONFIRM_TIMEOUT_SECS),
        }
    }

    /// A stopper that skips SIGTERM and kills straight away.
    #[must_use]
    pub const fn abrupt() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Overrides how often the process status is polled.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides how long to wait for the runtime to confirm a kill.
    #[must_use]
    pub const fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    /// Returns the configured grace period.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Stops the container and reports how it exited.
    ///
    /// # Errors
    ///
    /// Returns the runtime error if the runtime cannot be reached, or
    /// `CovrigError::Runtime` if the process survives SIGKILL. Nothing is
    /// retried.
    pub fn stop(&self, runtime: &dyn ContainerRuntime, id: &ContainerId) -> Result<StopOutcome> {
        let start = Instant::now();

        if let ProcessStatus::Exited { code } = runtime.status(id)? {
            tracing::info!(id = %id.short(), exit_code = code, "container already exited");
            return Ok(StopOutcome::AlreadyExited { exit_code: code });
        }

        log_transition(id, StopState::StopRequested, start);
        if self.grace_period.is_zero() {
            return self.kill(runtime, id, start);
        }

        if let Err(err) = runtime.signal(id, StopSignal::Term) {
            // The process may have exited between the status check and the signal.
            return match runtime.status(id) {
                Ok(ProcessStatus::Exited { code }) => Ok(graceful(id, code, start)),
                _ => Err(err),
            };
        }
        tracing::debug!(
            id = %id.short(),
            grace_ms = millis(self.grace_period),
            "SIGTERM sent"
        );

        // The flush window opens once SIGTERM has been delivered.
        let deadline = Instant::now() + self.grace_period;
        match self.wait_for_exit(runtime, id, deadline)? {
            Some(code) => Ok(graceful(id, code, start)),
            None => {
                tracing::warn!(
                    id = %id.short(),
                    grace_ms = millis(self.grace_period),
                    "grace period elapsed, escalating to SIGKILL"
                );
                self.kill(runtime, id, start)
            }
        }
    }

    fn kill(
        &self,
        runtime: &dyn ContainerRuntime,
        id: &ContainerId,
        start: Instant,
    ) -> Result<StopOutcome> {
        if let Err(err) = runtime.signal(id, StopSignal::Kill) {
            return match runtime.status(id) {
                Ok(ProcessStatus::Exited { code }) => Ok(graceful(id, code, start)),
                _ => Err(err),
            };
        }
        if self
            .wait_for_exit(runtime, id, Instant::now() + self.kill_timeout)?
            .is_none()
        {
            return Err(CovrigError::Runtime {
                command: format!("kill --signal SIGKILL {}", id.short()),
                message: format!("container still running {:?} after SIGKILL", self.kill_timeout),
            });
        }
        log_transition(id, StopState::ExitedForcibly, start);
        Ok(StopOutcome::Forced {
            elapsed: start.elapsed(),
        })
    }

    /// Polls until the process exits (returning its code) or `deadline` passes.
    fn wait_for_exit(
        &self,
        runtime: &dyn ContainerRuntime,
        id: &ContainerId,
        deadline: Instant,
    ) -> Result<Option<i32>> {
        loop {
            if let ProcessStatus::Exited { code } = runtime.status(id)? {
                return Ok(Some(code));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

impl Default for GracefulStopper {
    fn default() -> Self {
        Self::new(Duration::from_secs(constants::DEFAULT_GRACE_PERIOD_SECS))
    }
}

fn graceful(id: &ContainerId, exit_code: i32, start: Instant) -> StopOutcome {
    log_transition(id, StopState::ExitedGracefully, start);
    StopOutcome::Graceful {
        exit_code,
        elapsed: start.elapsed(),
    }
}

fn log_transition(id: &ContainerId, state: StopState, start: Instant) {
    tracing::info!(
        id = %id.short(),
        state = %state,
        elapsed_ms = millis(start.elapsed()),
        "stop state changed"
    );
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
