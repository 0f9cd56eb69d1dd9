//! Handle to one running container owned by a single test.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use covrig_common::error::{CovrigError, Result};
use covrig_common::types::{Binding, ContainerId, ImageRef, ProcessStatus, StopOutcome, StopState};

use crate::backend::ContainerRuntime;
use crate::readiness::{self, Attempt, Prober, WaitStrategy};
use crate::stopper::GracefulStopper;

/// A launched container and the means to stop it.
///
/// The container is stopped at most once: either explicitly through
/// [`ContainerHandle::stop`] or, failing that, when the handle is dropped.
pub struct ContainerHandle {
    id: ContainerId,
    name: String,
    image: ImageRef,
    ports: BTreeMap<u16, u16>,
    bindings: Vec<Binding>,
    command: Option<Vec<String>>,
    runtime: Arc<dyn ContainerRuntime>,
    stopper: GracefulStopper,
    remove_on_stop: bool,
    state: StopState,
    outcome: Option<StopOutcome>,
    stop_failure: Option<String>,
}

/// Everything a handle records about its container at launch time.
#[derive(Debug, Clone)]
pub(crate) struct HandleParts {
    pub(crate) id: ContainerId,
    pub(crate) name: String,
    pub(crate) image: ImageRef,
    pub(crate) ports: BTreeMap<u16, u16>,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) command: Option<Vec<String>>,
}

impl ContainerHandle {
    pub(crate) fn new(
        parts: HandleParts,
        runtime: Arc<dyn ContainerRuntime>,
        stopper: GracefulStopper,
        remove_on_stop: bool,
    ) -> Self {
        Self {
            id: parts.id,
            name: parts.name,
            image: parts.image,
            ports: parts.ports,
            bindings: parts.bindings,
            command: parts.command,
            runtime,
            stopper,
            remove_on_stop,
            state: StopState::Running,
            outcome: None,
            stop_failure: None,
        }
    }

    /// Runtime-assigned container identifier.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image the container was started from.
    #[must_use]
    pub const fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Declared host→container bindings.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Declared command override, if any.
    #[must_use]
    pub fn command(&self) -> Option<&[String]> {
        self.command.as_deref()
    }

    /// Container port → host port mappings.
    #[must_use]
    pub const fn ports(&self) -> &BTreeMap<u16, u16> {
        &self.ports
    }

    /// Current stop lifecycle state.
    #[must_use]
    pub const fn state(&self) -> StopState {
        self.state
    }

    /// Outcome of the stop, once it has happened.
    #[must_use]
    pub const fn stop_outcome(&self) -> Option<StopOutcome> {
        self.outcome
    }

    /// Grace period this handle will stop with.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        self.stopper.grace_period()
    }

    /// Replaces the stopper used at teardown.
    pub const fn set_stopper(&mut self, stopper: GracefulStopper) {
        self.stopper = stopper;
    }

    /// Host port mapped to an exposed container port.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::NotFound` if the port was not exposed.
    pub fn host_port(&self, container_port: u16) -> Result<u16> {
        self.ports
            .get(&container_port)
            .copied()
            .ok_or_else(|| CovrigError::NotFound {
                kind: "exposed port",
                id: container_port.to_string(),
            })
    }

    /// Loopback address of an exposed container port.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::NotFound` if the port was not exposed.
    pub fn address(&self, container_port: u16) -> Result<SocketAddr> {
        Ok(SocketAddr::from((
            Ipv4Addr::LOCALHOST,
            self.host_port(container_port)?,
        )))
    }

    /// `http://` URL for a path on an exposed container port.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::NotFound` if the port was not exposed.
    pub fn url(&self, container_port: u16, path: &str) -> Result<String> {
        Ok(format!("http://{}{path}", self.address(container_port)?))
    }

    /// Blocks until the exposed port passes the strategy's probe.
    ///
    /// Fails early if the container exits while being waited on.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::ReadinessTimeout` on timeout, or
    /// `CovrigError::Launch` if the container exited before becoming ready.
    pub fn wait_ready(&self, container_port: u16, strategy: &WaitStrategy) -> Result<Duration> {
        let prober = Prober::new(self.address(container_port)?, &strategy.probe)?;
        readiness::poll_until(&prober.target(), strategy, |budget| {
            match prober.probe(budget) {
                Attempt::NotReady(reason) => match self.runtime.status(&self.id) {
                    Ok(ProcessStatus::Exited { code }) => Attempt::Abort(CovrigError::Launch {
                        image: self.image.to_string(),
                        message: format!("container exited with code {code} before becoming ready"),
                    }),
                    _ => Attempt::NotReady(reason),
                },
                other => other,
            }
        })
    }

    /// Returns the container's combined output.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be reached.
    pub fn logs(&self) -> Result<String> {
        self.runtime.logs(&self.id)
    }

    /// Returns whether a stop has been attempted.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.outcome.is_some() || self.stop_failure.is_some()
    }

    /// Stops the container with the configured grace period.
    ///
    /// Only the first call reaches the runtime; later calls return the
    /// recorded outcome (or the recorded failure).
    ///
    /// # Errors
    ///
    /// Returns the stop failure, e.g. when the runtime is unreachable.
    pub fn stop(&mut self) -> Result<StopOutcome> {
        if let Some(outcome) = self.outcome {
            return Ok(outcome);
        }
        if let Some(message) = &self.stop_failure {
            return Err(CovrigError::Runtime {
                command: format!("stop {}", self.id.short()),
                message: format!("previous stop attempt failed: {message}"),
            });
        }

        self.state = StopState::StopRequested;
        match self.stopper.stop(self.runtime.as_ref(), &self.id) {
            Ok(outcome) => {
                self.state = outcome.final_state();
                self.outcome = Some(outcome);
                tracing::info!(id = %self.id.short(), %outcome, "container stopped");
                if self.remove_on_stop {
                    if let Err(e) = self.runtime.remove(&self.id) {
                        tracing::warn!(id = %self.id.short(), error = %e, "failed to remove container");
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(id = %self.id.short(), error = %e, "container stop failed");
                self.stop_failure = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("image", &self.image)
            .field("ports", &self.ports)
            .field("runtime", &self.runtime.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for ContainerHandle {
    fn drop(&mut self) {
        if !self.is_stopped() {
            tracing::debug!(id = %self.id.short(), "handle dropped before stop, stopping now");
            let _ = self.stop();
        }
    }
}
