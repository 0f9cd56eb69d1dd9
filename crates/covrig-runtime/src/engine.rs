//! Harness that ties runtime, launcher and stopper together.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use covrig_common::config::HarnessConfig;
use covrig_common::error::{CovrigError, Result};
use covrig_common::types::{ContainerId, StopOutcome};

use crate::backend::{self, ContainerRuntime};
use crate::handle::{ContainerHandle, HandleParts};
use crate::launcher::LaunchSpec;
use crate::readiness::WaitStrategy;
use crate::stopper::GracefulStopper;

/// Launches containers and hands out [`ContainerHandle`]s that stop them.
///
/// Every handle it produces inherits the configured grace period, poll
/// interval and removal policy.
pub struct Harness {
    runtime: Arc<dyn ContainerRuntime>,
    config: HarnessConfig,
}

impl Harness {
    /// Builds a harness from configuration, locating the runtime binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the runtime
    /// binary cannot be found.
    pub fn from_config(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let runtime = backend::detect_runtime(&config.runtime)?;
        if !runtime.is_available() {
            return Err(CovrigError::Runtime {
                command: format!("{} version", config.runtime),
                message: "container runtime is installed but not responding".into(),
            });
        }
        tracing::debug!(runtime = runtime.name(), "container runtime ready");
        Ok(Self { runtime, config })
    }

    /// Builds a harness around an existing runtime.
    #[must_use]
    pub fn with_runtime(runtime: Arc<dyn ContainerRuntime>, config: HarnessConfig) -> Self {
        Self { runtime, config }
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Shared runtime handle.
    #[must_use]
    pub fn runtime(&self) -> Arc<dyn ContainerRuntime> {
        Arc::clone(&self.runtime)
    }

    /// Stopper built from the configured grace period and poll interval.
    #[must_use]
    pub fn stopper(&self) -> GracefulStopper {
        GracefulStopper::new(self.config.grace_period())
            .with_poll_interval(self.config.poll_interval())
    }

    /// TCP readiness with the configured timeout and interval.
    #[must_use]
    pub fn tcp_ready(&self) -> WaitStrategy {
        WaitStrategy::tcp(self.config.ready_timeout()).with_interval(self.config.poll_interval())
    }

    /// HTTP readiness on `path` with the configured timeout and interval.
    #[must_use]
    pub fn http_ready(&self, path: &str) -> WaitStrategy {
        WaitStrategy::http(path, self.config.ready_timeout())
            .with_interval(self.config.poll_interval())
    }

    /// Starts a container and resolves the host ports of its exposed ports.
    ///
    /// Does not wait for readiness.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::Config` for an invalid spec and
    /// `CovrigError::Launch` if the container fails to start or its ports
    /// cannot be resolved. A container whose ports cannot be resolved is
    /// removed before returning.
    pub fn launch(&self, spec: LaunchSpec) -> Result<ContainerHandle> {
        let request = spec.into_request()?;
        tracing::info!(
            image = %request.image,
            name = %request.name,
            ports = ?request.exposed_ports,
            bindings = request.bindings.len(),
            "launching container"
        );

        let id = self.runtime.run(&request)?;
        let mut ports = BTreeMap::new();
        for &port in &request.exposed_ports {
            match self.runtime.host_port(&id, port) {
                Ok(host) => {
                    let _ = ports.insert(port, host);
                }
                Err(e) => {
                    if let Err(remove_err) = self.runtime.remove(&id) {
                        tracing::warn!(id = %id.short(), error = %remove_err, "failed to remove container");
                    }
                    return Err(CovrigError::Launch {
                        image: request.image.to_string(),
                        message: format!("port {port} has no host mapping: {e}"),
                    });
                }
            }
        }
        tracing::info!(id = %id.short(), ports = ?ports, "container started");

        let parts = HandleParts {
            id,
            name: request.name,
            image: request.image,
            ports,
            bindings: request.bindings,
            command: request.command,
        };
        Ok(ContainerHandle::new(
            parts,
            self.runtime(),
            self.stopper(),
            self.config.remove_on_stop,
        ))
    }

    /// Stops a container this harness did not launch, by id.
    ///
    /// # Errors
    ///
    /// Returns the stop failure.
    pub fn stop(&self, id: &ContainerId, grace_period: Duration) -> Result<StopOutcome> {
        let outcome = GracefulStopper::new(grace_period)
            .with_poll_interval(self.config.poll_interval())
            .stop(self.runtime.as_ref(), id)?;
        if self.config.remove_on_stop {
            if let Err(e) = self.runtime.remove(id) {
                tracing::warn!(id = %id.short(), error = %e, "failed to remove container");
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("runtime", &self.runtime.name())
            .field("config", &self.config)
            .finish()
    }
}
