//! Container runtime abstraction.

pub mod docker;
#[cfg(test)]
pub(crate) mod fake;

use std::sync::Arc;

use covrig_common::error::Result;
use covrig_common::types::{Binding, ContainerId, ImageRef, ProcessStatus, StopSignal};

/// Fully resolved request to start one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Container name.
    pub name: String,
    /// Image to start.
    pub image: ImageRef,
    /// Container ports to publish on ephemeral loopback host ports.
    pub exposed_ports: Vec<u16>,
    /// Host directories bound into the container.
    pub bindings: Vec<Binding>,
    /// Replacement launch command. The first element replaces the entrypoint.
    pub command: Option<Vec<String>>,
    /// Environment variables.
    pub env: Vec<(String, String)>,
    /// Labels attached to the container.
    pub labels: Vec<(String, String)>,
}

/// Operations the harness needs from a container runtime.
///
/// All calls block until the runtime answers.
pub trait ContainerRuntime: Send + Sync {
    /// Starts a detached container and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::Launch` if the image cannot be started.
    fn run(&self, request: &RunRequest) -> Result<ContainerId>;

    /// Returns the host port mapped to an exposed container port.
    ///
    /// # Errors
    ///
    /// Returns an error if the port is not published.
    fn host_port(&self, id: &ContainerId, container_port: u16) -> Result<u16>;

    /// Delivers a signal to the container's main process.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime is unreachable or the container is
    /// not running.
    fn signal(&self, id: &ContainerId, signal: StopSignal) -> Result<()>;

    /// Reports whether the main process is still running.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime is unreachable or the container is unknown.
    fn status(&self, id: &ContainerId) -> Result<ProcessStatus>;

    /// Removes a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime is unreachable.
    fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Returns the combined stdout/stderr of the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime is unreachable.
    fn logs(&self, id: &ContainerId) -> Result<String>;

    /// Short human-readable runtime name.
    fn name(&self) -> &str;

    /// Returns whether the runtime daemon answers.
    fn is_available(&self) -> bool;
}

/// Locates the configured runtime CLI on `PATH`.
///
/// # Errors
///
/// Returns `CovrigError::NotFound` if the binary does not exist.
pub fn detect_runtime(binary: &str) -> Result<Arc<dyn ContainerRuntime>> {
    let runtime = docker::DockerCli::locate(binary)?;
    tracing::debug!(runtime = runtime.name(), "container runtime detected");
    Ok(Arc::new(runtime))
}

/// Information about the runtime environment.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    /// Host operating system name.
    pub os: String,
    /// Host CPU architecture.
    pub arch: String,
    /// Whether `docker` is on `PATH`.
    pub docker_installed: bool,
    /// Whether `podman` is on `PATH`.
    pub podman_installed: bool,
}

/// Returns information about the host and installed runtimes.
#[must_use]
pub fn runtime_info() -> RuntimeInfo {
    RuntimeInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        docker_installed: which::which("docker").is_ok(),
        podman_installed: which::which("podman").is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_info_os_not_empty() {
        let info = runtime_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
    }

    #[test]
    fn detect_runtime_rejects_missing_binary() {
        let result = detect_runtime("covrig-no-such-runtime-binary");
        assert!(matches!(
            result,
            Err(covrig_common::error::CovrigError::NotFound { .. })
        ));
    }
}
