//! Fluent description of a container launch.

use std::collections::HashSet;
use std::path::PathBuf;

use covrig_common::constants;
use covrig_common::error::{CovrigError, Result};
use covrig_common::types::{Binding, ImageRef, generate_container_name};

use crate::backend::RunRequest;

/// Builder for a container launch: image, ports, bindings, command override.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    image: ImageRef,
    name: Option<String>,
    ports: Vec<u16>,
    bindings: Vec<Binding>,
    command: Option<Vec<String>>,
    env: Vec<(String, String)>,
}

impl LaunchSpec {
    /// Starts a spec for the given image reference.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: ImageRef::new(image),
            name: None,
            ports: Vec::new(),
            bindings: Vec::new(),
            command: None,
            env: Vec::new(),
        }
    }

    /// Sets the container name. A unique name is generated otherwise.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Publishes a container port on an ephemeral host port.
    ///
    /// Exposing the same port twice has no further effect.
    #[must_use]
    pub fn expose(mut self, port: u16) -> Self {
        if !self.ports.contains(&port) {
            self.ports.push(port);
        }
        self
    }

    /// Binds a host directory read-write into the container.
    #[must_use]
    pub fn bind(self, host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        self.binding(Binding::new(host, container))
    }

    /// Binds a host directory read-only into the container.
    #[must_use]
    pub fn bind_read_only(self, host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        self.binding(Binding::read_only(host, container))
    }

    /// Adds a prepared binding.
    #[must_use]
    pub fn binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Replaces the image's launch command with an explicit argument list.
    #[must_use]
    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Binds `output_dir` as the coverage directory and starts the service
    /// with the coverage agent attached.
    #[must_use]
    pub fn with_coverage_agent(self, output_dir: impl Into<PathBuf>) -> Self {
        self.bind(output_dir, constants::COVERAGE_CONTAINER_DIR)
            .command(constants::agent_command())
    }

    /// Returns the image reference.
    #[must_use]
    pub const fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Returns the exposed container ports in declaration order.
    #[must_use]
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Validates the spec and turns it into a runtime request.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::Config` if the image is empty, a binding is not
    /// absolute, two bindings target the same container path, or the
    /// command override is empty.
    pub fn into_request(self) -> Result<RunRequest> {
        if self.image.as_str().trim().is_empty() {
            return Err(CovrigError::Config {
                message: "image reference is required".into(),
            });
        }
        let mut targets = HashSet::new();
        for binding in &self.bindings {
            binding.validate()?;
            if !targets.insert(binding.container.as_str()) {
                return Err(CovrigError::Config {
                    message: format!("container path {} is bound twice", binding.container),
                });
            }
        }
        if self.command.as_ref().is_some_and(Vec::is_empty) {
            return Err(CovrigError::Config {
                message: "command override must not be empty".into(),
            });
        }

        Ok(RunRequest {
            name: self.name.unwrap_or_else(generate_container_name),
            image: self.image,
            exposed_ports: self.ports,
            bindings: self.bindings,
            command: self.command,
            env: self.env,
            labels: vec![(
                constants::OWNER_LABEL.to_string(),
                constants::APP_NAME.to_string(),
            )],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_deduplicates_ports() {
        let spec = LaunchSpec::new("pingsvc").expose(8080).expose(8080).expose(9090);
        assert_eq!(spec.ports(), &[8080, 9090]);
    }

    #[test]
    fn coverage_agent_binds_output_and_overrides_command() {
        let request = LaunchSpec::new("pingsvc")
            .expose(8080)
            .with_coverage_agent("/tmp/cov")
            .into_request()
            .expect("request");
        assert_eq!(request.bindings, vec![Binding::new("/tmp/cov", "/coverage")]);
        assert_eq!(request.command, Some(constants::agent_command()));
        assert!(request.name.starts_with("covrig-"));
        assert_eq!(request.labels[0].0, constants::OWNER_LABEL);
    }

    #[test]
    fn relative_binding_is_rejected() {
        let result = LaunchSpec::new("pingsvc").bind("out", "/coverage").into_request();
        assert!(matches!(result, Err(CovrigError::Config { .. })));
    }

    #[test]
    fn duplicate_container_path_is_rejected() {
        let result = LaunchSpec::new("pingsvc")
            .bind("/a", "/coverage")
            .bind_read_only("/b", "/coverage")
            .into_request();
        assert!(result.is_err());
    }

    #[test]
    fn empty_image_and_empty_command_are_rejected() {
        assert!(LaunchSpec::new(" ").into_request().is_err());
        let empty: [&str; 0] = [];
        assert!(LaunchSpec::new("pingsvc").command(empty).into_request().is_err());
    }

    #[test]
    fn explicit_name_is_kept() {
        let request = LaunchSpec::new("pingsvc")
            .name("ping-under-test")
            .env("RUST_LOG", "debug")
            .into_request()
            .expect("request");
        assert_eq!(request.name, "ping-under-test");
        assert_eq!(request.env, vec![("RUST_LOG".to_string(), "debug".to_string())]);
        assert!(request.command.is_none());
    }
}
