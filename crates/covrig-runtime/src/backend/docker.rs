//! Runtime backend that drives a Docker-compatible CLI.
//!
//! Works with `docker` and `podman`, which share the subcommands used here.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use covrig_common::constants;
use covrig_common::error::{CovrigError, Result};
use covrig_common::types::{ContainerId, ProcessStatus, StopSignal};

use super::{ContainerRuntime, RunRequest};

/// Backend that shells out to the container CLI for every operation.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    name: String,
}

impl DockerCli {
    /// Finds the runtime binary on `PATH` (or accepts an explicit path).
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::NotFound` if the binary cannot be located.
    pub fn locate(binary: &str) -> Result<Self> {
        let path = which::which(binary).map_err(|_| CovrigError::NotFound {
            kind: "container runtime binary",
            id: format!("{binary} (install Docker or set {})", constants::ENV_RUNTIME),
        })?;
        Ok(Self::with_binary(path))
    }

    /// Uses the given binary without checking that it exists.
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        let binary = binary.into();
        let name = binary
            .file_stem()
            .map_or_else(|| "docker".to_string(), |s| s.to_string_lossy().into_owned());
        Self { binary, name }
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.name, args.join(" "))
    }

    /// Runs the CLI and returns the raw output, failing only if it cannot spawn.
    fn output(&self, args: &[String]) -> Result<Output> {
        tracing::debug!(command = %self.command_line(args), "invoking runtime");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CovrigError::Runtime {
                command: self.command_line(args),
                message: e.to_string(),
            })
    }

    /// Runs the CLI and returns trimmed stdout, failing on a non-zero exit.
    fn exec(&self, args: &[String]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CovrigError::Runtime {
                command: self.command_line(args),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ContainerRuntime for DockerCli {
    fn run(&self, request: &RunRequest) -> Result<ContainerId> {
        tracing::info!(
            image = %request.image,
            name = %request.name,
            ports = ?request.exposed_ports,
            "starting container"
        );
        let stdout = self
            .exec(&build_run_args(request))
            .map_err(|e| match e {
                CovrigError::Runtime { message, .. } => CovrigError::Launch {
                    image: request.image.to_string(),
                    message,
                },
                other => other,
            })?;
        let id = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| CovrigError::Launch {
                image: request.image.to_string(),
                message: "runtime printed no container id".into(),
            })?;
        Ok(ContainerId::new(id))
    }

    fn host_port(&self, id: &ContainerId, container_port: u16) -> Result<u16> {
        let stdout = self.exec(&[
            "port".into(),
            id.to_string(),
            format!("{container_port}/tcp"),
        ])?;
        parse_port_output(&stdout).ok_or_else(|| CovrigError::NotFound {
            kind: "port mapping",
            id: format!("{}:{container_port}", id.short()),
        })
    }

    fn signal(&self, id: &ContainerId, signal: StopSignal) -> Result<()> {
        let _ = self.exec(&[
            "kill".into(),
            "--signal".into(),
            signal.as_str().into(),
            id.to_string(),
        ])?;
        Ok(())
    }

    fn status(&self, id: &ContainerId) -> Result<ProcessStatus> {
        let stdout = self.exec(&[
            "inspect".into(),
            "--format".into(),
            "{{.State.Running}} {{.State.ExitCode}}".into(),
            id.to_string(),
        ])?;
        parse_status_output(&stdout).ok_or_else(|| CovrigError::Runtime {
            command: format!("{} inspect {}", self.name, id.short()),
            message: format!("unexpected inspect output `{stdout}`"),
        })
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let _ = self.exec(&[
            "rm".into(),
            "--force".into(),
            "--volumes".into(),
            id.to_string(),
        ])?;
        tracing::debug!(id = %id.short(), "container removed");
        Ok(())
    }

    fn logs(&self, id: &ContainerId) -> Result<String> {
        let args = ["logs".to_string(), id.to_string()];
        let output = self.output(&args)?;
        if !output.status.success() {
            return Err(CovrigError::Runtime {
                command: self.command_line(&args),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.exec(&[
            "version".into(),
            "--format".into(),
            "{{.Server.Version}}".into(),
        ])
        .is_ok()
    }
}

/// Builds the `run` argument list for a request.
///
/// Ports are published on an ephemeral loopback port. A command override
/// replaces the entrypoint with its first element and passes the rest as
/// arguments.
#[must_use]
pub fn build_run_args(request: &RunRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "run".into(),
        "--detach".into(),
        "--name".into(),
        request.name.clone(),
    ];
    for (key, value) in &request.labels {
        args.push("--label".into());
        args.push(format!("{key}={value}"));
    }
    for port in &request.exposed_ports {
        args.push("--publish".into());
        args.push(format!("127.0.0.1::{port}"));
    }
    for binding in &request.bindings {
        args.push("--volume".into());
        args.push(binding.to_volume_arg());
    }
    for (key, value) in &request.env {
        args.push("--env".into());
        args.push(format!("{key}={value}"));
    }

    match request.command.as_deref() {
        Some([entrypoint, rest @ ..]) => {
            args.push("--entrypoint".into());
            args.push(entrypoint.clone());
            args.push(request.image.to_string());
            args.extend(rest.iter().cloned());
        }
        _ => args.push(request.image.to_string()),
    }
    args
}

/// Extracts the host port from `port` output such as `127.0.0.1:49153`.
///
/// Multiple lines (IPv4 and IPv6 bindings) share the same port; the first
/// parseable one wins.
#[must_use]
pub fn parse_port_output(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse().ok())
}

/// Parses `{{.State.Running}} {{.State.ExitCode}}` inspect output.
#[must_use]
pub fn parse_status_output(output: &str) -> Option<ProcessStatus> {
    let mut parts = output.split_whitespace();
    let running = parts.next()?;
    let code: i32 = parts.next()?.parse().ok()?;
    match running {
        "true" => Some(ProcessStatus::Running),
        "false" => Some(ProcessStatus::Exited { code }),
        _ => None,
    }
}
