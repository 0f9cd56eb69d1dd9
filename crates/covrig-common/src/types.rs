//! Domain primitive types used across the covrig workspace.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CovrigError;

/// Identifier the runtime assigned to a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 characters, the way container CLIs abbreviate IDs.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a container image (`name[:tag]` or `name@digest`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    /// Creates an image reference from a string value.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates a unique container name for a harness launch.
#[must_use]
pub fn generate_container_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", crate::constants::APP_NAME, &id[..12])
}

/// A host directory bound into the container filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Absolute path on the host.
    pub host: PathBuf,
    /// Absolute path inside the container.
    pub container: String,
    /// Whether the container sees the directory read-only.
    pub read_only: bool,
}

impl Binding {
    /// Creates a read-write binding.
    #[must_use]
    pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: false,
        }
    }

    /// Creates a read-only binding.
    #[must_use]
    pub fn read_only(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            read_only: true,
            ..Self::new(host, container)
        }
    }

    /// Checks that both sides of the binding are absolute paths.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::Config` if either path is relative.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.host.is_absolute() {
            return Err(CovrigError::Config {
                message: format!("binding host path must be absolute: {}", self.host.display()),
            });
        }
        if !self.container.starts_with('/') {
            return Err(CovrigError::Config {
                message: format!("binding container path must be absolute: {}", self.container),
            });
        }
        Ok(())
    }

    /// Renders the binding in `host:container[:ro]` volume syntax.
    #[must_use]
    pub fn to_volume_arg(&self) -> String {
        let mut arg = format!("{}:{}", self.host.display(), self.container);
        if self.read_only {
            arg.push_str(":ro");
        }
        arg
    }
}

impl FromStr for Binding {
    type Err = CovrigError;

    /// Parses `host:container` or `host:container:ro` / `:rw`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CovrigError::Config {
            message: format!("invalid binding `{s}`, expected HOST:CONTAINER[:ro|rw]"),
        };
        let mut parts = s.split(':');
        let host = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let container = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let read_only = match parts.next() {
            None | Some("rw") => false,
            Some("ro") => true,
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self {
            host: PathBuf::from(host),
            container: container.to_string(),
            read_only,
        })
    }
}

/// Signal delivered to the container's main process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopSignal {
    /// Polite termination request; lets exit hooks run.
    Term,
    /// Forced termination; exit hooks never run.
    Kill,
}

impl StopSignal {
    /// Returns the signal name as understood by container CLIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Term => "SIGTERM",
            Self::Kill => "SIGKILL",
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed status of a container's main process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The process is still running.
    Running,
    /// The process exited with the given code.
    Exited {
        /// Exit code reported by the runtime.
        code: i32,
    },
}

/// Lifecycle state of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopState {
    /// The container is running and no stop was requested yet.
    Running,
    /// SIGTERM was sent and the grace period is running.
    StopRequested,
    /// The process exited within the grace period.
    ExitedGracefully,
    /// The grace period elapsed and the process was killed.
    ExitedForcibly,
}

impl fmt::Display for StopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::StopRequested => write!(f, "stop-requested"),
            Self::ExitedGracefully => write!(f, "exited-gracefully"),
            Self::ExitedForcibly => write!(f, "exited-forcibly"),
        }
    }
}

/// Result of a completed stop operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process had already exited before the stop request.
    AlreadyExited {
        /// Exit code reported by the runtime.
        exit_code: i32,
    },
    /// The process exited on its own within the grace period.
    Graceful {
        /// Exit code reported by the runtime.
        exit_code: i32,
        /// Time between SIGTERM and observed exit.
        elapsed: Duration,
    },
    /// The process was killed after the grace period (or immediately for `T = 0`).
    Forced {
        /// Time between the stop request and observed exit.
        elapsed: Duration,
    },
}

impl StopOutcome {
    /// Returns `true` if the process had the chance to run its exit hooks.
    #[must_use]
    pub const fn is_graceful(&self) -> bool {
        !matches!(self, Self::Forced { .. })
    }

    /// Returns the terminal lifecycle state this outcome corresponds to.
    #[must_use]
    pub const fn final_state(&self) -> StopState {
        match self {
            Self::AlreadyExited { .. } | Self::Graceful { .. } => StopState::ExitedGracefully,
            Self::Forced { .. } => StopState::ExitedForcibly,
        }
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExited { exit_code } => write!(f, "already exited (code {exit_code})"),
            Self::Graceful { exit_code, elapsed } => {
                write!(f, "exited gracefully in {:.1}s (code {exit_code})", elapsed.as_secs_f64())
            }
            Self::Forced { elapsed } => {
                write!(f, "killed after {:.1}s", elapsed.as_secs_f64())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_parses_read_only_suffix() {
        let b: Binding = "/tmp/agent:/agent:ro".parse().expect("parse");
        assert_eq!(b.host, PathBuf::from("/tmp/agent"));
        assert_eq!(b.container, "/agent");
        assert!(b.read_only);
    }

    #[test]
    fn binding_defaults_to_read_write() {
        let b: Binding = "/tmp/out:/coverage".parse().expect("parse");
        assert!(!b.read_only);
        assert_eq!(b.to_volume_arg(), "/tmp/out:/coverage");
    }

    #[test]
    fn binding_rejects_unknown_mode_and_missing_side() {
        assert!("/a:/b:zz".parse::<Binding>().is_err());
        assert!("/a".parse::<Binding>().is_err());
        assert!(":/b".parse::<Binding>().is_err());
        assert!("/a:/b:ro:extra".parse::<Binding>().is_err());
    }

    #[test]
    fn binding_validate_requires_absolute_paths() {
        assert!(Binding::new("relative", "/coverage").validate().is_err());
        assert!(Binding::new("/abs", "coverage").validate().is_err());
        assert!(Binding::read_only("/abs", "/agent").validate().is_ok());
    }

    #[test]
    fn read_only_binding_renders_ro_suffix() {
        let b = Binding::read_only("/opt/agent", "/agent");
        assert_eq!(b.to_volume_arg(), "/opt/agent:/agent:ro");
    }

    #[test]
    fn container_id_short_truncates_long_ids() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn generated_names_are_unique_and_prefixed() {
        let a = generate_container_name();
        let b = generate_container_name();
        assert!(a.starts_with("covrig-"));
        assert_ne!(a, b);
    }

    #[test]
    fn forced_outcome_is_not_graceful() {
        let forced = StopOutcome::Forced {
            elapsed: Duration::from_secs(10),
        };
        assert!(!forced.is_graceful());
        assert_eq!(forced.final_state(), StopState::ExitedForcibly);

        let graceful = StopOutcome::Graceful {
            exit_code: 0,
            elapsed: Duration::from_millis(300),
        };
        assert!(graceful.is_graceful());
        assert_eq!(graceful.final_state(), StopState::ExitedGracefully);
    }
}
