//! CLI command definitions and dispatch.

pub mod inspect;
pub mod report;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use covrig_common::config::HarnessConfig;
use covrig_common::constants;
use covrig_runtime::backend;
use covrig_runtime::engine::Harness;

use crate::output::{RESET, YELLOW};

/// covrig: coverage runs against containerized services.
#[derive(Parser, Debug)]
#[command(name = "covrig", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Harness configuration file (JSON).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Container runtime CLI to drive (docker, podman).
    #[arg(long, global = true, env = constants::ENV_RUNTIME)]
    pub runtime: Option<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch an image with the coverage agent, exercise it, stop it.
    Run(run::RunArgs),
    /// Stop a running container with a grace period.
    Stop(stop::StopArgs),
    /// Summarize one or more coverage artifacts.
    Report(report::ReportArgs),
    /// Show the header and probes of a coverage artifact.
    Inspect(inspect::InspectArgs),
}

/// Global options shared by the runtime-facing commands.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    /// Harness configuration file.
    pub config: Option<PathBuf>,
    /// Runtime override.
    pub runtime: Option<String>,
}

impl GlobalOpts {
    /// Resolves the harness configuration: file, then environment, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let base = match &self.config {
            Some(path) => HarnessConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => HarnessConfig::default(),
        };
        let mut config = base.with_env_overrides()?;
        if let Some(runtime) = &self.runtime {
            config.runtime.clone_from(runtime);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Builds a harness, explaining which runtimes exist when the configured
/// one is unusable.
///
/// # Errors
///
/// Returns the harness construction error.
pub fn harness(config: HarnessConfig) -> anyhow::Result<Harness> {
    let runtime = config.runtime.clone();
    Harness::from_config(config).map_err(|e| {
        let info = backend::runtime_info();
        let yes_no = |found: bool| if found { "found" } else { "missing" };
        eprintln!(
            "  {YELLOW}Note:{RESET} runtime `{runtime}` is unusable on {}/{} \
             (docker {}, podman {}). Select one with --runtime.",
            info.os,
            info.arch,
            yes_no(info.docker_installed),
            yes_no(info.podman_installed),
        );
        e.into()
    })
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let globals = GlobalOpts {
        config: cli.config,
        runtime: cli.runtime,
    };
    match cli.command {
        Command::Run(args) => run::execute(&globals, args),
        Command::Stop(args) => stop::execute(&globals, args),
        Command::Report(args) => report::execute(args),
        Command::Inspect(args) => inspect::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn runtime_flag_overrides_config() {
        let opts = GlobalOpts {
            config: None,
            runtime: Some("podman".into()),
        };
        assert_eq!(opts.harness_config().unwrap().runtime, "podman");
    }
}
