//! `covrig inspect`: dump a coverage artifact.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use covrig_coverage::artifact::{CoverageData, FORMAT_VERSION};

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Coverage artifact to inspect.
    pub file: PathBuf,
}

/// Executes the `inspect` command.
///
/// # Errors
///
/// Returns an error if the artifact is missing, truncated, or corrupt.
pub fn execute(args: InspectArgs) -> anyhow::Result<()> {
    let size = std::fs::metadata(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?
        .len();
    let data = CoverageData::read(&args.file)?;

    println!("file:       {} ({size} bytes)", args.file.display());
    println!("format:     v{FORMAT_VERSION}");
    println!("session:    {}", data.session);
    println!("started:    {}", data.started_at);
    println!("written:    {}", data.written_at);
    println!("probes:     {}", data.probes.len());
    println!();
    println!("{:<8} PROBE", "HITS");
    for (probe, hits) in &data.probes {
        println!("{hits:<8} {probe}");
    }
    Ok(())
}
