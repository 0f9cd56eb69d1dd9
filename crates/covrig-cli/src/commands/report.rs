//! `covrig report`: summarize coverage artifacts.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use covrig_coverage::artifact::CoverageData;
use covrig_coverage::report::CoverageReport;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Aligned table.
    Text,
    /// Pretty JSON.
    Json,
}

/// Arguments for the `report` command.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Coverage artifacts to merge and summarize.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Fail if coverage is below this percentage.
    #[arg(long)]
    pub fail_under: Option<f64>,
}

/// Executes the `report` command.
///
/// # Errors
///
/// Returns an error if an artifact cannot be read or coverage is below
/// `--fail-under`.
pub fn execute(args: ReportArgs) -> anyhow::Result<()> {
    let report = build_report(&args.files)?;
    match args.format {
        Format::Text => print!("{}", report.render_text()),
        Format::Json => println!("{}", report.render_json()?),
    }
    check_threshold(&report, args.fail_under)
}

fn build_report(files: &[PathBuf]) -> anyhow::Result<CoverageReport> {
    let mut merged: Option<CoverageData> = None;
    for path in files {
        let data = CoverageData::read(path).with_context(|| format!("reading {}", path.display()))?;
        tracing::debug!(path = %path.display(), probes = data.probes.len(), "artifact loaded");
        match &mut merged {
            Some(acc) => acc.merge(&data),
            None => merged = Some(data),
        }
    }
    let merged = merged.context("no coverage artifacts given")?;
    Ok(CoverageReport::from_data(&merged))
}

fn check_threshold(report: &CoverageReport, fail_under: Option<f64>) -> anyhow::Result<()> {
    if let Some(min) = fail_under {
        let pct = report.percent();
        anyhow::ensure!(pct >= min, "coverage {pct:.1}% is below the required {min:.1}%");
    }
    Ok(())
}
