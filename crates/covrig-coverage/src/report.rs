//! Coverage report model and rendering.

use std::fmt::Write as _;

use serde::Serialize;

use crate::artifact::CoverageData;

/// Coverage status of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeLine {
    /// Probe name, e.g. `GET /ping`.
    pub probe: String,
    /// Number of recorded hits.
    pub hits: u64,
    /// Whether the probe was hit at least once.
    pub covered: bool,
}

/// Summary of one (possibly merged) coverage artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    /// Session identifier(s) the report was built from.
    pub session: String,
    /// Earliest recording start.
    pub started_at: String,
    /// Latest artifact write.
    pub written_at: String,
    /// Per-probe lines, sorted by probe name.
    pub probes: Vec<ProbeLine>,
    /// Number of covered probes.
    pub covered: usize,
    /// Total number of probes.
    pub total: usize,
}

impl CoverageReport {
    /// Builds a report from artifact data.
    #[must_use]
    pub fn from_data(data: &CoverageData) -> Self {
        let probes: Vec<ProbeLine> = data
            .probes
            .iter()
            .map(|(name, &hits)| ProbeLine {
                probe: name.clone(),
                hits,
                covered: hits > 0,
            })
            .collect();
        let covered = probes.iter().filter(|p| p.covered).count();
        Self {
            session: data.session.clone(),
            started_at: data.started_at.clone(),
            written_at: data.written_at.clone(),
            total: probes.len(),
            covered,
            probes,
        }
    }

    /// Percentage of covered probes, `100.0` for an empty report.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.covered as f64 * 100.0 / self.total as f64
    }

    /// Returns the coverage line of a probe, if present.
    #[must_use]
    pub fn line(&self, probe: &str) -> Option<&ProbeLine> {
        self.probes.iter().find(|p| p.probe == probe)
    }

    /// Probes that were never hit.
    pub fn uncovered(&self) -> impl Iterator<Item = &ProbeLine> {
        self.probes.iter().filter(|p| !p.covered)
    }

    /// Renders a plain-text table.
    #[must_use]
    pub fn render_text(&self) -> String {
        let width = self
            .probes
            .iter()
            .map(|p| p.probe.len())
            .max()
            .unwrap_or(5)
            .max(5);

        let mut out = String::new();
        let _ = writeln!(out, "session  {}", self.session);
        let _ = writeln!(out, "recorded {} .. {}", self.started_at, self.written_at);
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<width$}  {:>8}  STATUS", "PROBE", "HITS");
        for p in &self.probes {
            let status = if p.covered { "covered" } else { "MISSED" };
            let _ = writeln!(out, "{:<width$}  {:>8}  {status}", p.probe, p.hits);
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}/{} probes covered ({:.1}%)",
            self.covered,
            self.total,
            self.percent()
        );
        out
    }

    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
