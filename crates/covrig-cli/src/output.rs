//! Formatted output helpers for CLI commands.
//!
//! Colored status markers plus human-readable duration and percentage
//! formatting.

use std::time::Duration;

use covrig_common::types::StopOutcome;

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RED: &str = "\x1b[31m";
pub const RESET: &str = "\x1b[0m";

/// Formats a duration for humans (e.g. "350ms", "2.4s", "1m 05s").
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis < 1_000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        let secs = d.as_secs();
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// Formats a coverage percentage with one decimal.
#[must_use]
pub fn format_percent(pct: f64) -> String {
    format!("{pct:.1}%")
}

/// One-line, colored summary of how a container stopped.
#[must_use]
pub fn format_outcome(outcome: &StopOutcome) -> String {
    match outcome {
        StopOutcome::AlreadyExited { exit_code } => {
            format!("{YELLOW}already exited{RESET} {DIM}(code {exit_code}){RESET}")
        }
        StopOutcome::Graceful { exit_code, elapsed } => format!(
            "{GREEN}exited gracefully{RESET} {DIM}(code {exit_code}, {}){RESET}",
            format_duration(*elapsed)
        ),
        StopOutcome::Forced { elapsed } => format!(
            "{RED}killed after grace period{RESET} {DIM}({}){RESET}",
            format_duration(*elapsed)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_displays_millis() {
        assert_eq!(format_duration(Duration::from_millis(350)), "350ms");
    }

    #[test]
    fn format_duration_displays_seconds() {
        assert_eq!(format_duration(Duration::from_millis(2_400)), "2.4s");
    }

    #[test]
    fn format_duration_displays_minutes() {
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 05s");
    }

    #[test]
    fn format_percent_rounds_to_one_decimal() {
        assert_eq!(format_percent(50.0), "50.0%");
        assert_eq!(format_percent(66.666), "66.7%");
    }

    #[test]
    fn forced_outcome_mentions_grace_period() {
        let line = format_outcome(&StopOutcome::Forced {
            elapsed: Duration::from_secs(10),
        });
        assert!(line.contains("killed after grace period"));
        assert!(line.contains("10.0s"));
    }
}
