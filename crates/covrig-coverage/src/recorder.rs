//! In-process coverage agent.
//!
//! Hits accumulate in memory only. Nothing reaches disk until
//! [`CoverageRecorder::flush`] runs from the service's exit hook, so a
//! process killed without a grace period leaves no artifact behind.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::artifact::CoverageData;
use crate::error::Result;

/// Thread-safe probe hit counter for one service session.
#[derive(Debug)]
pub struct CoverageRecorder {
    session: String,
    started_at: String,
    probes: BTreeMap<String, AtomicU64>,
    unregistered: Mutex<BTreeMap<String, u64>>,
}

impl CoverageRecorder {
    /// Creates a recorder with every known probe registered at zero hits.
    ///
    /// Registering up front is what lets a report list unexercised probes.
    #[must_use]
    pub fn new<I, S>(probes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            session: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            probes: probes
                .into_iter()
                .map(|p| (p.into(), AtomicU64::new(0)))
                .collect(),
            unregistered: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the session identifier written into the artifact.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Records one hit of the named probe.
    pub fn hit(&self, probe: &str) {
        if let Some(counter) = self.probes.get(probe) {
            let _ = counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        match self.unregistered.lock() {
            Ok(mut extra) => *extra.entry(probe.to_string()).or_insert(0) += 1,
            Err(_) => tracing::warn!(probe, "coverage recorder lock poisoned, hit dropped"),
        }
    }

    /// Returns the current hit count of a probe.
    #[must_use]
    pub fn hits(&self, probe: &str) -> u64 {
        if let Some(counter) = self.probes.get(probe) {
            return counter.load(Ordering::Relaxed);
        }
        self.unregistered
            .lock()
            .ok()
            .and_then(|extra| extra.get(probe).copied())
            .unwrap_or(0)
    }

    /// Captures the counters as artifact data stamped with the current time.
    #[must_use]
    pub fn snapshot(&self) -> CoverageData {
        let mut probes: BTreeMap<String, u64> = self
            .probes
            .iter()
            .map(|(name, counter)| (name.clone(), counter.load(Ordering::Relaxed)))
            .collect();
        if let Ok(extra) = self.unregistered.lock() {
            probes.extend(extra.iter().map(|(k, v)| (k.clone(), *v)));
        }
        CoverageData {
            session: self.session.clone(),
            started_at: self.started_at.clone(),
            written_at: chrono::Utc::now().to_rfc3339(),
            probes,
        }
    }

    /// Persists the current counters to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be written.
    pub fn flush(&self, path: &Path) -> Result<CoverageData> {
        let data = self.snapshot();
        data.write_atomic(path)?;
        tracing::info!(session = %self.session, path = %path.display(), "coverage flushed");
        Ok(data)
    }
}
