//! Durable per-country progress for the hierarchy builder and the spatial
//! resolver.
//!
//! The progress file is the only state carried across runs. It is replaced
//! atomically (write to a temp file in the same directory, then rename) so a
//! crash mid-write can never leave a truncated file behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Phase state of the owning component. The log file is written on every
/// `country-done` and `failed` transition; the other states are
/// in-memory only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PhaseState {
    #[default]
    Initializing,
    Running {
        country: String,
        batch: usize,
    },
    CountryDone(String),
    Failed {
        country: String,
        error: String,
    },
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCountry {
    pub country: String,
    pub error: String,
}

/// On-disk schema: `{completed_countries, failed_countries}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressLog {
    pub completed_countries: Vec<String>,
    pub failed_countries: Vec<FailedCountry>,
    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(skip)]
    state: PhaseState,
}

impl ProgressLog {
    /// Load an existing progress file, or start empty if none exists.
    pub fn load(path: &Path) -> Result<Self> {
        let mut log = if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read progress file {}", path.display()))?;
            serde_json::from_str::<ProgressLog>(&data)
                .with_context(|| format!("Malformed progress file {}", path.display()))?
        } else {
            ProgressLog::default()
        };
        log.path = Some(path.to_path_buf());
        if !log.completed_countries.is_empty() {
            info!(
                "Resuming: {} countries already completed, {} failed",
                log.completed_countries.len(),
                log.failed_countries.len()
            );
        }
        Ok(log)
    }

    pub fn is_completed(&self, country: &str) -> bool {
        self.completed_countries.iter().any(|c| c == country)
    }

    pub fn is_failed(&self, country: &str) -> bool {
        self.failed_countries.iter().any(|f| f.country == country)
    }

    /// Subtract completed and failed countries from a worklist. Failed
    /// countries are skipped, not retried automatically.
    pub fn filter_worklist(&self, countries: Vec<String>) -> Vec<String> {
        countries
            .into_iter()
            .filter(|c| !self.is_completed(c) && !self.is_failed(c))
            .collect()
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    /// Note the batch currently in flight; not persisted.
    pub fn set_running(&mut self, country: &str, batch: usize) {
        self.state = PhaseState::Running {
            country: country.to_string(),
            batch,
        };
    }

    pub fn mark_complete_phase(&mut self) {
        self.state = PhaseState::Complete;
    }

    pub fn mark_completed(&mut self, country: &str) -> Result<()> {
        if !self.is_completed(country) {
            self.completed_countries.push(country.to_string());
        }
        self.state = PhaseState::CountryDone(country.to_string());
        self.save()
    }

    pub fn mark_failed(&mut self, country: &str, error: &str) -> Result<()> {
        if !self.is_failed(country) {
            self.failed_countries.push(FailedCountry {
                country: country.to_string(),
                error: error.to_string(),
            });
        }
        self.state = PhaseState::Failed {
            country: country.to_string(),
            error: error.to_string(),
        };
        self.save()
    }

    /// Atomically persist the current state.
    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(p) => p,
            None => return Ok(()),
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .context("Failed to create temporary progress file")?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.write_all(b"\n")?;
        tmp.persist(path)
            .with_context(|| format!("Failed to replace progress file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut log = ProgressLog::load(&path).unwrap();
        log.mark_completed("CA").unwrap();
        log.mark_completed("US").unwrap();
        log.mark_failed("IN", "transaction timeout").unwrap();

        let reloaded = ProgressLog::load(&path).unwrap();
        assert_eq!(reloaded.completed_countries, vec!["CA", "US"]);
        assert_eq!(reloaded.failed_countries.len(), 1);
        assert_eq!(reloaded.failed_countries[0].country, "IN");
    }

    #[test]
    fn worklist_subtraction_skips_completed_and_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut log = ProgressLog::load(&path).unwrap();
        log.mark_completed("CA").unwrap();
        log.mark_failed("IN", "boom").unwrap();

        let worklist = log.filter_worklist(vec![
            "CA".into(),
            "US".into(),
            "IN".into(),
            "GB".into(),
        ]);
        assert_eq!(worklist, vec!["US".to_string(), "GB".to_string()]);
    }

    #[test]
    fn marking_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut log = ProgressLog::load(&path).unwrap();
        log.mark_completed("CA").unwrap();
        log.mark_completed("CA").unwrap();
        assert_eq!(log.completed_countries.len(), 1);
    }

    #[test]
    fn state_machine_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = ProgressLog::load(&dir.path().join("p.json")).unwrap();
        assert_eq!(*log.state(), PhaseState::Initializing);
        log.set_running("CA", 3);
        assert_eq!(
            *log.state(),
            PhaseState::Running { country: "CA".into(), batch: 3 }
        );
        log.mark_completed("CA").unwrap();
        assert_eq!(*log.state(), PhaseState::CountryDone("CA".into()));
        log.mark_failed("IN", "timeout").unwrap();
        assert!(matches!(log.state(), PhaseState::Failed { .. }));
        log.mark_complete_phase();
        assert_eq!(*log.state(), PhaseState::Complete);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProgressLog::load(&dir.path().join("none.json")).unwrap();
        assert!(log.completed_countries.is_empty());
        assert!(log.failed_countries.is_empty());
    }
}
