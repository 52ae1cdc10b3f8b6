//! Filesystem layout for persisted reports.
//!
//! `<root>[/<subfolder>]/<sanitized content id>_report.json`

use std::path::{Path, PathBuf};

use tracing::info;

use voice_scoring::calibration::LoadedReports;
use voice_scoring::error::ReportResult;
use voice_scoring::{load_reports, EvaluationReport};

/// Subfolder for reports of known-good calibration content.
pub const GOLDEN_SUBFOLDER: &str = "golden_set";
/// Subfolder for reports of known-bad calibration content.
pub const POISON_SUBFOLDER: &str = "poison_set";

#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, subfolder: Option<&str>) -> PathBuf {
        match subfolder {
            Some(sub) => self.root.join(sub),
            None => self.root.clone(),
        }
    }

    /// Write `report` under its canonical name, replacing any earlier run.
    pub fn save(&self, report: &EvaluationReport, subfolder: Option<&str>) -> ReportResult<PathBuf> {
        let path = report.save_in(&self.dir_for(subfolder))?;
        info!(
            content_id = report.content_id(),
            path = %path.display(),
            "Report saved"
        );
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> ReportResult<EvaluationReport> {
        EvaluationReport::read_from(path)
    }

    /// Every report in `subfolder` (or the root), skipping unreadable files.
    pub fn load_all(&self, subfolder: Option<&str>) -> ReportResult<LoadedReports> {
        load_reports(&self.dir_for(subfolder))
    }
}

/// Calibration subfolder for a batch directory, judged by its name.
pub fn calibration_subfolder(dir: &Path) -> Option<&'static str> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name.contains("golden") {
        Some(GOLDEN_SUBFOLDER)
    } else if name.contains("poison") {
        Some(POISON_SUBFOLDER)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_routing_is_case_insensitive() {
        assert_eq!(calibration_subfolder(Path::new("data/Golden_Examples")), Some(GOLDEN_SUBFOLDER));
        assert_eq!(calibration_subfolder(Path::new("POISON")), Some(POISON_SUBFOLDER));
        assert_eq!(calibration_subfolder(Path::new("golden/drafts")), None);
        assert_eq!(calibration_subfolder(Path::new("/")), None);
    }

    #[test]
    fn dir_for_nests_subfolders() {
        let store = ReportStore::new("reports");
        assert_eq!(store.dir_for(None), PathBuf::from("reports"));
        assert_eq!(store.dir_for(Some(GOLDEN_SUBFOLDER)), PathBuf::from("reports/golden_set"));
    }
}
