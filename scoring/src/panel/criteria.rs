//! Where judge criteria documents come from.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

/// Source of the criteria text for a judge.
///
/// `None` means the document is missing or unreadable; the judge then
/// fails without a model call.
pub trait CriteriaSource: Send + Sync {
    fn load(&self, file_name: &str) -> Option<String>;
}

/// Criteria files read from a prompts directory, trimmed.
#[derive(Debug, Clone)]
pub struct DirectoryCriteria {
    root: PathBuf,
}

impl DirectoryCriteria {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CriteriaSource for DirectoryCriteria {
    fn load(&self, file_name: &str) -> Option<String> {
        let path = self.root.join(file_name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Criteria document unavailable");
                None
            }
        }
    }
}

/// Fixed criteria keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCriteria {
    docs: HashMap<String, String>,
}

impl InMemoryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, text: &str) -> Self {
        self.docs.insert(file_name.to_string(), text.to_string());
        self
    }
}

impl CriteriaSource for InMemoryCriteria {
    fn load(&self, file_name: &str) -> Option<String> {
        self.docs.get(file_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_criteria_trims_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1A_Positive.txt"), "\n  Be positive.  \n").unwrap();

        let source = DirectoryCriteria::new(dir.path());
        assert_eq!(source.load("1A_Positive.txt").as_deref(), Some("Be positive."));
        assert_eq!(source.load("missing.txt"), None);
    }
}
