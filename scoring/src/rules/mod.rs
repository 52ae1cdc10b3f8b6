//! Deterministic brand rules (the hard layer of the scoring pipeline).
//!
//! A fixed, ordered catalog of regex rules is applied to raw content. Every
//! rule runs over the whole text and every match becomes one
//! [`RuleViolation`]. An empty result means the content is mechanically
//! compliant.
//!
//! ```text
//! text ──▶ RuleEngine::check ──▶ Vec<RuleViolation>  (catalog order, then match order)
//! ```

pub mod catalog;
pub mod engine;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use catalog::{RuleSpec, BRAND_RULES};
pub use engine::{RuleEngine, DEFAULT_CONTEXT_WINDOW};

/// How bad a rule violation is.
///
/// Only `Critical` participates in the brand veto gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Case-insensitive, so model replies like `"critical"` are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// One match of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    /// The matched text, trimmed.
    pub violation: String,
    /// Surrounding text with `...` marking clipped sides.
    pub context: String,
}

impl RuleViolation {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Whether any violation carries `Critical` severity.
pub fn has_critical(violations: &[RuleViolation]) -> bool {
    violations.iter().any(RuleViolation::is_critical)
}

/// Tally violations per severity. Every severity is present, possibly with 0.
pub fn count_by_severity(violations: &[RuleViolation]) -> BTreeMap<Severity, usize> {
    let mut counts: BTreeMap<Severity, usize> = Severity::ALL.iter().map(|s| (*s, 0)).collect();
    for v in violations {
        *counts.entry(v.severity).or_insert(0) += 1;
    }
    counts
}
