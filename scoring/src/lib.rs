//! Challenger-voice content scoring.
//!
//! Two layers feed one decision:
//!
//! 1. [`rules`]: a fixed catalog of deterministic brand rules.
//! 2. [`panel`]: independent language-model judges, one per criterion,
//!    dispatched concurrently with pacing, retry and strict reply parsing.
//!
//! [`aggregate`] folds both into weighted category scores, an overall score
//! and three publish gates. [`report`] persists the outcome and turns it back
//! into judge results when a run is resumed. [`calibration`] summarizes sets
//! of reports for threshold tuning.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use voice_scoring::{Aggregator, GateThresholds, JudgeRegistry, RuleEngine};
//!
//! let registry = Arc::new(JudgeRegistry::standard()?);
//! let violations = RuleEngine::new().check(text);
//! let panel_results = panel.evaluate(text).await;
//! let card = Aggregator::new(registry, GateThresholds::default())
//!     .aggregate(&violations, &panel_results);
//! ```

pub mod aggregate;
pub mod calibration;
pub mod error;
pub mod judge;
pub mod panel;
pub mod registry;
pub mod report;
pub mod rules;

pub use aggregate::{Aggregator, GateOutcome, GateStatus, GateThresholds, Scorecard, Verdict};
pub use calibration::{load_reports, CalibrationSummary};
pub use error::{ConfigError, EndpointError, ReportError, RetryClass};
pub use judge::{Flag, JudgeResult, PanelResults, Score};
pub use panel::{DispatchMode, JudgePanel, ModelEndpoint, RetryPolicy};
pub use registry::JudgeRegistry;
pub use report::EvaluationReport;
pub use rules::{RuleEngine, RuleViolation, Severity};
