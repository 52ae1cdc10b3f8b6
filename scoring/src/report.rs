//! Persisted evaluation reports.
//!
//! A report is built once from a [`Scorecard`] and never mutated; a resumed
//! run produces a fresh report for the same content id. Scores are rounded to
//! two decimals here and nowhere else.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::aggregate::{CategoryScore, GateStatus, JudgeLine, Scorecard};
use crate::error::{ReportError, ReportResult};
use crate::judge::{Flag, JudgeResult, PanelResults, Score};
use crate::registry::{JudgeRegistry, MECHANICAL_JUDGE};
use crate::rules::RuleViolation;

const ERROR_PREFIX: &str = "ERROR: ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub content_id: String,
    #[serde(default = "Uuid::nil")]
    pub run_id: Uuid,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub model_used: String,
    #[serde(default)]
    pub threshold_gate_1: Option<f64>,
    #[serde(default)]
    pub threshold_gate_2_tone: Option<f64>,
}

/// RFC 3339, or a naive local timestamp as older reports wrote it (read as UTC).
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.and_utc()))
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResults {
    pub overall_score: Option<f64>,
    pub publish_ready: Option<bool>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatesStatus {
    pub gate_1_overall_threshold_met: GateStatus,
    pub gate_2_tone_veto_passed: GateStatus,
    pub gate_3_brand_veto_passed: GateStatus,
    pub critical_violations_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeReport {
    pub name: String,
    pub score: Option<Score>,
    pub weight: f64,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<Flag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl JudgeReport {
    fn from_line(line: &JudgeLine) -> Self {
        Self {
            name: line.name.clone(),
            score: line.result.score(),
            weight: line.weight,
            feedback: line.result.display_feedback(),
            flags: line.result.flags().to_vec(),
            error: line.result.error().map(str::to_string),
            thinking: line.result.thinking().map(str::to_string),
        }
    }

    /// The error, also recognizing unscored entries that only carry
    /// `ERROR:` feedback. A scored judge is never a failure.
    pub fn failure(&self) -> Option<&str> {
        self.error.as_deref().or_else(|| {
            self.score
                .is_none()
                .then(|| self.feedback.strip_prefix(ERROR_PREFIX))
                .flatten()
        })
    }

    fn to_result(&self, judge_id: &str) -> ReportResult<JudgeResult> {
        if let Some(error) = self.failure() {
            return Ok(JudgeResult::failed(error));
        }
        let score = self.score.ok_or_else(|| {
            ReportError::Unparseable(format!("judge {judge_id} has neither a score nor an error"))
        })?;
        Ok(JudgeResult::Scored {
            score,
            feedback: self.feedback.clone(),
            flags: self.flags.clone(),
            thinking: self.thinking.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    #[serde(default)]
    pub name: String,
    pub parameter_score: Option<f64>,
    pub weight: f64,
    pub contribution: Option<f64>,
    #[serde(default)]
    pub has_failures: bool,
    pub sub_parameters: BTreeMap<String, JudgeReport>,
}

impl CategoryReport {
    fn from_score(category: &CategoryScore) -> Self {
        Self {
            name: category.name.clone(),
            parameter_score: category.score.map(round2),
            weight: category.weight,
            contribution: category.contribution().map(round2),
            has_failures: category.has_failures,
            sub_parameters: category
                .judges
                .iter()
                .map(|line| (line.id.clone(), JudgeReport::from_line(line)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metadata: ReportMetadata,
    pub results: ReportResults,
    pub gates_status: GatesStatus,
    pub parameters: BTreeMap<String, CategoryReport>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Keep ASCII alphanumerics, `-` and `_`; replace everything else with `_`.
pub fn sanitize_content_id(content_id: &str) -> String {
    content_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<sanitized id>_report.json`
pub fn report_file_name(content_id: &str) -> String {
    format!("{}_report.json", sanitize_content_id(content_id))
}

impl EvaluationReport {
    pub fn build(content_id: &str, model_used: &str, card: &Scorecard) -> Self {
        let gates = &card.gates;
        Self {
            metadata: ReportMetadata {
                content_id: content_id.to_string(),
                run_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                model_used: model_used.to_string(),
                threshold_gate_1: card.thresholds.quality_floor,
                threshold_gate_2_tone: card.thresholds.tone_floor,
            },
            results: ReportResults {
                overall_score: card.overall.map(round2),
                publish_ready: gates.verdict.publish_ready(),
                status: gates.verdict.status().to_string(),
            },
            gates_status: GatesStatus {
                gate_1_overall_threshold_met: gates.quality,
                gate_2_tone_veto_passed: gates.tone,
                gate_3_brand_veto_passed: gates.brand,
                critical_violations_count: gates.critical_violations,
            },
            parameters: card
                .categories
                .iter()
                .map(|c| (c.id.clone(), CategoryReport::from_score(c)))
                .collect(),
        }
    }

    pub fn content_id(&self) -> &str {
        &self.metadata.content_id
    }

    pub fn file_name(&self) -> String {
        report_file_name(&self.metadata.content_id)
    }

    fn judges(&self) -> impl Iterator<Item = (&String, &JudgeReport)> {
        self.parameters.values().flat_map(|c| c.sub_parameters.iter())
    }

    pub fn judge(&self, judge_id: &str) -> Option<&JudgeReport> {
        self.parameters
            .values()
            .find_map(|c| c.sub_parameters.get(judge_id))
    }

    /// Ids of judges recorded as failed.
    pub fn failed_judges(&self) -> Vec<String> {
        self.judges()
            .filter(|(_, j)| j.failure().is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn to_json_pretty(&self) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ReportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write pretty JSON to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> ReportResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        debug!(path = %path.display(), "Report written");
        Ok(())
    }

    /// Save into `dir` under the canonical file name. Overwrites.
    pub fn save_in(&self, dir: &Path) -> ReportResult<PathBuf> {
        let path = dir.join(self.file_name());
        self.write_to(&path)?;
        Ok(path)
    }

    pub fn read_from(path: &Path) -> ReportResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Per-judge results for every registered model-backed judge.
    ///
    /// Model judges absent from the report never ran and come back failed.
    /// The mechanical judge is excluded; see [`Self::mechanical_violations`].
    pub fn reconstruct_results(&self, registry: &JudgeRegistry) -> ReportResult<PanelResults> {
        let mut results = PanelResults::new();

        for (id, judge) in self.judges() {
            if id == MECHANICAL_JUDGE {
                continue;
            }
            if registry.get(id).is_none() {
                warn!(judge = %id, "Ignoring unregistered judge in report");
                continue;
            }
            results.insert(id.clone(), judge.to_result(id)?);
        }

        for judge in registry.model_judges() {
            results
                .entry(judge.id.clone())
                .or_insert_with(|| JudgeResult::failed("Judge did not run in the previous evaluation"));
        }

        Ok(results)
    }

    /// Rule violations recorded in the mechanical judge's flags.
    pub fn mechanical_violations(&self) -> ReportResult<Vec<RuleViolation>> {
        let judge = self.judge(MECHANICAL_JUDGE).ok_or_else(|| {
            ReportError::Unparseable(format!("report has no {MECHANICAL_JUDGE} entry"))
        })?;
        judge
            .flags
            .iter()
            .map(|flag| RuleViolation::try_from(flag).map_err(ReportError::Unparseable))
            .collect()
    }
}
