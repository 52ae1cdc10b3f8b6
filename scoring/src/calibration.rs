//! Summary statistics over a set of persisted reports.
//!
//! Used to compare golden and poison reference sets when picking gate
//! thresholds. Null scores (failed judges, null categories) are ignored in
//! every average and distribution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::aggregate::GateStatus;
use crate::error::{ReportError, ReportResult};
use crate::report::EvaluationReport;

/// Counts of scores in `[1,2)`, `[2,3)` and `[3,4]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub low: usize,
    pub mid: usize,
    pub high: usize,
}

impl Distribution {
    fn record(&mut self, score: f64) {
        if score < 2.0 {
            self.low += 1;
        } else if score < 3.0 {
            self.mid += 1;
        } else {
            self.high += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateFailures {
    pub quality: usize,
    pub tone: usize,
    pub brand: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationSummary {
    pub total_reports: usize,
    pub average_overall: Option<f64>,
    pub category_averages: BTreeMap<String, Option<f64>>,
    pub judge_averages: BTreeMap<String, Option<f64>>,
    pub total_critical_violations: usize,
    /// Content ids with at least one critical violation, and how many.
    pub violation_details: Vec<(String, usize)>,
    pub pass_count: usize,
    pub gate_failures: GateFailures,
    pub overall_distribution: Distribution,
    pub category_distributions: BTreeMap<String, Distribution>,
}

#[derive(Default)]
struct Samples(Vec<f64>);

impl Samples {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.0.push(v);
        }
    }

    fn mean(&self) -> Option<f64> {
        (!self.0.is_empty()).then(|| self.0.iter().sum::<f64>() / self.0.len() as f64)
    }

    fn distribution(&self) -> Distribution {
        let mut dist = Distribution::default();
        for &v in &self.0 {
            dist.record(v);
        }
        dist
    }
}

impl CalibrationSummary {
    pub fn from_reports(reports: &[EvaluationReport]) -> Self {
        let mut overall = Samples::default();
        let mut categories: BTreeMap<String, Samples> = BTreeMap::new();
        let mut judges: BTreeMap<String, Samples> = BTreeMap::new();
        let mut gate_failures = GateFailures::default();
        let mut violation_details = Vec::new();
        let mut total_critical_violations = 0;
        let mut pass_count = 0;

        for report in reports {
            overall.push(report.results.overall_score);

            for (category_id, category) in &report.parameters {
                categories
                    .entry(category_id.clone())
                    .or_default()
                    .push(category.parameter_score);
                for (judge_id, judge) in &category.sub_parameters {
                    judges
                        .entry(judge_id.clone())
                        .or_default()
                        .push(judge.score.map(|s| s.as_f64()));
                }
            }

            let gates = &report.gates_status;
            let count = gates.critical_violations_count;
            total_critical_violations += count;
            if count > 0 {
                violation_details.push((report.content_id().to_string(), count));
            }
            if gates.gate_1_overall_threshold_met == GateStatus::Failed {
                gate_failures.quality += 1;
            }
            if gates.gate_2_tone_veto_passed == GateStatus::Failed {
                gate_failures.tone += 1;
            }
            if gates.gate_3_brand_veto_passed == GateStatus::Failed {
                gate_failures.brand += 1;
            }
            if report.results.publish_ready == Some(true) {
                pass_count += 1;
            }
        }

        Self {
            total_reports: reports.len(),
            average_overall: overall.mean(),
            category_averages: categories.iter().map(|(k, s)| (k.clone(), s.mean())).collect(),
            judge_averages: judges.iter().map(|(k, s)| (k.clone(), s.mean())).collect(),
            total_critical_violations,
            violation_details,
            pass_count,
            gate_failures,
            overall_distribution: overall.distribution(),
            category_distributions: categories
                .iter()
                .map(|(k, s)| (k.clone(), s.distribution()))
                .collect(),
        }
    }

    /// Share of reports with a publish-ready verdict.
    pub fn pass_rate(&self) -> Option<f64> {
        (self.total_reports > 0).then(|| self.pass_count as f64 / self.total_reports as f64)
    }
}

/// Reports that loaded, and the files that did not.
pub struct LoadedReports {
    pub reports: Vec<EvaluationReport>,
    pub failures: Vec<(PathBuf, ReportError)>,
}

/// Load every `*_report.json` directly inside `dir`, sorted by file name.
///
/// Unreadable reports are collected in `failures`; only a failure to list
/// the directory is an error.
pub fn load_reports(dir: &Path) -> ReportResult<LoadedReports> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with("_report.json"))
        })
        .collect();
    paths.sort();

    let mut loaded = LoadedReports {
        reports: Vec::new(),
        failures: Vec::new(),
    };
    for path in paths {
        match EvaluationReport::read_from(&path) {
            Ok(report) => loaded.reports.push(report),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable report");
                loaded.failures.push((path, e));
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::aggregate::{Aggregator, GateThresholds};
    use crate::judge::{JudgeResult, PanelResults, Score};
    use crate::registry::JudgeRegistry;
    use crate::rules::RuleEngine;

    fn report(id: &str, text: &str, score: u8, failing: &[&str]) -> EvaluationReport {
        let registry = Arc::new(JudgeRegistry::standard().unwrap());
        let mut panel: PanelResults = registry
            .model_judges()
            .map(|j| (j.id.clone(), JudgeResult::scored(Score::new(score).unwrap(), "")))
            .collect();
        for judge in failing {
            panel.insert(judge.to_string(), JudgeResult::failed("boom"));
        }
        let thresholds = GateThresholds {
            quality_floor: Some(3.2),
            tone_floor: Some(2.5),
        };
        let card = Aggregator::new(registry, thresholds).aggregate(&RuleEngine::new().check(text), &panel);
        EvaluationReport::build(id, "m", &card)
    }

    #[test]
    fn averages_ignore_nulls() {
        let tone = ["1A_Positive", "1B_Direct", "1C_Trustworthy", "1D_Sharp_Wit"];
        let reports = vec![
            report("a", "clean", 4, &[]),
            report("b", "clean", 2, &tone),
        ];
        let summary = CalibrationSummary::from_reports(&reports);

        assert_eq!(summary.total_reports, 2);
        assert_eq!(summary.category_averages["P1_Challenger_Tone"], Some(4.0));
        assert_eq!(summary.judge_averages["1A_Positive"], Some(4.0));
        assert_eq!(summary.judge_averages["5C_Shareability"], Some(3.0));
    }

    #[test]
    fn counts_gates_passes_and_buckets() {
        let reports = vec![
            report("golden", "clean", 4, &[]),
            report("poison", "We use Monday.com and sub-tasks daily.", 2, &[]),
            report("meh", "clean", 3, &[]),
        ];
        let summary = CalibrationSummary::from_reports(&reports);

        assert_eq!(summary.pass_count, 1);
        assert_eq!(summary.gate_failures.brand, 1);
        assert_eq!(summary.gate_failures.tone, 1);
        assert_eq!(summary.gate_failures.quality, 2);
        assert_eq!(summary.total_critical_violations, 2);
        assert_eq!(summary.violation_details, vec![("poison".to_string(), 2)]);
        assert_eq!(
            summary.overall_distribution,
            Distribution { low: 1, mid: 0, high: 2 }
        );
        assert_eq!(summary.pass_rate(), Some(1.0 / 3.0));
    }

    #[test]
    fn empty_set_has_no_averages() {
        let summary = CalibrationSummary::from_reports(&[]);
        assert_eq!(summary.average_overall, None);
        assert_eq!(summary.pass_rate(), None);
    }

    #[test]
    fn loads_only_report_files_and_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        report("a", "clean", 4, &[]).save_in(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken_report.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let loaded = load_reports(dir.path()).unwrap();
        assert_eq!(loaded.reports.len(), 1);
        assert_eq!(loaded.failures.len(), 1);
    }
}
