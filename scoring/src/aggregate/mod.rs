//! Two-level weighted aggregation.
//!
//! Judge scores fold into category scores, category scores into the overall
//! score. Failed judges and null categories drop out of both numerator and
//! denominator. Nothing is rounded here.

pub mod gates;

use std::sync::Arc;

use tracing::debug;

use crate::judge::{Flag, JudgeResult, PanelResults, Score};
use crate::registry::{CategoryDefinition, JudgeRegistry, CONTEXTUAL_JUDGE, MECHANICAL_JUDGE, TONE_CATEGORY};
use crate::rules::RuleViolation;

pub use gates::{evaluate_gates, GateOutcome, GateStatus, GateThresholds, RejectReason, Verdict};

/// Error recorded for a registered judge with no entry in the results.
pub const MISSING_RESULT: &str = "No result found for this judge";

/// The synthetic result of the rule-derived mechanical judge.
pub fn mechanical_result(violations: &[RuleViolation]) -> JudgeResult {
    if violations.is_empty() {
        JudgeResult::scored(Score::MAX, "No mechanical violations found.")
    } else {
        JudgeResult::scored(
            Score::MIN,
            format!("Found {} mechanical violation(s).", violations.len()),
        )
        .with_flags(violations.iter().map(Flag::from).collect())
    }
}

/// One judge's line in a category breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeLine {
    pub id: String,
    pub name: String,
    pub weight: f64,
    pub result: JudgeResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScore {
    pub id: String,
    pub name: String,
    pub weight: f64,
    /// Weighted mean over successful members; `None` if all failed.
    pub score: Option<f64>,
    pub has_failures: bool,
    pub judges: Vec<JudgeLine>,
}

impl CategoryScore {
    /// `score × weight`, or `None` for a null category.
    pub fn contribution(&self) -> Option<f64> {
        self.score.map(|s| s * self.weight)
    }
}

/// Weighted mean of `(value, weight)` pairs; `None` when nothing contributes.
fn weighted_mean(pairs: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (sum, total_weight) = pairs.fold((0.0, 0.0), |(s, w), (value, weight)| {
        (s + value * weight, w + weight)
    });
    (total_weight > 0.0).then(|| sum / total_weight)
}

pub fn score_category(
    registry: &JudgeRegistry,
    category: &CategoryDefinition,
    results: &PanelResults,
) -> CategoryScore {
    let judges: Vec<JudgeLine> = registry
        .judges_in(&category.id)
        .map(|judge| JudgeLine {
            id: judge.id.clone(),
            name: judge.name.clone(),
            weight: judge.weight,
            result: results
                .get(&judge.id)
                .cloned()
                .unwrap_or_else(|| JudgeResult::failed(MISSING_RESULT)),
        })
        .collect();

    let score = weighted_mean(
        judges
            .iter()
            .filter_map(|line| line.result.score().map(|s| (s.as_f64(), line.weight))),
    );
    let has_failures = judges.iter().any(|line| line.result.is_failed());

    CategoryScore {
        id: category.id.clone(),
        name: category.name.clone(),
        weight: category.weight,
        score,
        has_failures,
        judges,
    }
}

pub fn overall_score(categories: &[CategoryScore]) -> Option<f64> {
    weighted_mean(
        categories
            .iter()
            .filter_map(|c| c.score.map(|s| (s, c.weight))),
    )
}

/// Everything the report needs from one aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub categories: Vec<CategoryScore>,
    pub overall: Option<f64>,
    pub gates: GateOutcome,
    pub thresholds: GateThresholds,
    pub violations: Vec<RuleViolation>,
}

impl Scorecard {
    pub fn category(&self, id: &str) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn judge(&self, id: &str) -> Option<&JudgeLine> {
        self.categories
            .iter()
            .flat_map(|c| c.judges.iter())
            .find(|line| line.id == id)
    }

    /// Ids of judges that ended without a score.
    pub fn failed_judges(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|c| c.judges.iter())
            .filter(|line| line.result.is_failed())
            .map(|line| line.id.clone())
            .collect()
    }
}

/// Combines rule violations and panel results under fixed thresholds.
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Arc<JudgeRegistry>,
    thresholds: GateThresholds,
}

impl Aggregator {
    pub fn new(registry: Arc<JudgeRegistry>, thresholds: GateThresholds) -> Self {
        Self {
            registry,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &GateThresholds {
        &self.thresholds
    }

    /// Aggregate. The mechanical judge's entry is always derived from
    /// `violations`, replacing anything in `panel` under that id.
    pub fn aggregate(&self, violations: &[RuleViolation], panel: &PanelResults) -> Scorecard {
        let mut results = panel.clone();
        results.insert(MECHANICAL_JUDGE.to_string(), mechanical_result(violations));

        let categories: Vec<CategoryScore> = self
            .registry
            .categories()
            .iter()
            .map(|c| score_category(&self.registry, c, &results))
            .collect();
        let overall = overall_score(&categories);

        let tone = categories
            .iter()
            .find(|c| c.id == TONE_CATEGORY)
            .and_then(|c| c.score);
        let contextual_flags = results
            .get(CONTEXTUAL_JUDGE)
            .map(JudgeResult::flags)
            .unwrap_or_default();
        let gates = evaluate_gates(&self.thresholds, overall, tone, violations, contextual_flags);

        debug!(
            overall = ?overall,
            status = gates.verdict.status(),
            critical = gates.critical_violations,
            "Aggregation complete"
        );

        Scorecard {
            categories,
            overall,
            gates,
            thresholds: self.thresholds,
            violations: violations.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JudgeDefinition;

    fn score(v: u8) -> Score {
        Score::new(v).unwrap()
    }

    fn small_registry() -> JudgeRegistry {
        JudgeRegistry::new(
            vec![
                CategoryDefinition::new("A", "Alpha", 0.6),
                CategoryDefinition::new("B", "Beta", 0.4),
            ],
            vec![
                JudgeDefinition::model("a1", "a1", "A", 0.3, "a1.txt"),
                JudgeDefinition::model("a2", "a2", "A", 0.2, "a2.txt"),
                JudgeDefinition::model("a3", "a3", "A", 0.1, "a3.txt"),
                JudgeDefinition::model("b1", "b1", "B", 0.4, "b1.txt"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn mechanical_judge_is_binary() {
        assert_eq!(mechanical_result(&[]).score(), Some(Score::MAX));
        assert!(mechanical_result(&[]).flags().is_empty());

        let v = RuleViolation {
            rule_id: "SYNC_SPELLING".into(),
            severity: crate::rules::Severity::Medium,
            message: "m".into(),
            violation: "synch".into(),
            context: "c".into(),
        };
        let result = mechanical_result(&[v.clone(), v]);
        assert_eq!(result.score(), Some(Score::MIN));
        assert_eq!(result.flags().len(), 2);
        assert_eq!(
            result.display_feedback(),
            "Found 2 mechanical violation(s)."
        );
    }

    #[test]
    fn failed_judge_excluded_from_both_sides() {
        let registry = small_registry();
        let mut results = PanelResults::new();
        results.insert("a1".into(), JudgeResult::scored(score(4), ""));
        results.insert("a2".into(), JudgeResult::failed("boom"));
        results.insert("a3".into(), JudgeResult::scored(score(1), ""));

        let category = score_category(&registry, &registry.categories()[0], &results);
        let expected = (4.0 * 0.3 + 1.0 * 0.1) / (0.3 + 0.1);
        assert!((category.score.unwrap() - expected).abs() < 1e-12);
        assert!(category.has_failures);
    }

    #[test]
    fn missing_judge_is_treated_as_failed() {
        let registry = small_registry();
        let category = score_category(&registry, &registry.categories()[1], &PanelResults::new());
        assert_eq!(category.score, None);
        assert_eq!(category.judges[0].result.error(), Some(MISSING_RESULT));
        assert_eq!(category.contribution(), None);
    }

    #[test]
    fn null_category_drops_out_of_overall() {
        let registry = small_registry();
        let mut results = PanelResults::new();
        results.insert("a1".into(), JudgeResult::scored(score(3), ""));
        results.insert("b1".into(), JudgeResult::failed("boom"));

        let categories: Vec<CategoryScore> = registry
            .categories()
            .iter()
            .map(|c| score_category(&registry, c, &results))
            .collect();
        assert_eq!(categories[1].score, None);
        assert!((overall_score(&categories).unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn all_null_overall_is_null() {
        assert_eq!(overall_score(&[]), None);
    }

    #[test]
    fn mechanical_entry_overrides_panel() {
        let registry = Arc::new(JudgeRegistry::standard().unwrap());
        let aggregator = Aggregator::new(registry, GateThresholds::default());
        let mut panel = PanelResults::new();
        panel.insert(MECHANICAL_JUDGE.into(), JudgeResult::failed("stale"));

        let card = aggregator.aggregate(&[], &panel);
        assert_eq!(card.judge(MECHANICAL_JUDGE).unwrap().result.score(), Some(Score::MAX));
    }
}
