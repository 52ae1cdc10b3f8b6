//! The three publish gates and the verdict derived from them.
//!
//! | Gate | Checks | Indeterminate when |
//! |------|--------|--------------------|
//! | 1 quality floor | overall score ≥ threshold | score null or threshold unset |
//! | 2 tone floor    | tone category ≥ minimum   | score null or minimum unset |
//! | 3 brand veto    | zero critical rule violations and zero critical contextual flags | never |

use serde::{Deserialize, Serialize};

use crate::judge::Flag;
use crate::rules::RuleViolation;

/// Calibrated thresholds. `None` means not yet calibrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    pub quality_floor: Option<f64>,
    pub tone_floor: Option<f64>,
}

/// Tri-state gate outcome. Serialized as `true`, `false` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum GateStatus {
    Passed,
    Failed,
    Indeterminate,
}

impl GateStatus {
    fn floor(score: Option<f64>, threshold: Option<f64>) -> Self {
        match (score, threshold) {
            (Some(score), Some(threshold)) if score >= threshold => Self::Passed,
            (Some(_), Some(_)) => Self::Failed,
            _ => Self::Indeterminate,
        }
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            Self::Passed => Some(true),
            Self::Failed => Some(false),
            Self::Indeterminate => None,
        }
    }
}

impl From<Option<bool>> for GateStatus {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Passed,
            Some(false) => Self::Failed,
            None => Self::Indeterminate,
        }
    }
}

impl From<GateStatus> for Option<bool> {
    fn from(status: GateStatus) -> Self {
        status.as_option()
    }
}

/// Why content was rejected, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BrandVeto,
    ToneVeto,
    QualityFloor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    PublishReady,
    Rejected(RejectReason),
    Undetermined,
}

pub const STATUS_PUBLISH_READY: &str = "Publish-Ready";
pub const STATUS_BRAND_VETO: &str = "Critical Violations (Brand Veto)";
pub const STATUS_TONE_VETO: &str = "Tone Too Generic (Boredom Veto)";
pub const STATUS_QUALITY_FLOOR: &str = "Below Quality Threshold";
pub const STATUS_UNDETERMINED: &str = "Cannot Determine (Thresholds Not Yet Calibrated)";

impl Verdict {
    pub fn publish_ready(self) -> Option<bool> {
        match self {
            Self::PublishReady => Some(true),
            Self::Rejected(_) => Some(false),
            Self::Undetermined => None,
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            Self::PublishReady => STATUS_PUBLISH_READY,
            Self::Rejected(RejectReason::BrandVeto) => STATUS_BRAND_VETO,
            Self::Rejected(RejectReason::ToneVeto) => STATUS_TONE_VETO,
            Self::Rejected(RejectReason::QualityFloor) => STATUS_QUALITY_FLOOR,
            Self::Undetermined => STATUS_UNDETERMINED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    pub quality: GateStatus,
    pub tone: GateStatus,
    pub brand: GateStatus,
    /// Critical rule violations plus critical contextual-judge flags.
    pub critical_violations: usize,
    pub verdict: Verdict,
}

/// Evaluate all three gates.
///
/// Only `contextual_flags` (the contextual-terminology judge's flags) are
/// inspected for critical severity; other judges' flags never veto.
pub fn evaluate_gates(
    thresholds: &GateThresholds,
    overall: Option<f64>,
    tone: Option<f64>,
    violations: &[RuleViolation],
    contextual_flags: &[Flag],
) -> GateOutcome {
    let quality = GateStatus::floor(overall, thresholds.quality_floor);
    let tone = GateStatus::floor(tone, thresholds.tone_floor);

    let rule_criticals = violations.iter().filter(|v| v.is_critical()).count();
    let flag_criticals = contextual_flags.iter().filter(|f| f.is_critical()).count();
    let critical_violations = rule_criticals + flag_criticals;
    let brand = if critical_violations == 0 {
        GateStatus::Passed
    } else {
        GateStatus::Failed
    };

    let verdict = if brand == GateStatus::Failed {
        Verdict::Rejected(RejectReason::BrandVeto)
    } else if tone == GateStatus::Failed {
        Verdict::Rejected(RejectReason::ToneVeto)
    } else if quality == GateStatus::Failed {
        Verdict::Rejected(RejectReason::QualityFloor)
    } else if quality == GateStatus::Passed && tone == GateStatus::Passed {
        Verdict::PublishReady
    } else {
        Verdict::Undetermined
    };

    GateOutcome {
        quality,
        tone,
        brand,
        critical_violations,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::StructuredFlag;
    use crate::rules::Severity;

    const CALIBRATED: GateThresholds = GateThresholds {
        quality_floor: Some(3.2),
        tone_floor: Some(3.0),
    };

    fn critical_violation() -> RuleViolation {
        RuleViolation {
            rule_id: "MONDAY_COM_CASE".into(),
            severity: Severity::Critical,
            message: String::new(),
            violation: "Monday.com".into(),
            context: String::new(),
        }
    }

    fn flag(severity: Severity) -> Flag {
        Flag::Structured(StructuredFlag {
            message: "tool paradox".into(),
            violation: None,
            context: None,
            severity: Some(severity),
            rule_id: None,
        })
    }

    #[test]
    fn all_gates_pass() {
        let outcome = evaluate_gates(&CALIBRATED, Some(4.0), Some(4.0), &[], &[]);
        assert_eq!(outcome.verdict, Verdict::PublishReady);
        assert_eq!(outcome.verdict.status(), "Publish-Ready");
        assert_eq!(outcome.critical_violations, 0);
    }

    #[test]
    fn brand_veto_wins_over_high_score() {
        let outcome = evaluate_gates(&CALIBRATED, Some(3.9), Some(3.9), &[critical_violation()], &[]);
        assert_eq!(outcome.brand, GateStatus::Failed);
        assert_eq!(outcome.verdict.publish_ready(), Some(false));
        assert_eq!(outcome.verdict.status(), STATUS_BRAND_VETO);
    }

    #[test]
    fn brand_veto_fails_even_without_thresholds() {
        let outcome = evaluate_gates(&GateThresholds::default(), Some(3.9), None, &[critical_violation()], &[]);
        assert_eq!(outcome.verdict, Verdict::Rejected(RejectReason::BrandVeto));
    }

    #[test]
    fn contextual_critical_flag_counts_but_text_does_not() {
        let flags = vec![flag(Severity::Critical), flag(Severity::High), Flag::Text("Critical".into())];
        let outcome = evaluate_gates(&CALIBRATED, Some(4.0), Some(4.0), &[], &flags);
        assert_eq!(outcome.critical_violations, 1);
        assert_eq!(outcome.brand, GateStatus::Failed);
    }

    #[test]
    fn tone_veto_precedes_quality_floor() {
        let outcome = evaluate_gates(&CALIBRATED, Some(2.0), Some(2.0), &[], &[]);
        assert_eq!(outcome.verdict.status(), STATUS_TONE_VETO);

        let outcome = evaluate_gates(&CALIBRATED, Some(3.0), Some(3.5), &[], &[]);
        assert_eq!(outcome.verdict.status(), STATUS_QUALITY_FLOOR);
    }

    #[test]
    fn unset_thresholds_are_indeterminate_not_coerced() {
        let outcome = evaluate_gates(&GateThresholds::default(), Some(4.0), Some(4.0), &[], &[]);
        assert_eq!(outcome.quality, GateStatus::Indeterminate);
        assert_eq!(outcome.tone, GateStatus::Indeterminate);
        assert_eq!(outcome.brand, GateStatus::Passed);
        assert_eq!(outcome.verdict.publish_ready(), None);
        assert_eq!(outcome.verdict.status(), STATUS_UNDETERMINED);
    }

    #[test]
    fn explicit_fail_beats_indeterminate() {
        let thresholds = GateThresholds {
            quality_floor: Some(3.2),
            tone_floor: None,
        };
        let outcome = evaluate_gates(&thresholds, Some(2.5), Some(4.0), &[], &[]);
        assert_eq!(outcome.verdict, Verdict::Rejected(RejectReason::QualityFloor));
    }

    #[test]
    fn null_score_is_indeterminate() {
        let outcome = evaluate_gates(&CALIBRATED, None, None, &[], &[]);
        assert_eq!(outcome.quality, GateStatus::Indeterminate);
        assert_eq!(outcome.verdict, Verdict::Undetermined);
    }

    #[test]
    fn gate_status_serializes_as_nullable_bool() {
        assert_eq!(serde_json::to_string(&GateStatus::Indeterminate).unwrap(), "null");
        assert_eq!(serde_json::from_str::<GateStatus>("false").unwrap(), GateStatus::Failed);
    }
}
