//! Judge outcome types: scores, flags and per-judge results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules::{RuleViolation, Severity};

/// A score on the closed ordinal scale 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Score(u8);

impl Score {
    pub const MIN: Score = Score(1);
    pub const MAX: Score = Score(4);

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0)
            .contains(&value)
            .then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    /// Human label of this point on the scale.
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Critical Fail",
            2 => "Generic (Mediocre)",
            3 => "Publishable Standard",
            _ => "Challenger Status",
        }
    }
}

impl TryFrom<i64> for Score {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Score::new)
            .ok_or_else(|| format!("Score {value} out of range (must be 1-4)"))
    }
}

impl From<Score> for i64 {
    fn from(score: Score) -> Self {
        i64::from(score.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured issue attached to a judge result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredFlag {
    #[serde(default, alias = "issue", alias = "description")]
    pub message: String,
    #[serde(default, alias = "quote", skip_serializing_if = "Option::is_none")]
    pub violation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

/// A flag is either free text or a structured issue.
///
/// Only structured flags carry a severity, so plain strings can never
/// trigger the brand veto. Deserialization goes through
/// [`Flag::from_value`], so stored reports accept the same loose shapes as
/// model replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "Value")]
pub enum Flag {
    Text(String),
    Structured(StructuredFlag),
}

impl Flag {
    /// Normalize one element of a model's `flags` array.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Object(map) => {
                let field = |keys: &[&str]| -> Option<String> {
                    keys.iter().find_map(|k| match map.get(*k) {
                        Some(Value::String(s)) => Some(s.clone()),
                        Some(Value::Null) | None => None,
                        Some(other) => Some(other.to_string()),
                    })
                };

                let message = field(&["message", "issue", "description"])
                    .unwrap_or_else(|| Value::Object(map.clone()).to_string());
                let severity = map
                    .get("severity")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<Severity>().ok());

                Self::Structured(StructuredFlag {
                    message,
                    violation: field(&["violation", "quote"]),
                    context: field(&["context"]),
                    severity,
                    rule_id: field(&["rule_id"]),
                })
            }
            other => Self::Text(other.to_string()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Structured(f) => &f.message,
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::Text(_) => None,
            Self::Structured(f) => f.severity,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity() == Some(Severity::Critical)
    }
}

impl From<Value> for Flag {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Structured(flag) => {
                if let Some(severity) = flag.severity {
                    write!(f, "[{severity}] ")?;
                }
                f.write_str(&flag.message)?;
                if let Some(violation) = &flag.violation {
                    write!(f, " (\"{violation}\")")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&RuleViolation> for Flag {
    fn from(v: &RuleViolation) -> Self {
        Self::Structured(StructuredFlag {
            message: v.message.clone(),
            violation: Some(v.violation.clone()),
            context: Some(v.context.clone()),
            severity: Some(v.severity),
            rule_id: Some(v.rule_id.clone()),
        })
    }
}

impl TryFrom<&Flag> for RuleViolation {
    type Error = String;

    /// Only structured flags carrying both a rule id and a severity map back.
    fn try_from(flag: &Flag) -> Result<Self, Self::Error> {
        let Flag::Structured(f) = flag else {
            return Err(format!("mechanical flag is not structured: {flag}"));
        };
        let rule_id = f
            .rule_id
            .clone()
            .ok_or_else(|| format!("mechanical flag has no rule_id: {}", f.message))?;
        let severity = f
            .severity
            .ok_or_else(|| format!("mechanical flag {rule_id} has no severity"))?;

        Ok(RuleViolation {
            rule_id,
            severity,
            message: f.message.clone(),
            violation: f.violation.clone().unwrap_or_default(),
            context: f.context.clone().unwrap_or_default(),
        })
    }
}

/// Terminal outcome of one judge for one run.
#[derive(Debug, Clone, PartialEq)]
pub enum JudgeResult {
    Scored {
        score: Score,
        feedback: String,
        flags: Vec<Flag>,
        thinking: Option<String>,
    },
    Failed {
        error: String,
        raw_response: Option<String>,
    },
}

impl JudgeResult {
    pub fn scored(score: Score, feedback: impl Into<String>) -> Self {
        Self::Scored {
            score,
            feedback: feedback.into(),
            flags: Vec::new(),
            thinking: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            raw_response: None,
        }
    }

    pub fn failed_with_raw(error: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            raw_response: Some(raw.into()),
        }
    }

    pub fn with_flags(mut self, new_flags: Vec<Flag>) -> Self {
        if let Self::Scored { flags, .. } = &mut self {
            *flags = new_flags;
        }
        self
    }

    pub fn score(&self) -> Option<Score> {
        match self {
            Self::Scored { score, .. } => Some(*score),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Scored { .. } => None,
        }
    }

    pub fn flags(&self) -> &[Flag] {
        match self {
            Self::Scored { flags, .. } => flags,
            Self::Failed { .. } => &[],
        }
    }

    pub fn thinking(&self) -> Option<&str> {
        match self {
            Self::Scored { thinking, .. } => thinking.as_deref(),
            Self::Failed { .. } => None,
        }
    }

    /// Feedback as shown to readers. Failures render as `ERROR: <message>`.
    pub fn display_feedback(&self) -> String {
        match self {
            Self::Scored { feedback, .. } => feedback.clone(),
            Self::Failed { error, .. } => format!("ERROR: {error}"),
        }
    }
}

/// Judge id to result, one entry per judge that was asked.
pub type PanelResults = BTreeMap<String, JudgeResult>;

/// Ids of failed judges, in id order.
pub fn failed_judges(results: &PanelResults) -> Vec<String> {
    results
        .iter()
        .filter(|(_, r)| r.is_failed())
        .map(|(id, _)| id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn score_rejects_out_of_range() {
        assert!(Score::try_from(0_i64).is_err());
        assert!(Score::try_from(5_i64).is_err());
        assert!(Score::try_from(-1_i64).is_err());
        assert_eq!(Score::try_from(3_i64).unwrap().value(), 3);
    }

    #[test]
    fn score_labels() {
        assert_eq!(Score::MIN.label(), "Critical Fail");
        assert_eq!(Score::MAX.label(), "Challenger Status");
    }

    #[test]
    fn score_deserialization_validates() {
        assert!(serde_json::from_value::<Score>(json!(7)).is_err());
        assert_eq!(serde_json::from_value::<Score>(json!(2)).unwrap(), Score::new(2).unwrap());
    }

    #[test]
    fn string_flag_stays_text() {
        let flag = Flag::from_value(json!("too generic"));
        assert_eq!(flag, Flag::Text("too generic".into()));
        assert!(!flag.is_critical());
    }

    #[test]
    fn object_flag_normalizes_aliases_and_severity() {
        let flag = Flag::from_value(json!({
            "issue": "Uses sub-tasks",
            "quote": "sub-tasks",
            "severity": "critical"
        }));
        let Flag::Structured(f) = &flag else {
            panic!("expected structured flag");
        };
        assert_eq!(f.message, "Uses sub-tasks");
        assert_eq!(f.violation.as_deref(), Some("sub-tasks"));
        assert!(flag.is_critical());
    }

    #[test]
    fn unknown_severity_is_dropped() {
        let flag = Flag::from_value(json!({"message": "x", "severity": "blocker"}));
        assert_eq!(flag.severity(), None);
    }

    #[test]
    fn non_string_non_object_becomes_text() {
        assert_eq!(Flag::from_value(json!(42)), Flag::Text("42".into()));
    }

    #[test]
    fn rule_violation_converts_both_ways() {
        let v = RuleViolation {
            rule_id: "SUB_ITEMS_USAGE".into(),
            severity: Severity::Critical,
            message: "Use 'Sub-items'".into(),
            violation: "sub-tasks".into(),
            context: "...and sub-tasks daily.".into(),
        };
        let flag = Flag::from(&v);
        assert!(flag.is_critical());
        assert_eq!(RuleViolation::try_from(&flag).unwrap(), v);
        assert!(RuleViolation::try_from(&Flag::Text("x".into())).is_err());
    }

    #[test]
    fn structured_flag_json_reloads_as_structured() {
        let flag = Flag::Structured(StructuredFlag {
            message: "m".into(),
            violation: None,
            context: None,
            severity: Some(Severity::High),
            rule_id: None,
        });
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json, json!({"message": "m", "severity": "High"}));
        assert_eq!(serde_json::from_value::<Flag>(json).unwrap(), flag);
    }

    #[test]
    fn failed_feedback_renders_error_prefix() {
        let r = JudgeResult::failed("timeout");
        assert_eq!(r.display_feedback(), "ERROR: timeout");
        assert_eq!(r.score(), None);
    }

    #[test]
    fn failed_judges_lists_ids() {
        let mut results = PanelResults::new();
        results.insert("1A".into(), JudgeResult::scored(Score::MAX, "ok"));
        results.insert("1B".into(), JudgeResult::failed("boom"));
        assert_eq!(failed_judges(&results), vec!["1B".to_string()]);
    }
}
