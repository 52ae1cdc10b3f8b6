//! Strict parsing of judge replies.
//!
//! Contract violations are never retried: the judge fails with a
//! descriptive error and the reconstructed raw text.

use serde_json::Value;

use crate::judge::{Flag, JudgeResult, Score};

const REQUIRED_KEYS: [&str; 3] = ["score", "feedback", "flags"];

/// Parse `prefill + text` into a judge result.
pub fn parse_judge_reply(prefill: &str, text: &str) -> JudgeResult {
    let raw = format!("{prefill}{text}");

    let parsed: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => return JudgeResult::failed_with_raw(format!("JSON parsing error: {e}"), raw),
    };
    let Value::Object(mut obj) = parsed else {
        return JudgeResult::failed_with_raw("Reply is not a JSON object", raw);
    };

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|k| !obj.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return JudgeResult::failed_with_raw(
            format!("Missing required keys: {}", missing.join(", ")),
            raw,
        );
    }

    let score = match obj.get("score").and_then(Value::as_i64).map(Score::try_from) {
        Some(Ok(score)) => score,
        _ => {
            return JudgeResult::failed_with_raw(
                format!("Invalid score: {}. Must be integer 1-4.", obj["score"]),
                raw,
            )
        }
    };

    let feedback = match obj.remove("feedback") {
        Some(Value::String(s)) => s,
        _ => return JudgeResult::failed_with_raw("Invalid feedback: must be a string", raw),
    };

    let flags = match obj.remove("flags") {
        Some(Value::Array(items)) => items.into_iter().map(Flag::from_value).collect(),
        _ => return JudgeResult::failed_with_raw("Invalid flags: must be an array", raw),
    };

    let thinking = match obj.remove("thinking") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    };

    JudgeResult::Scored {
        score,
        feedback,
        flags,
        thinking,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_of(result: &JudgeResult) -> &str {
        result.error().expect("expected failure")
    }

    #[test]
    fn well_formed_reply_is_scored() {
        let result = parse_judge_reply(
            "{",
            r#""score": 3, "feedback": "Solid.", "flags": ["a", {"message": "b", "severity": "Critical"}]}"#,
        );
        assert_eq!(result.score().map(Score::value), Some(3));
        assert_eq!(result.flags().len(), 2);
        assert!(result.flags()[1].is_critical());
        assert_eq!(result.thinking(), None);
    }

    #[test]
    fn thinking_is_captured() {
        let result = parse_judge_reply(
            "{",
            r#""thinking": "weighing tone", "score": 4, "feedback": "x", "flags": []}"#,
        );
        assert_eq!(result.thinking(), Some("weighing tone"));
    }

    #[test]
    fn malformed_json_keeps_raw_text() {
        let result = parse_judge_reply("{", "not json");
        assert!(error_of(&result).starts_with("JSON parsing error"));
        let JudgeResult::Failed { raw_response, .. } = &result else {
            unreachable!()
        };
        assert_eq!(raw_response.as_deref(), Some("{not json"));
    }

    #[test]
    fn missing_keys_are_named() {
        let result = parse_judge_reply("{", r#""score": 3}"#);
        assert_eq!(error_of(&result), "Missing required keys: feedback, flags");
    }

    #[test]
    fn out_of_range_and_fractional_scores_fail() {
        for score in ["5", "0", "3.5", "\"3\""] {
            let reply = format!(r#""score": {score}, "feedback": "x", "flags": []}}"#);
            let result = parse_judge_reply("{", &reply);
            assert!(error_of(&result).starts_with("Invalid score"), "{score}");
        }
    }

    #[test]
    fn wrong_field_types_fail() {
        let result = parse_judge_reply("{", r#""score": 2, "feedback": 7, "flags": []}"#);
        assert!(error_of(&result).starts_with("Invalid feedback"));

        let result = parse_judge_reply("{", r#""score": 2, "feedback": "x", "flags": "none"}"#);
        assert!(error_of(&result).starts_with("Invalid flags"));
    }
}
