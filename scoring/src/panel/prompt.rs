//! Request construction for a single judge call.

use crate::registry::JudgeDefinition;

/// Assistant prefill that forces the reply to start a JSON object.
pub const PREFILL: &str = "{";

/// Everything an endpoint needs to place one judge call.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeRequest {
    pub judge_id: String,
    pub system: String,
    pub user: String,
    pub prefill: String,
}

impl JudgeRequest {
    pub fn new(judge: &JudgeDefinition, criteria: &str, content: &str) -> Self {
        Self {
            judge_id: judge.id.clone(),
            system: system_prompt(judge, criteria),
            user: user_message(content),
            prefill: PREFILL.to_string(),
        }
    }
}

pub fn system_prompt(judge: &JudgeDefinition, criteria: &str) -> String {
    format!(
        r#"You are a specialized content evaluation agent for monday.com's challenger brand voice.

Your sole responsibility is to evaluate the following aspect:
**{name}** (Part of {category})

{criteria}

CRITICAL: You must return ONLY a valid JSON object with this exact structure:
{{
    "score": <integer 1-4>,
    "feedback": "<detailed explanation of your evaluation>",
    "flags": [<list of specific issues found, can be empty>],
    "thinking": "<optional: your reasoning before scoring>"
}}

Scoring Scale (1-4 Forced Choice):
- 1: Critical Fail (active brand violation, toxic tone, or factually incorrect)
- 2: Generic/Mediocre (boring, lacks challenger voice)
- 3: Publishable Standard (clear, helpful, professional)
- 4: Challenger Status (exceptional, unique insight, witty, zero fluff)

DO NOT include any text before or after the JSON object.
Start your response with {{ and end with }}.
"#,
        name = judge.name,
        category = judge.category,
    )
}

pub fn user_message(content: &str) -> String {
    format!(
        "Please evaluate the following content draft:\n\n\
         ---BEGIN CONTENT---\n{content}\n---END CONTENT---\n\n\
         Provide your evaluation as a JSON object following the exact format specified in the system prompt.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_embeds_criteria_and_content() {
        let judge = JudgeDefinition::model("3A_BLUF", "Bottom Line Up Front", "P3_Structural_Clarity", 0.1, "3A_BLUF.txt");
        let req = JudgeRequest::new(&judge, "Lead with the answer.", "Draft body");

        assert!(req.system.contains("**Bottom Line Up Front** (Part of P3_Structural_Clarity)"));
        assert!(req.system.contains("Lead with the answer."));
        assert!(req.system.contains("\"score\": <integer 1-4>"));
        assert!(req.user.contains("---BEGIN CONTENT---\nDraft body\n---END CONTENT---"));
        assert_eq!(req.prefill, "{");
    }
}
