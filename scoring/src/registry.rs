//! Judge registry: the category / judge taxonomy and its weights.
//!
//! The registry is built and validated once, then shared read-only. A
//! registry whose weights do not add up cannot be constructed.

use std::collections::{BTreeMap, HashSet};

use crate::error::ConfigError;

/// Allowed absolute error when comparing weight sums.
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// The category whose score feeds the tone gate.
pub const TONE_CATEGORY: &str = "P1_Challenger_Tone";
/// The judge whose result is derived from rule violations.
pub const MECHANICAL_JUDGE: &str = "2A_Mechanical";
/// The judge whose critical flags feed the brand veto.
pub const CONTEXTUAL_JUDGE: &str = "2B_Contextual";

/// How a judge produces its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Scored by a language-model call.
    Model,
    /// Synthesized from the rule engine output.
    RuleDerived,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDefinition {
    pub id: String,
    pub name: String,
    pub weight: f64,
}

impl CategoryDefinition {
    pub fn new(id: &str, name: &str, weight: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    pub weight: f64,
    pub capability: Capability,
    /// Criteria document file name; `None` for rule-derived judges.
    pub criteria_file: Option<String>,
}

impl JudgeDefinition {
    /// A model-backed judge whose criteria live in `criteria_file`.
    pub fn model(id: &str, name: &str, category: &str, weight: f64, criteria_file: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            weight,
            capability: Capability::Model,
            criteria_file: Some(criteria_file.to_string()),
        }
    }

    pub fn rule_derived(id: &str, name: &str, category: &str, weight: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            weight,
            capability: Capability::RuleDerived,
            criteria_file: None,
        }
    }

    pub fn is_model_backed(&self) -> bool {
        self.capability == Capability::Model
    }
}

/// Immutable, validated taxonomy.
#[derive(Debug, Clone)]
pub struct JudgeRegistry {
    categories: Vec<CategoryDefinition>,
    judges: Vec<JudgeDefinition>,
    by_id: BTreeMap<String, usize>,
}

impl JudgeRegistry {
    /// Validate and build a registry. All problems are reported together.
    pub fn new(
        categories: Vec<CategoryDefinition>,
        judges: Vec<JudgeDefinition>,
    ) -> Result<Self, ConfigError> {
        let mut structural = Vec::new();

        let category_ids: HashSet<&str> = categories.iter().map(|c| c.id.as_str()).collect();
        if category_ids.len() != categories.len() {
            structural.push("duplicate category id".to_string());
        }

        let mut by_id = BTreeMap::new();
        for (idx, judge) in judges.iter().enumerate() {
            if by_id.insert(judge.id.clone(), idx).is_some() {
                structural.push(format!("duplicate judge id '{}'", judge.id));
            }
            if !category_ids.contains(judge.category.as_str()) {
                structural.push(format!(
                    "judge '{}' references unknown category '{}'",
                    judge.id, judge.category
                ));
            }
            match judge.capability {
                Capability::RuleDerived if judge.id != MECHANICAL_JUDGE => structural.push(format!(
                    "judge '{}' is rule-derived but only '{MECHANICAL_JUDGE}' may be",
                    judge.id
                )),
                Capability::Model if judge.id == MECHANICAL_JUDGE => structural.push(format!(
                    "'{MECHANICAL_JUDGE}' must be rule-derived"
                )),
                Capability::Model if judge.criteria_file.is_none() => structural.push(format!(
                    "model-backed judge '{}' has no criteria file",
                    judge.id
                )),
                _ => {}
            }
        }
        if !structural.is_empty() {
            return Err(ConfigError::Invalid(structural.join("; ")));
        }

        let mut weight_errors = Vec::new();
        for category in &categories {
            let total: f64 = judges
                .iter()
                .filter(|j| j.category == category.id)
                .map(|j| j.weight)
                .sum();
            if (total - category.weight).abs() > WEIGHT_TOLERANCE {
                weight_errors.push(format!(
                    "{}: Sub-parameters sum to {total}, expected {}",
                    category.id, category.weight
                ));
            }
        }
        let category_total: f64 = categories.iter().map(|c| c.weight).sum();
        if (category_total - 1.0).abs() > WEIGHT_TOLERANCE {
            weight_errors.push(format!(
                "Parameter weights sum to {category_total}, expected 1.0"
            ));
        }
        if !weight_errors.is_empty() {
            return Err(ConfigError::WeightValidation(weight_errors));
        }

        Ok(Self {
            categories,
            judges,
            by_id,
        })
    }

    /// The fixed five-category, nineteen-judge taxonomy.
    pub fn standard() -> Result<Self, ConfigError> {
        let categories = vec![
            CategoryDefinition::new(TONE_CATEGORY, "Challenger Tone & Voice", 0.30),
            CategoryDefinition::new("P2_Brand_Hygiene", "Brand Hygiene & Compliance", 0.20),
            CategoryDefinition::new("P3_Structural_Clarity", "Structural Integrity & Clarity", 0.25),
            CategoryDefinition::new("P4_Strategic_Value", "Strategic Value & Depth", 0.15),
            CategoryDefinition::new("P5_Engagement", "Engagement & Discoverability", 0.10),
        ];

        let p1 = TONE_CATEGORY;
        let p2 = "P2_Brand_Hygiene";
        let p3 = "P3_Structural_Clarity";
        let p4 = "P4_Strategic_Value";
        let p5 = "P5_Engagement";
        let judges = vec![
            JudgeDefinition::model("1A_Positive", "Positive & Solution-Focused", p1, 0.05, "1A_Positive.txt"),
            JudgeDefinition::model("1B_Direct", "Direct with Personality", p1, 0.10, "1B_Direct.txt"),
            JudgeDefinition::model("1C_Trustworthy", "Trustworthy & Authentic", p1, 0.05, "1C_Trustworthy.txt"),
            JudgeDefinition::model("1D_Sharp_Wit", "Sharp Wit & Confidence", p1, 0.10, "1D_Sharp_Wit.txt"),
            JudgeDefinition::rule_derived(MECHANICAL_JUDGE, "Mechanical Compliance", p2, 0.05),
            JudgeDefinition::model(CONTEXTUAL_JUDGE, "Contextual Terminology", p2, 0.10, "2B_Contextual_Terminology.txt"),
            JudgeDefinition::model("2C_Persona", "Persona & Lexicon", p2, 0.05, "2C_Persona_Lexicon.txt"),
            JudgeDefinition::model("3A_BLUF", "Bottom Line Up Front", p3, 0.10, "3A_BLUF.txt"),
            JudgeDefinition::model("3B_Scannability", "Scannability & Hierarchy", p3, 0.03, "3B_Scannability.txt"),
            JudgeDefinition::model("3C_Conciseness", "Conciseness", p3, 0.05, "3C_Conciseness.txt"),
            JudgeDefinition::model("3D_Specificity", "Specificity", p3, 0.02, "3D_Specificity.txt"),
            JudgeDefinition::model("3E_Human_Language", "Human Language/No Jargon", p3, 0.05, "3E_Human_Language.txt"),
            JudgeDefinition::model("4A_Audience", "Audience Alignment", p4, 0.03, "4A_Audience_Alignment.txt"),
            JudgeDefinition::model("4B_Actionability", "Actionability", p4, 0.05, "4B_Actionability.txt"),
            JudgeDefinition::model("4C_Evidence", "Evidence & Examples", p4, 0.02, "4C_Evidence.txt"),
            JudgeDefinition::model("4D_Originality", "Originality & AI Detection", p4, 0.05, "4D_Originality.txt"),
            JudgeDefinition::model("5A_Headline", "Headline & Hook", p5, 0.05, "5A_Headline_Hook.txt"),
            JudgeDefinition::model("5B_SEO", "SEO Alignment", p5, 0.03, "5B_SEO.txt"),
            JudgeDefinition::model("5C_Shareability", "Shareability", p5, 0.02, "5C_Shareability.txt"),
        ];

        Self::new(categories, judges)
    }

    pub fn get(&self, judge_id: &str) -> Option<&JudgeDefinition> {
        self.by_id.get(judge_id).map(|&idx| &self.judges[idx])
    }

    pub fn judges(&self) -> &[JudgeDefinition] {
        &self.judges
    }

    /// Every judge that needs a model call, in registration order.
    pub fn model_judges(&self) -> impl Iterator<Item = &JudgeDefinition> {
        self.judges.iter().filter(|j| j.is_model_backed())
    }

    pub fn model_judge_ids(&self) -> Vec<String> {
        self.model_judges().map(|j| j.id.clone()).collect()
    }

    pub fn judges_in<'a>(&'a self, category_id: &'a str) -> impl Iterator<Item = &'a JudgeDefinition> {
        self.judges.iter().filter(move |j| j.category == category_id)
    }

    pub fn category(&self, category_id: &str) -> Option<&CategoryDefinition> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    pub fn categories(&self) -> &[CategoryDefinition] {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_taxonomy_is_valid() {
        let registry = JudgeRegistry::standard().unwrap();
        assert_eq!(registry.categories().len(), 5);
        assert_eq!(registry.judges().len(), 19);
        assert_eq!(registry.model_judges().count(), 18);
        assert!(!registry.get(MECHANICAL_JUDGE).unwrap().is_model_backed());
        assert_eq!(registry.judges_in(TONE_CATEGORY).count(), 4);
        assert_eq!(
            registry.get("2C_Persona").unwrap().criteria_file.as_deref(),
            Some("2C_Persona_Lexicon.txt")
        );
    }

    #[test]
    fn mis_summed_category_is_rejected() {
        let categories = vec![
            CategoryDefinition::new("A", "A", 0.6),
            CategoryDefinition::new("B", "B", 0.4),
        ];
        let judges = vec![
            JudgeDefinition::model("a1", "a1", "A", 0.5, "a1.txt"),
            JudgeDefinition::model("b1", "b1", "B", 0.4, "b1.txt"),
        ];
        let err = JudgeRegistry::new(categories, judges).unwrap_err();
        let ConfigError::WeightValidation(problems) = err else {
            panic!("expected weight validation error");
        };
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("A:"));
    }

    #[test]
    fn mis_summed_total_is_rejected() {
        let categories = vec![CategoryDefinition::new("A", "A", 0.9)];
        let judges = vec![JudgeDefinition::model("a1", "a1", "A", 0.9, "a1.txt")];
        let err = JudgeRegistry::new(categories, judges).unwrap_err();
        assert!(err.to_string().contains("Parameter weights sum to 0.9"));
    }

    #[test]
    fn small_float_error_is_tolerated() {
        let categories = vec![CategoryDefinition::new("A", "A", 1.0)];
        let judges = vec![
            JudgeDefinition::model("a1", "a1", "A", 0.3, "a1.txt"),
            JudgeDefinition::model("a2", "a2", "A", 0.7005, "a2.txt"),
        ];
        assert!(JudgeRegistry::new(categories, judges).is_ok());
    }

    #[test]
    fn unknown_category_and_duplicate_ids_are_rejected() {
        let categories = vec![CategoryDefinition::new("A", "A", 1.0)];
        let judges = vec![
            JudgeDefinition::model("a1", "a1", "A", 0.5, "a1.txt"),
            JudgeDefinition::model("a1", "dup", "A", 0.5, "a1.txt"),
            JudgeDefinition::model("z1", "z1", "Z", 0.0, "z1.txt"),
        ];
        let msg = JudgeRegistry::new(categories, judges).unwrap_err().to_string();
        assert!(msg.contains("duplicate judge id 'a1'"));
        assert!(msg.contains("unknown category 'Z'"));
    }

    #[test]
    fn only_mechanical_judge_may_be_rule_derived() {
        let categories = vec![CategoryDefinition::new("A", "A", 1.0)];
        let judges = vec![JudgeDefinition::rule_derived("a1", "a1", "A", 1.0)];
        assert!(matches!(
            JudgeRegistry::new(categories, judges),
            Err(ConfigError::Invalid(_))
        ));
    }
}
