//! The brand style-guide rule catalog.
//!
//! Patterns are written to find the *violation*. Casing rules match the term
//! case-insensitively and carry an `exempt` pattern: it is anchored at the
//! start of the match and, when it matches there, the canonical spelling was
//! used and the hit is discarded.

use super::Severity;

/// Definition of a single rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    /// Stable identifier, e.g. `MONDAY_COM_CASE`.
    pub id: &'static str,
    /// Regex that finds candidate violations.
    pub pattern: &'static str,
    /// Regex anchored at the match start; a hit means the match is the
    /// correct form and is not reported.
    pub exempt: Option<&'static str>,
    pub message: &'static str,
    pub severity: Severity,
}

const fn rule(
    id: &'static str,
    pattern: &'static str,
    message: &'static str,
    severity: Severity,
) -> RuleSpec {
    RuleSpec {
        id,
        pattern,
        exempt: None,
        message,
        severity,
    }
}

const fn casing_rule(
    id: &'static str,
    pattern: &'static str,
    exempt: &'static str,
    message: &'static str,
    severity: Severity,
) -> RuleSpec {
    RuleSpec {
        id,
        pattern,
        exempt: Some(exempt),
        message,
        severity,
    }
}

/// All rules, in evaluation order.
pub const BRAND_RULES: &[RuleSpec] = &[
    // ── Brand name and terminology ───────────────────────────────────────
    casing_rule(
        "MONDAY_COM_CASE",
        r"(?i:\bmonday\.com)\b",
        r"monday\.com\b",
        "'monday.com' must always be lowercase, even at the start of a sentence.",
        Severity::Critical,
    ),
    casing_rule(
        "MONDAY_SOLO_CASE",
        r"(?i:\bmonday)\b",
        // `Monday.com` is reported by MONDAY_COM_CASE alone.
        r"monday\b|(?i:monday\.com)\b",
        "'monday' (when used without the .com) must always be lowercase.",
        Severity::Critical,
    ),
    casing_rule(
        "MONDAY_APPS_CASE",
        r"(?i:\bmonday apps)\b",
        r"monday apps\b",
        "'monday apps' (the brand) must always be lowercase.",
        Severity::Critical,
    ),
    casing_rule(
        "MONDAY_WORKOS_CASE",
        r"(?i:\bmonday\.com work os)\b",
        r"monday\.com Work OS\b",
        "The platform infrastructure must be referred to exactly as 'monday.com Work OS'.",
        Severity::Critical,
    ),
    rule(
        "SUB_ITEMS_USAGE",
        r"\b(?i:sub[ -]?tasks?)\b",
        "Use 'Sub-items', not 'sub-tasks' or variations.",
        Severity::Critical,
    ),
    // ── Required capitalization ──────────────────────────────────────────
    // 'Agile' is left to the judges: it is also a common adjective.
    rule(
        "KANBAN_CASE",
        r"\bkanban\b",
        "'Kanban' (methodology) should be capitalized.",
        Severity::High,
    ),
    rule(
        "SCRUM_CASE",
        r"\bscrum\b",
        "'Scrum' (methodology) should be capitalized.",
        Severity::High,
    ),
    rule(
        "EMOJI_CASE",
        r"\bemojis?\b",
        "'Emoji' (singular and plural) must be capitalized.",
        Severity::Medium,
    ),
    casing_rule(
        "OK_CASE",
        r"(?i:\b(?:okay|ok))\b",
        r"OK\b",
        "Use 'OK' (uppercase). Do not use 'Okay'.",
        Severity::Medium,
    ),
    casing_rule(
        "URL_CASE",
        r"(?i:\burl)\b",
        r"URL\b",
        "Use 'URL' (uppercase).",
        Severity::Medium,
    ),
    // ── Compounding: one word ────────────────────────────────────────────
    rule("EBOOK_COMPOUNDING", r"\b(?i:e[- ]book)\b", "Use 'ebook'.", Severity::Medium),
    rule(
        "ECOMMERCE_COMPOUNDING",
        r"\b(?i:e[- ]commerce)\b",
        "Use 'ecommerce'.",
        Severity::Medium,
    ),
    rule("HASHTAG_SPELLING", r"\b(?i:hash[ -]tag)\b", "Use 'hashtag'.", Severity::Medium),
    rule(
        "HEADHUNTING_SPELLING",
        r"\b(?i:head[ -]hunt(?:ing|ers?))\b",
        "Use 'headhunting'/'headhunters'.",
        Severity::Medium,
    ),
    rule("HOMEPAGE_SPELLING", r"\b(?i:home[ -]page)\b", "Use 'homepage'.", Severity::Medium),
    rule(
        "MULTICHANNEL_SPELLING",
        r"\b(?i:multi[ -]channel)\b",
        "Use 'multichannel'.",
        Severity::Medium,
    ),
    rule("NONPROFIT_SPELLING", r"\b(?i:non[ -]profit)\b", "Use 'nonprofit'.", Severity::Medium),
    rule("USERNAME_SPELLING", r"\b(?i:user[ -]name)\b", "Use 'username'.", Severity::Medium),
    rule("WEBSITE_SPELLING", r"\b(?i:web[ -]site)\b", "Use 'website'.", Severity::Medium),
    // ── Compounding: hyphenated ──────────────────────────────────────────
    rule(
        "PPC_SPELLING",
        r"\b(?i:pay per click)\b",
        "Use 'pay-per-click'.",
        Severity::Medium,
    ),
    rule("PRESALE_SPELLING", r"\b(?i:pre ?sale)\b", "Use 'pre-sale'.", Severity::Medium),
    rule(
        "PMF_SPELLING",
        r"\b(?i:product market fit)\b",
        "Use 'product-market fit'.",
        Severity::Medium,
    ),
    rule("STARTUP_SPELLING", r"\b(?i:start ?up)\b", "Use 'start-up'.", Severity::Medium),
    // ── Compounding: separate words ──────────────────────────────────────
    rule("LIFECYCLE_SPELLING", r"\b(?i:life-?cycle)\b", "Use 'life cycle'.", Severity::Medium),
    // ── Formatting and punctuation ───────────────────────────────────────
    rule(
        "PERCENT_WORD_USAGE",
        r"\b(?i:percent)\b",
        "Use the % symbol, not the word 'percent'.",
        Severity::Medium,
    ),
    casing_rule(
        "POST_SCRIPT_FORMAT",
        r"(?i:\bP\.?S\.?)\b",
        r"P\.S\.",
        "Use 'P.S.' (with periods).",
        Severity::Medium,
    ),
    rule(
        "EM_DASH_SUBSTITUTES",
        r"--+|\s-\s",
        "Use a proper em dash (\u{2014}) instead of double hyphens (--) or a spaced hyphen ( - ).",
        Severity::Medium,
    ),
    // ── Forbidden words and misspellings ─────────────────────────────────
    rule(
        "SYNC_SPELLING",
        r"\b(?i:synch)\b",
        "Use 'sync', not 'synch'.",
        Severity::Medium,
    ),
    rule(
        "FORBIDDEN_JARGON_BUZZWORDS",
        r"\b(?i:disruptive|innovation|technologist|synergy|uplevel)\b",
        "Avoid jargon/buzzwords like 'disruptive', 'innovation', 'synergy', 'uplevel', or 'technologist'.",
        Severity::High,
    ),
    rule(
        "FORBIDDEN_LEARNINGS",
        r"\b(?i:learnings)\b",
        "Avoid the word 'learnings'. Use 'lessons', 'takeaways', or 'insights'.",
        Severity::High,
    ),
    // ── American English ─────────────────────────────────────────────────
    rule(
        "AMERICAN_ENGLISH_IZE_ISE",
        r"\b(?i:organise|realise|optimise|prioritise|maximise|minimise|centralise|customise|analyse|paralyse|authorise)(?:d|s|ing|ation)?\b",
        "Use American English spelling (e.g., 'organize' not 'organise'; 'analyze' not 'analyse').",
        Severity::High,
    ),
    rule(
        "AMERICAN_ENGLISH_OUR_OR",
        r"\b(?i:colour|behaviour|favour|honour|labour|neighbour|flavour)s?\b",
        "Use American English spelling (e.g., 'color' not 'colour').",
        Severity::High,
    ),
    rule(
        "AMERICAN_ENGLISH_RE_ER",
        r"\b(?i:centre|fibre|litre|metre)s?\b",
        "Use American English spelling (e.g., 'center' not 'centre').",
        Severity::High,
    ),
    rule(
        "AMERICAN_ENGLISH_CONSONANT_DOUBLING",
        r"\b(?i:travell(?:ing|ed|er)|modell(?:ing|ed)|cancell(?:ing|ed|ation))\b",
        "Use American English spelling (e.g., 'traveling', 'modeling', 'cancellation').",
        Severity::High,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rule_ids_are_unique() {
        let ids: HashSet<&str> = BRAND_RULES.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), BRAND_RULES.len());
    }

    #[test]
    fn every_pattern_compiles() {
        for spec in BRAND_RULES {
            assert!(regex::Regex::new(spec.pattern).is_ok(), "{}", spec.id);
            if let Some(exempt) = spec.exempt {
                assert!(regex::Regex::new(exempt).is_ok(), "{} exempt", spec.id);
            }
        }
    }

    #[test]
    fn brand_rules_are_critical() {
        for id in [
            "MONDAY_COM_CASE",
            "MONDAY_SOLO_CASE",
            "MONDAY_APPS_CASE",
            "MONDAY_WORKOS_CASE",
            "SUB_ITEMS_USAGE",
        ] {
            let spec = BRAND_RULES.iter().find(|r| r.id == id).unwrap();
            assert_eq!(spec.severity, Severity::Critical, "{id}");
        }
    }
}
