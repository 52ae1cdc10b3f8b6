//! Rule compilation and scanning.

use regex::Regex;
use tracing::{debug, warn};

use super::catalog::{RuleSpec, BRAND_RULES};
use super::RuleViolation;

/// Characters of surrounding text captured on each side of a match.
pub const DEFAULT_CONTEXT_WINDOW: usize = 30;

struct CompiledRule {
    spec: RuleSpec,
    regex: Regex,
    /// `^`-anchored version of `spec.exempt`.
    exempt: Option<Regex>,
}

impl CompiledRule {
    fn compile(spec: &RuleSpec) -> Result<Self, regex::Error> {
        let regex = Regex::new(spec.pattern)?;
        let exempt = spec
            .exempt
            .map(|p| Regex::new(&format!("^(?:{p})")))
            .transpose()?;
        Ok(Self {
            spec: *spec,
            regex,
            exempt,
        })
    }

    fn is_exempt(&self, text: &str, start: usize) -> bool {
        self.exempt
            .as_ref()
            .is_some_and(|re| re.is_match(&text[start..]))
    }
}

/// Compiled, immutable rule set. Cheap to share behind an `Arc`.
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
    context_window: usize,
}

impl RuleEngine {
    /// The brand catalog with the default context window.
    pub fn new() -> Self {
        Self::with_rules(BRAND_RULES, DEFAULT_CONTEXT_WINDOW)
    }

    /// Compile `specs`. Rules with malformed patterns are skipped with a
    /// warning; the remaining rules still run.
    pub fn with_rules(specs: &[RuleSpec], context_window: usize) -> Self {
        let rules = specs
            .iter()
            .filter_map(|spec| match CompiledRule::compile(spec) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!(rule = spec.id, error = %e, "Skipping rule with malformed pattern");
                    None
                }
            })
            .collect();
        Self {
            rules,
            context_window,
        }
    }

    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    /// Number of rules that compiled.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Scan `text` with every rule. Empty result means full compliance.
    pub fn check(&self, text: &str) -> Vec<RuleViolation> {
        let mut violations = Vec::new();

        for rule in &self.rules {
            for m in rule.regex.find_iter(text) {
                if rule.is_exempt(text, m.start()) {
                    continue;
                }
                violations.push(RuleViolation {
                    rule_id: rule.spec.id.to_string(),
                    severity: rule.spec.severity,
                    message: rule.spec.message.to_string(),
                    violation: m.as_str().trim().to_string(),
                    context: context_snippet(text, m.start(), m.end(), self.context_window),
                });
            }
        }

        debug!(violations = violations.len(), "Rule scan complete");
        violations
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract `window` characters either side of `[start, end)`.
///
/// Newlines become spaces and the snippet is trimmed; `...` marks the side(s)
/// where the window stopped short of the text boundary.
pub fn context_snippet(text: &str, start: usize, end: usize, window: usize) -> String {
    let ctx_start = text[..start]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map_or(start, |(i, _)| i);
    let ctx_end = text[end..]
        .char_indices()
        .nth(window)
        .map_or(text.len(), |(i, _)| end + i);

    let prefix = if ctx_start > 0 { "..." } else { "" };
    let suffix = if ctx_end < text.len() { "..." } else { "" };
    let snippet = text[ctx_start..ctx_end].replace(['\r', '\n'], " ");

    format!("{prefix}{}{suffix}", snippet.trim())
}
