//! Runtime configuration: compiled-in defaults, environment, optional TOML.
//!
//! Precedence, lowest first: built-in values, `VOICE_*` / `ANTHROPIC_API_KEY`
//! environment variables, then the TOML file passed with `--config`. Every
//! TOML key is optional.
//!
//! ```toml
//! [model]
//! name = "claude-sonnet-4-5-20250929"
//! timeout_secs = 120
//!
//! [dispatch]
//! mode = "parallel"        # or "sequential"
//! max_concurrent = 10
//! spacing_secs = 1.2
//!
//! [gates]
//! quality_floor = 3.2
//! tone_floor = 3.0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use voice_scoring::panel::anthropic::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use voice_scoring::panel::EndpointSettings;
use voice_scoring::rules::DEFAULT_CONTEXT_WINDOW;
use voice_scoring::{ConfigError, DispatchMode, GateThresholds, RetryPolicy};

/// Judge dispatch strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchKind {
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub kind: DispatchKind,
    pub max_concurrent: usize,
    /// Minimum gap between dispatch starts in parallel mode.
    pub spacing: Duration,
    /// Pause before each call in sequential mode.
    pub sequential_delay: Duration,
}

/// Top-level configuration for the voice pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Anthropic API key. Only needed when a judge has to be called.
    pub api_key: Option<String>,
    pub model: ModelConfig,
    pub dispatch: DispatchConfig,
    pub retry: RetryPolicy,
    /// Unset floors mean the gates are not calibrated yet.
    pub gates: GateThresholds,
    /// Pause between items of a batch run.
    pub batch_delay: Duration,
    pub prompts_dir: PathBuf,
    pub reports_dir: PathBuf,
    /// Characters of context captured on each side of a rule match.
    pub context_window: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let mut config = Self::builtin();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }
}

impl VoiceConfig {
    /// Compiled-in defaults, ignoring the environment.
    pub fn builtin() -> Self {
        Self {
            api_key: None,
            model: ModelConfig {
                name: DEFAULT_MODEL.into(),
                base_url: DEFAULT_BASE_URL.into(),
                temperature: 0.0,
                max_tokens: 1000,
                timeout: Duration::from_secs(120),
            },
            dispatch: DispatchConfig {
                kind: DispatchKind::Parallel,
                max_concurrent: 10,
                spacing: Duration::from_millis(1200),
                sequential_delay: Duration::from_millis(1200),
            },
            retry: RetryPolicy::default(),
            gates: GateThresholds::default(),
            batch_delay: Duration::from_secs(5),
            prompts_dir: PathBuf::from("prompts"),
            reports_dir: PathBuf::from("reports"),
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    /// Overlay environment variables read through `lookup`.
    ///
    /// Unparseable numeric values are logged and ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("VOICE_MODEL") {
            self.model.name = model;
        }
        if let Some(url) = lookup("VOICE_API_URL") {
            self.model.base_url = url;
        }
        if let Some(dir) = lookup("VOICE_PROMPTS_DIR") {
            self.prompts_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("VOICE_REPORTS_DIR") {
            self.reports_dir = PathBuf::from(dir);
        }
        if let Some(floor) = env_f64(&lookup, "VOICE_GATE_1_THRESHOLD") {
            self.gates.quality_floor = Some(floor);
        }
        if let Some(floor) = env_f64(&lookup, "VOICE_GATE_2_TONE_MINIMUM") {
            self.gates.tone_floor = Some(floor);
        }
    }

    /// Defaults plus environment, overlaid by `path` when given, then validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let file: ConfigFile = toml::from_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            config.apply_file(file)?;
            debug!(path = %path.display(), "Applied config file");
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) -> Result<(), ConfigError> {
        if let Some(model) = file.model {
            set(&mut self.model.name, model.name);
            set(&mut self.model.base_url, model.base_url);
            set(&mut self.model.temperature, model.temperature);
            set(&mut self.model.max_tokens, model.max_tokens);
            set(&mut self.model.timeout, secs("model.timeout_secs", model.timeout_secs)?);
        }
        if let Some(dispatch) = file.dispatch {
            set(&mut self.dispatch.kind, dispatch.mode);
            set(&mut self.dispatch.max_concurrent, dispatch.max_concurrent);
            set(&mut self.dispatch.spacing, secs("dispatch.spacing_secs", dispatch.spacing_secs)?);
            set(
                &mut self.dispatch.sequential_delay,
                secs("dispatch.sequential_delay_secs", dispatch.sequential_delay_secs)?,
            );
        }
        if let Some(retry) = file.retry {
            set(&mut self.retry.max_retries, retry.max_retries);
            set(
                &mut self.retry.initial_backoff,
                secs("retry.initial_backoff_secs", retry.initial_backoff_secs)?,
            );
            set(&mut self.retry.backoff_multiplier, retry.backoff_multiplier);
            set(
                &mut self.retry.rate_limit_backoff,
                secs("retry.rate_limit_backoff_secs", retry.rate_limit_backoff_secs)?,
            );
        }
        if let Some(gates) = file.gates {
            if gates.quality_floor.is_some() {
                self.gates.quality_floor = gates.quality_floor;
            }
            if gates.tone_floor.is_some() {
                self.gates.tone_floor = gates.tone_floor;
            }
        }
        if let Some(batch) = file.batch {
            set(&mut self.batch_delay, secs("batch.delay_secs", batch.delay_secs)?);
        }
        if let Some(paths) = file.paths {
            set(&mut self.prompts_dir, paths.prompts_dir);
            set(&mut self.reports_dir, paths.reports_dir);
        }
        if let Some(rules) = file.rules {
            set(&mut self.context_window, rules.context_window);
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.model.name.trim().is_empty() {
            problems.push("model name is empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            problems.push(format!("temperature {} is outside 0.0-1.0", self.model.temperature));
        }
        if self.model.max_tokens == 0 {
            problems.push("max_tokens must be positive".to_string());
        }
        if self.model.timeout.is_zero() {
            problems.push("model timeout must be positive".to_string());
        }
        if self.dispatch.max_concurrent == 0 {
            problems.push("max_concurrent must be at least 1".to_string());
        }
        let multiplier = self.retry.backoff_multiplier;
        if !(multiplier.is_finite() && multiplier >= 1.0) {
            problems.push(format!(
                "backoff_multiplier {} must be a finite number of at least 1.0",
                multiplier
            ));
        }
        for (name, floor) in [
            ("quality_floor", self.gates.quality_floor),
            ("tone_floor", self.gates.tone_floor),
        ] {
            if let Some(v) = floor.filter(|v| !(1.0..=4.0).contains(v)) {
                problems.push(format!("{name} {v} is outside the 1-4 score range"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }

    /// Connection settings for the model endpoint. Requires an API key.
    pub fn endpoint_settings(&self) -> Result<EndpointSettings, ConfigError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::Invalid("ANTHROPIC_API_KEY is not set".into()))?;
        Ok(EndpointSettings {
            api_key,
            base_url: self.model.base_url.clone(),
            model: self.model.name.clone(),
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            timeout: self.model.timeout,
        })
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        match self.dispatch.kind {
            DispatchKind::Parallel => DispatchMode::Parallel {
                max_concurrent: self.dispatch.max_concurrent,
                spacing: self.dispatch.spacing,
            },
            DispatchKind::Sequential => DispatchMode::Sequential {
                delay: self.dispatch.sequential_delay,
            },
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

/// Seconds from the config file as a duration; negative or non-finite is invalid.
fn secs(key: &str, value: Option<f64>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|v| {
            Duration::try_from_secs_f64(v)
                .map_err(|_| ConfigError::Invalid(format!("{key} = {v} is not a valid duration")))
        })
        .transpose()
}

fn env_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<f64>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring unparseable environment value");
            None
        }
    }
}

// ── TOML overlay ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    model: Option<ModelSection>,
    dispatch: Option<DispatchSection>,
    retry: Option<RetrySection>,
    gates: Option<GatesSection>,
    batch: Option<BatchSection>,
    paths: Option<PathsSection>,
    rules: Option<RulesSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelSection {
    name: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DispatchSection {
    mode: Option<DispatchKind>,
    max_concurrent: Option<usize>,
    spacing_secs: Option<f64>,
    sequential_delay_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetrySection {
    max_retries: Option<u32>,
    initial_backoff_secs: Option<f64>,
    backoff_multiplier: Option<f64>,
    rate_limit_backoff_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GatesSection {
    quality_floor: Option<f64>,
    tone_floor: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchSection {
    delay_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    prompts_dir: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesSection {
    context_window: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn builtin_defaults_leave_gates_uncalibrated() {
        let config = VoiceConfig::builtin();
        assert_eq!(config.gates, GateThresholds::default());
        assert_eq!(config.batch_delay, Duration::from_secs(5));
        assert_eq!(config.model.max_tokens, 1000);
        assert_eq!(config.dispatch_mode(), DispatchMode::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_and_bad_numbers_are_ignored() {
        let mut config = VoiceConfig::builtin();
        config.apply_env(env(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("VOICE_MODEL", "other-model"),
            ("VOICE_GATE_1_THRESHOLD", "3.2"),
            ("VOICE_GATE_2_TONE_MINIMUM", "three"),
        ]));

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model.name, "other-model");
        assert_eq!(config.gates.quality_floor, Some(3.2));
        assert_eq!(config.gates.tone_floor, None);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut config = VoiceConfig::builtin();
        config.apply_env(env(&[("ANTHROPIC_API_KEY", "  ")]));
        assert!(config.endpoint_settings().is_err());
    }

    #[test]
    fn toml_overlay_sets_only_given_keys() {
        let file: ConfigFile = toml::from_str(
            r#"
            [dispatch]
            mode = "sequential"
            sequential_delay_secs = 0.5

            [gates]
            tone_floor = 3.0

            [retry]
            max_retries = 1
            "#,
        )
        .unwrap();
        let mut config = VoiceConfig::builtin();
        config.apply_file(file).unwrap();

        assert_eq!(
            config.dispatch_mode(),
            DispatchMode::Sequential {
                delay: Duration::from_millis(500)
            }
        );
        assert_eq!(config.gates.tone_floor, Some(3.0));
        assert_eq!(config.gates.quality_floor, None);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.rate_limit_backoff, Duration::from_secs(60));
    }

    #[test]
    fn negative_durations_are_rejected() {
        let file: ConfigFile = toml::from_str("[batch]\ndelay_secs = -1.0\n").unwrap();
        let err = VoiceConfig::builtin().apply_file(file).unwrap_err();
        assert!(err.to_string().contains("batch.delay_secs"));
    }

    #[test]
    fn non_finite_backoff_multiplier_is_rejected() {
        for value in ["nan", "inf", "0.5"] {
            let file: ConfigFile =
                toml::from_str(&format!("[retry]\nbackoff_multiplier = {value}\n")).unwrap();
            let mut config = VoiceConfig::builtin();
            config.apply_file(file).unwrap();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("backoff_multiplier"), "{value}: {err}");
        }
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        assert!(toml::from_str::<ConfigFile>("[gates]\nquality = 3.0\n").is_err());
    }

    #[test]
    fn load_reads_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.toml");
        std::fs::write(&path, "[gates]\nquality_floor = 5.0\n").unwrap();

        let err = VoiceConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("quality_floor 5 is outside"), "{err}");
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut config = VoiceConfig::builtin();
        config.dispatch.max_concurrent = 0;
        config.model.temperature = 2.0;

        let Err(ConfigError::Invalid(msg)) = config.validate() else {
            panic!("expected invalid config");
        };
        assert!(msg.contains("max_concurrent"));
        assert!(msg.contains("temperature"));
    }

    #[test]
    fn endpoint_settings_carry_model_values() {
        let mut config = VoiceConfig::builtin();
        config.api_key = Some("sk".into());
        config.model.base_url = "http://localhost:9000".into();

        let settings = config.endpoint_settings().unwrap();
        assert_eq!(settings.base_url, "http://localhost:9000");
        assert_eq!(settings.model, DEFAULT_MODEL);
    }
}
