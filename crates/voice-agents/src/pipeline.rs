//! Pipeline Coordinator: rule check, judge panel, aggregation, report.
//!
//! Every content item moves through the same stages, in order:
//!
//! ```text
//! Pending → RuleChecked → PanelComplete → Scored → Reported
//! ```
//!
//! [`Pipeline::resume`] follows the same path but starts from a prior report:
//! only judges recorded as failed are called again, and the stored
//! mechanical findings are reused.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use voice_scoring::judge::failed_judges;
use voice_scoring::panel::{AnthropicEndpoint, DirectoryCriteria};
use voice_scoring::rules::count_by_severity;
use voice_scoring::{
    Aggregator, EvaluationReport, GateThresholds, JudgePanel, JudgeRegistry, PanelResults,
    RuleEngine, RuleViolation, Severity,
};

use crate::config::VoiceConfig;
use crate::store::{calibration_subfolder, ReportStore};

// ── Stages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Pending,
    RuleChecked,
    PanelComplete,
    Scored,
    Reported,
}

impl PipelineStage {
    /// The only stage reachable from `self`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::RuleChecked),
            Self::RuleChecked => Some(Self::PanelComplete),
            Self::PanelComplete => Some(Self::Scored),
            Self::Scored => Some(Self::Reported),
            Self::Reported => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::RuleChecked => "RuleChecked",
            Self::PanelComplete => "PanelComplete",
            Self::Scored => "Scored",
            Self::Reported => "Reported",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct IllegalStageTransition {
    pub from: PipelineStage,
    pub to: PipelineStage,
}

impl fmt::Display for IllegalStageTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal pipeline stage transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalStageTransition {}

/// Tracks one item's progress and refuses to skip or repeat stages.
#[derive(Debug)]
pub struct StageTracker {
    content_id: String,
    current: PipelineStage,
    started: Instant,
    history: Vec<PipelineStage>,
}

impl StageTracker {
    pub fn new(content_id: &str) -> Self {
        Self {
            content_id: content_id.to_string(),
            current: PipelineStage::Pending,
            started: Instant::now(),
            history: vec![PipelineStage::Pending],
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub fn advance(&mut self, to: PipelineStage) -> Result<(), IllegalStageTransition> {
        if self.current.next() != Some(to) {
            return Err(IllegalStageTransition {
                from: self.current,
                to,
            });
        }
        debug!(
            content_id = %self.content_id,
            from = %self.current,
            to = %to,
            elapsed = ?self.started.elapsed(),
            "Pipeline stage"
        );
        self.current = to;
        self.history.push(to);
        Ok(())
    }
}

// ── Inputs and outputs ────────────────────────────────────────────────────

/// One piece of content to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub text: String,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Read a content file; the id is the file stem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .with_context(|| format!("No file name in {}", path.display()))?;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read content file {}", path.display()))?;
        Ok(Self { id, text })
    }
}

/// Result of one analyze or resume run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: EvaluationReport,
    pub path: PathBuf,
    /// Judges that still have no score after this run.
    pub failed_judges: Vec<String>,
}

impl AnalysisOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_judges.is_empty()
    }
}

/// Rule-engine-only dry run.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCheck {
    pub violations: Vec<RuleViolation>,
}

impl RuleCheck {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn counts(&self) -> BTreeMap<Severity, usize> {
        count_by_severity(&self.violations)
    }

    /// Violations grouped by severity, most severe first. Empty groups are omitted.
    pub fn by_severity(&self) -> BTreeMap<Severity, Vec<&RuleViolation>> {
        let mut groups: BTreeMap<Severity, Vec<&RuleViolation>> = BTreeMap::new();
        for v in &self.violations {
            groups.entry(v.severity).or_default().push(v);
        }
        groups
    }
}

pub fn check_rules(engine: &RuleEngine, text: &str) -> RuleCheck {
    RuleCheck {
        violations: engine.check(text),
    }
}

#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub outcome: Result<AnalysisOutcome>,
}

#[derive(Debug)]
pub struct BatchSummary {
    pub subfolder: Option<&'static str>,
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_ok()).count()
    }

    pub fn errored(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    /// Every item produced a report and every judge scored.
    pub fn all_succeeded(&self) -> bool {
        self.items
            .iter()
            .all(|i| i.outcome.as_ref().is_ok_and(AnalysisOutcome::is_complete))
    }
}

/// `*.txt` and `*.md` files directly inside `dir`, sorted by name.
pub fn list_content_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read batch directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"))
        })
        .collect();
    files.sort();
    Ok(files)
}

// ── Coordinator ───────────────────────────────────────────────────────────

enum Destination<'a> {
    Store(Option<&'a str>),
    File(&'a Path),
}

pub struct Pipeline {
    registry: Arc<JudgeRegistry>,
    rules: RuleEngine,
    panel: JudgePanel,
    aggregator: Aggregator,
    store: ReportStore,
    batch_delay: Duration,
}

impl Pipeline {
    pub fn new(
        registry: Arc<JudgeRegistry>,
        panel: JudgePanel,
        thresholds: GateThresholds,
        store: ReportStore,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(registry.clone(), thresholds),
            registry,
            rules: RuleEngine::new(),
            panel,
            store,
            batch_delay: Duration::from_secs(5),
        }
    }

    /// Full production wiring: Anthropic endpoint, criteria from the prompts dir.
    pub fn from_config(config: &VoiceConfig) -> Result<Self> {
        let registry = Arc::new(JudgeRegistry::standard().context("Judge registry is invalid")?);
        let settings = config.endpoint_settings()?;
        let endpoint =
            AnthropicEndpoint::new(settings).context("Failed to build model endpoint client")?;
        let criteria = DirectoryCriteria::new(&config.prompts_dir);

        let panel = JudgePanel::new(registry.clone(), Arc::new(endpoint), Arc::new(criteria))
            .with_retry(config.retry.clone())
            .with_mode(config.dispatch_mode());

        info!(
            model = %config.model.name,
            prompts = %config.prompts_dir.display(),
            reports = %config.reports_dir.display(),
            "Pipeline configured"
        );

        Ok(
            Self::new(registry, panel, config.gates, ReportStore::new(&config.reports_dir))
                .with_rules(RuleEngine::new().with_context_window(config.context_window))
                .with_batch_delay(config.batch_delay),
        )
    }

    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn check_rules(&self, text: &str) -> RuleCheck {
        check_rules(&self.rules, text)
    }

    /// Evaluate one item end to end and persist its report.
    pub async fn analyze(&self, item: &ContentItem, subfolder: Option<&str>) -> Result<AnalysisOutcome> {
        let mut stage = StageTracker::new(&item.id);
        info!(content_id = %item.id, "Analyzing content");

        let violations = self.rules.check(&item.text);
        info!(
            content_id = %item.id,
            violations = violations.len(),
            "Rule check complete"
        );
        stage.advance(PipelineStage::RuleChecked)?;

        let results = self.panel.evaluate(&item.text).await;
        stage.advance(PipelineStage::PanelComplete)?;

        self.finish(&item.id, &violations, &results, stage, Destination::Store(subfolder))
    }

    /// Re-run only the judges that failed in `report_path` and rewrite it.
    ///
    /// An unreadable or unparseable prior report is a hard failure. With no
    /// failed judges the report is rebuilt without any model call.
    pub async fn resume(&self, item: &ContentItem, report_path: &Path) -> Result<AnalysisOutcome> {
        let prior = self
            .store
            .load(report_path)
            .with_context(|| format!("Failed to load prior report {}", report_path.display()))?;
        let content_id = prior.content_id().to_string();
        if content_id != item.id {
            warn!(
                report = %content_id,
                content = %item.id,
                "Content file name differs from the report's content id"
            );
        }

        let mut stage = StageTracker::new(&content_id);
        let mut results = prior
            .reconstruct_results(&self.registry)
            .with_context(|| format!("Cannot reconstruct judge results from {}", report_path.display()))?;
        let violations = prior
            .mechanical_violations()
            .with_context(|| format!("Cannot recover rule violations from {}", report_path.display()))?;
        stage.advance(PipelineStage::RuleChecked)?;

        let failed = failed_judges(&results);
        if failed.is_empty() {
            info!(content_id = %content_id, "No failed judges; rebuilding report");
        } else {
            info!(
                content_id = %content_id,
                failed = failed.len(),
                judges = ?failed,
                "Re-running failed judges"
            );
            let retried = self.panel.evaluate_subset(&item.text, &failed).await;
            results.extend(retried);
        }
        stage.advance(PipelineStage::PanelComplete)?;

        self.finish(&content_id, &violations, &results, stage, Destination::File(report_path))
    }

    /// Analyze every content file in `dir`, pausing between items.
    ///
    /// A failing item is recorded and the batch moves on.
    pub async fn run_batch(&self, dir: &Path) -> Result<BatchSummary> {
        let files = list_content_files(dir)?;
        let subfolder = calibration_subfolder(dir);
        info!(
            dir = %dir.display(),
            files = files.len(),
            subfolder = subfolder.unwrap_or("-"),
            "Starting batch"
        );

        let mut items = Vec::with_capacity(files.len());
        for (index, path) in files.into_iter().enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            info!(item = index + 1, path = %path.display(), "Batch item");

            let outcome = match ContentItem::from_file(&path) {
                Ok(item) => self.analyze(&item, subfolder).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &outcome {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Batch item failed");
            }
            items.push(BatchItem { path, outcome });
        }

        let summary = BatchSummary { subfolder, items };
        info!(
            succeeded = summary.succeeded(),
            errored = summary.errored(),
            "Batch complete"
        );
        Ok(summary)
    }

    fn finish(
        &self,
        content_id: &str,
        violations: &[RuleViolation],
        results: &PanelResults,
        mut stage: StageTracker,
        destination: Destination<'_>,
    ) -> Result<AnalysisOutcome> {
        let card = self.aggregator.aggregate(violations, results);
        stage.advance(PipelineStage::Scored)?;

        let report = EvaluationReport::build(content_id, self.panel.model_name(), &card);
        let path = match destination {
            Destination::Store(subfolder) => self.store.save(&report, subfolder)?,
            Destination::File(path) => {
                report.write_to(path)?;
                path.to_path_buf()
            }
        };
        stage.advance(PipelineStage::Reported)?;

        let failed = report.failed_judges();
        info!(
            content_id,
            overall = ?report.results.overall_score,
            status = %report.results.status,
            failed = failed.len(),
            "Evaluation complete"
        );

        Ok(AnalysisOutcome {
            report,
            path,
            failed_judges: failed,
        })
    }
}
