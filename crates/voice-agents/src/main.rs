use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use voice_agents::pipeline::check_rules;
use voice_agents::{AnalysisOutcome, BatchSummary, ContentItem, Pipeline, RuleCheck, VoiceConfig};
use voice_scoring::{load_reports, CalibrationSummary, GateStatus, RuleEngine};

#[derive(Parser, Debug)]
#[command(name = "voice-agents", version, about = "Score content against the challenger brand voice")]
struct Cli {
    /// TOML file overlaying the defaults and environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one content file.
    Analyze {
        file: PathBuf,
        /// Print the full report as JSON instead of the summary.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate every .txt/.md file in a directory.
    Batch { dir: PathBuf },
    /// Re-run only the judges that failed in an earlier report.
    Continue { file: PathBuf, report: PathBuf },
    /// Run the deterministic brand rules only.
    CheckRules { file: PathBuf },
    /// Summarize a directory of reports for threshold calibration.
    Summary { dir: PathBuf },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = VoiceConfig::load(cli.config.as_deref())?;

    let success = match cli.command {
        Command::Analyze { file, json } => {
            let pipeline = Pipeline::from_config(&config)?;
            let item = ContentItem::from_file(&file)?;
            let outcome = pipeline.analyze(&item, None).await?;
            if json {
                println!("{}", outcome.report.to_json_pretty()?);
            } else {
                print_outcome(&outcome);
            }
            outcome.is_complete()
        }
        Command::Batch { dir } => {
            let pipeline = Pipeline::from_config(&config)?;
            let summary = pipeline.run_batch(&dir).await?;
            print_batch(&summary);
            summary.all_succeeded()
        }
        Command::Continue { file, report } => {
            let pipeline = Pipeline::from_config(&config)?;
            let item = ContentItem::from_file(&file)?;
            let outcome = pipeline.resume(&item, &report).await?;
            print_outcome(&outcome);
            outcome.is_complete()
        }
        Command::CheckRules { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let engine = RuleEngine::new().with_context_window(config.context_window);
            let check = check_rules(&engine, &text);
            print_rule_check(&file, &check);
            check.is_clean()
        }
        Command::Summary { dir } => summarize(&dir)?,
    };

    info!(success, "Done");
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn fmt_score(score: Option<f64>) -> String {
    score.map_or_else(|| "n/a".to_string(), |s| format!("{s:.2}"))
}

fn fmt_gate(status: GateStatus) -> &'static str {
    match status {
        GateStatus::Passed => "PASS",
        GateStatus::Failed => "FAIL",
        GateStatus::Indeterminate => "not calibrated",
    }
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let report = &outcome.report;
    let gates = &report.gates_status;
    let evaluated = report
        .metadata
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S");

    println!("\n{}", "=".repeat(72));
    println!("{}  ({evaluated}, {})", report.content_id(), report.metadata.model_used);
    println!("{}", "=".repeat(72));
    println!("Overall score : {}", fmt_score(report.results.overall_score));
    println!("Status        : {}", report.results.status);
    println!(
        "Gates         : quality {} | tone {} | brand {} ({} critical)",
        fmt_gate(gates.gate_1_overall_threshold_met),
        fmt_gate(gates.gate_2_tone_veto_passed),
        fmt_gate(gates.gate_3_brand_veto_passed),
        gates.critical_violations_count,
    );

    for (id, category) in &report.parameters {
        let marker = if category.has_failures { " *" } else { "" };
        println!(
            "\n{id} {} [weight {:.2}]: {}{marker}",
            category.name,
            category.weight,
            fmt_score(category.parameter_score)
        );
        for (judge_id, judge) in &category.sub_parameters {
            match (judge.failure(), judge.score) {
                (Some(error), _) => println!("  {judge_id:<20} ERROR: {error}"),
                (None, Some(score)) => {
                    println!("  {judge_id:<20} {} ({})", score.value(), score.label())
                }
                (None, None) => println!("  {judge_id:<20} -"),
            }
        }
    }

    if !outcome.failed_judges.is_empty() {
        println!(
            "\n{} judge(s) failed: {}",
            outcome.failed_judges.len(),
            outcome.failed_judges.join(", ")
        );
        println!("Resume with: voice-agents continue <content file> {}", outcome.path.display());
    }
    println!("\nReport: {}", outcome.path.display());
}

fn print_batch(summary: &BatchSummary) {
    println!("\nBatch: {} item(s)", summary.items.len());
    if let Some(sub) = summary.subfolder {
        println!("Reports routed to: {sub}");
    }
    for item in &summary.items {
        match &item.outcome {
            Ok(outcome) => println!(
                "  {:<40} {:>6}  {}{}",
                item.path.display(),
                fmt_score(outcome.report.results.overall_score),
                outcome.report.results.status,
                if outcome.is_complete() {
                    String::new()
                } else {
                    format!(" ({} failed)", outcome.failed_judges.len())
                }
            ),
            Err(e) => println!("  {:<40}  ERROR: {e:#}", item.path.display()),
        }
    }
    println!("\n{} succeeded, {} errored", summary.succeeded(), summary.errored());
}

fn print_rule_check(file: &Path, check: &RuleCheck) {
    if check.is_clean() {
        println!("{}: no rule violations", file.display());
        return;
    }
    println!("{}: {} violation(s)", file.display(), check.violations.len());
    for (severity, violations) in check.by_severity() {
        println!("\n{severity} ({})", violations.len());
        for v in violations {
            println!("  [{}] \"{}\"  {}", v.rule_id, v.violation, v.message);
            println!("      {}", v.context);
        }
    }
}

fn summarize(dir: &Path) -> Result<bool> {
    let loaded = load_reports(dir)
        .with_context(|| format!("Failed to list reports in {}", dir.display()))?;
    for (path, error) in &loaded.failures {
        println!("Skipped {}: {error}", path.display());
    }
    let summary = CalibrationSummary::from_reports(&loaded.reports);

    println!("\nReports          : {}", summary.total_reports);
    println!("Average overall  : {}", fmt_score(summary.average_overall));
    println!(
        "Publish-ready    : {} ({})",
        summary.pass_count,
        summary
            .pass_rate()
            .map_or_else(|| "n/a".to_string(), |r| format!("{:.0}%", r * 100.0))
    );
    println!(
        "Gate failures    : quality {} | tone {} | brand {}",
        summary.gate_failures.quality, summary.gate_failures.tone, summary.gate_failures.brand
    );
    let dist = summary.overall_distribution;
    println!("Overall buckets  : [1,2) {} | [2,3) {} | [3,4] {}", dist.low, dist.mid, dist.high);

    println!("\nCategory averages:");
    for (id, avg) in &summary.category_averages {
        println!("  {id:<24} {}", fmt_score(*avg));
    }
    println!("\nJudge averages:");
    for (id, avg) in &summary.judge_averages {
        println!("  {id:<24} {}", fmt_score(*avg));
    }
    if !summary.violation_details.is_empty() {
        println!(
            "\nCritical violations: {} total",
            summary.total_critical_violations
        );
        for (content_id, count) in &summary.violation_details {
            println!("  {content_id}: {count}");
        }
    }

    Ok(loaded.failures.is_empty())
}
