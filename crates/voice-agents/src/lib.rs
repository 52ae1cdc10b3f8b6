//! Command-line pipeline around `voice-scoring`.
//!
//! - [`config`]: defaults, environment and TOML overlay.
//! - [`store`]: where reports live on disk.
//! - [`pipeline`]: analyze, resume and batch runs.

pub mod config;
pub mod pipeline;
pub mod store;

pub use config::VoiceConfig;
pub use pipeline::{AnalysisOutcome, BatchSummary, ContentItem, Pipeline, PipelineStage, RuleCheck};
pub use store::ReportStore;
