//! Judge panel: fan-out of model-backed judges over one piece of content.
//!
//! ```text
//!            ┌──────────────┐   criteria    ┌──────────────┐
//! content ──▶│  JudgePanel  │──────────────▶│ JudgeRequest │
//!            └──────┬───────┘               └──────┬───────┘
//!                   │ JoinSet task per judge       │
//!                   ▼                              ▼
//!          DispatchLimiter (permit + spacing) ─▶ ModelEndpoint::complete
//!                   │                              │
//!                   │◀── RetryPolicy backoff ──────┤ EndpointError
//!                   ▼                              ▼
//!             PanelResults ◀──────────────── parse_judge_reply
//! ```
//!
//! Individual judge failures never surface as errors: every requested
//! judge ends with exactly one [`JudgeResult`](crate::judge::JudgeResult).

pub mod anthropic;
pub mod criteria;
pub mod limiter;
pub mod orchestrator;
pub mod parse;
pub mod prompt;
pub mod retry;

use async_trait::async_trait;

use crate::error::EndpointError;

pub use anthropic::{AnthropicEndpoint, EndpointSettings};
pub use criteria::{CriteriaSource, DirectoryCriteria, InMemoryCriteria};
pub use limiter::DispatchLimiter;
pub use orchestrator::{DispatchMode, JudgePanel};
pub use parse::parse_judge_reply;
pub use prompt::{JudgeRequest, PREFILL};
pub use retry::{RetryPolicy, MAX_BACKOFF};

/// A language-model endpoint able to answer one judge request.
///
/// Implementations return the assistant text that follows the prefill,
/// without the prefill itself.
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    async fn complete(&self, request: &JudgeRequest) -> Result<String, EndpointError>;

    /// Model identifier recorded in reports.
    fn model_name(&self) -> &str;
}
