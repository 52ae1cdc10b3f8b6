//! JoinSet fan-out of judge calls.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::criteria::CriteriaSource;
use super::limiter::DispatchLimiter;
use super::parse::parse_judge_reply;
use super::prompt::JudgeRequest;
use super::retry::RetryPolicy;
use super::ModelEndpoint;
use crate::judge::{JudgeResult, PanelResults};
use crate::registry::JudgeRegistry;

/// How judge calls are scheduled. Both modes produce the same results.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchMode {
    /// One task per judge, admitted through a [`DispatchLimiter`].
    Parallel {
        max_concurrent: usize,
        spacing: Duration,
    },
    /// One judge at a time, pausing `delay` before each call.
    Sequential { delay: Duration },
}

impl Default for DispatchMode {
    fn default() -> Self {
        Self::Parallel {
            max_concurrent: 10,
            spacing: Duration::from_millis(1200),
        }
    }
}

#[derive(Clone)]
struct PanelInner {
    registry: Arc<JudgeRegistry>,
    endpoint: Arc<dyn ModelEndpoint>,
    criteria: Arc<dyn CriteriaSource>,
    retry: RetryPolicy,
}

/// Runs model-backed judges against content.
pub struct JudgePanel {
    inner: PanelInner,
    mode: DispatchMode,
}

impl JudgePanel {
    pub fn new(
        registry: Arc<JudgeRegistry>,
        endpoint: Arc<dyn ModelEndpoint>,
        criteria: Arc<dyn CriteriaSource>,
    ) -> Self {
        Self {
            inner: PanelInner {
                registry,
                endpoint,
                criteria,
                retry: RetryPolicy::default(),
            },
            mode: DispatchMode::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.inner.retry = retry;
        self
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn model_name(&self) -> &str {
        self.inner.endpoint.model_name()
    }

    /// Run every model-backed judge once.
    pub async fn evaluate(&self, content: &str) -> PanelResults {
        let ids = self.inner.registry.model_judge_ids();
        self.evaluate_subset(content, &ids).await
    }

    /// Run only `judge_ids`. The result holds exactly one entry per distinct id.
    pub async fn evaluate_subset(&self, content: &str, judge_ids: &[String]) -> PanelResults {
        let ids: BTreeSet<String> = judge_ids.iter().cloned().collect();
        if ids.is_empty() {
            return PanelResults::new();
        }
        info!(judges = ids.len(), mode = ?self.mode, "Starting judge panel");

        let mut results = match &self.mode {
            DispatchMode::Parallel {
                max_concurrent,
                spacing,
            } => {
                let limiter = Arc::new(DispatchLimiter::new(*max_concurrent, *spacing));
                self.run_parallel(content, &ids, limiter).await
            }
            DispatchMode::Sequential { delay } => {
                let mut results = PanelResults::new();
                for id in &ids {
                    tokio::time::sleep(*delay).await;
                    let result = run_judge(&self.inner, None, id, content).await;
                    results.insert(id.clone(), result);
                }
                results
            }
        };

        for id in &ids {
            results
                .entry(id.clone())
                .or_insert_with(|| JudgeResult::failed("Judge task did not complete"));
        }

        let failed: Vec<&String> = results
            .iter()
            .filter(|(_, r)| r.is_failed())
            .map(|(id, _)| id)
            .collect();
        info!(
            successful = results.len() - failed.len(),
            failed = failed.len(),
            "Judge panel complete"
        );
        for id in failed {
            warn!(judge = %id, error = results[id].error().unwrap_or_default(), "Judge failed");
        }

        results
    }

    async fn run_parallel(
        &self,
        content: &str,
        ids: &BTreeSet<String>,
        limiter: Arc<DispatchLimiter>,
    ) -> PanelResults {
        let shared = Arc::new(self.inner.clone());
        let content: Arc<str> = Arc::from(content);
        let mut join_set: JoinSet<(String, JudgeResult)> = JoinSet::new();

        for id in ids {
            let inner = shared.clone();
            let limiter = limiter.clone();
            let content = content.clone();
            let id = id.clone();

            join_set.spawn(async move {
                let result = run_judge(&inner, Some(&limiter), &id, &content).await;
                (id, result)
            });
        }

        let mut results = PanelResults::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((id, result)) => {
                    results.insert(id, result);
                }
                Err(e) => {
                    // The judge id is recovered when missing entries are filled in.
                    warn!(error = %e, "Judge task panicked");
                }
            }
        }
        results
    }
}

async fn run_judge(
    inner: &PanelInner,
    limiter: Option<&DispatchLimiter>,
    judge_id: &str,
    content: &str,
) -> JudgeResult {
    let Some(judge) = inner.registry.get(judge_id) else {
        return JudgeResult::failed(format!("Unknown judge: {judge_id}"));
    };
    let Some(criteria_file) = judge.criteria_file.as_deref().filter(|_| judge.is_model_backed())
    else {
        return JudgeResult::failed(format!("Judge {judge_id} is not model-backed"));
    };
    let Some(criteria) = inner.criteria.load(criteria_file) else {
        return JudgeResult::failed(format!("Criteria document not found: {criteria_file}"));
    };

    let request = JudgeRequest::new(judge, &criteria, content);
    let retry = &inner.retry;
    let mut attempt = 0;

    loop {
        let permit = match limiter {
            Some(limiter) => match limiter.acquire().await {
                Ok(permit) => Some(permit),
                Err(e) => return JudgeResult::failed(format!("Dispatch limiter closed: {e}")),
            },
            None => None,
        };
        debug!(judge = judge_id, attempt, "Dispatching judge call");
        let outcome = inner.endpoint.complete(&request).await;
        drop(permit);

        match outcome {
            Ok(text) => return parse_judge_reply(&request.prefill, &text),
            Err(e) => {
                let class = e.retry_class();
                if retry.should_retry(class, attempt) {
                    let backoff = retry.backoff(class, attempt);
                    warn!(
                        judge = judge_id,
                        attempt = attempt + 1,
                        retry_class = %class,
                        backoff_secs = backoff.as_secs_f64(),
                        error = %e,
                        "Judge call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                return if class.is_retriable() {
                    JudgeResult::failed(format!("API error after {} retries: {e}", retry.max_retries))
                } else {
                    JudgeResult::failed(format!("API error: {e}"))
                };
            }
        }
    }
}
