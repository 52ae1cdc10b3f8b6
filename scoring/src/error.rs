//! Error taxonomy for the scoring library.
//!
//! | Error          | Raised by                      | Fatal |
//! |----------------|--------------------------------|-------|
//! | ConfigError    | registry / settings validation | yes, before any content is processed |
//! | EndpointError  | model endpoint transport       | no, classified for retry |
//! | ReportError    | report persistence and resume  | yes, for the resume operation |
//!
//! Individual judge failures are not errors at all: they are captured as
//! [`crate::judge::JudgeResult::Failed`] values by the panel.

use std::fmt;

use thiserror::Error;

/// Configuration problems detected at start-up.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Category or total weights do not add up.
    #[error("Weight validation failed:\n{}", .0.join("\n"))]
    WeightValidation(Vec<String>),

    /// Any other invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the panel should react to an endpoint failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Network blip, overloaded backend, 5xx: retry with exponential backoff.
    Transient,
    /// The endpoint asked us to slow down: retry after the fixed long backoff.
    RateLimit,
    /// Retrying cannot help (auth, bad request, empty reply).
    Fatal,
}

impl RetryClass {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::Transient | Self::RateLimit)
    }
}

impl fmt::Display for RetryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Errors returned by a [`crate::panel::ModelEndpoint`].
#[derive(Debug, Error)]
pub enum EndpointError {
    /// HTTP 429 or a provider-specific rate-limit signal.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Connection, timeout or body-read failure.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Non-success HTTP status other than 429.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The endpoint answered but carried no text content.
    #[error("Empty response from API")]
    EmptyResponse,
}

impl EndpointError {
    /// Classify this error for the retry loop.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited(_) => RetryClass::RateLimit,
            Self::Transport(_) => RetryClass::Transient,
            // 408 timeout, 409 conflict, 529 overloaded and every 5xx are worth another try.
            Self::Api { status, .. } if *status >= 500 || matches!(status, 408 | 409) => {
                RetryClass::Transient
            }
            Self::Api { .. } | Self::EmptyResponse => RetryClass::Fatal,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.retry_class().is_retriable()
    }
}

/// Errors from reading, writing or reinterpreting persisted reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The report parsed as JSON but cannot be turned back into judge results.
    #[error("Report cannot be reconstructed: {0}")]
    Unparseable(String),
}

pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_its_own_class() {
        let err = EndpointError::RateLimited("429".into());
        assert_eq!(err.retry_class(), RetryClass::RateLimit);
        assert!(err.is_retriable());
    }

    #[test]
    fn server_errors_are_transient() {
        for status in [500, 502, 503, 529, 408] {
            let err = EndpointError::Api {
                status,
                body: String::new(),
            };
            assert_eq!(err.retry_class(), RetryClass::Transient, "status {status}");
        }
    }

    #[test]
    fn client_errors_are_fatal() {
        let err = EndpointError::Api {
            status: 401,
            body: "invalid x-api-key".into(),
        };
        assert!(!err.is_retriable());
        assert!(!EndpointError::EmptyResponse.is_retriable());
    }

    #[test]
    fn weight_validation_lists_every_problem() {
        let err = ConfigError::WeightValidation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Weight validation failed:\na\nb");
    }
}
