//! Anthropic Messages API endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{JudgeRequest, ModelEndpoint};
use crate::error::EndpointError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const API_VERSION: &str = "2023-06-01";

/// Connection and sampling settings for [`AnthropicEndpoint`].
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl EndpointSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 1000,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicEndpoint {
    settings: EndpointSettings,
    client: reqwest::Client,
}

impl AnthropicEndpoint {
    pub fn new(settings: EndpointSettings) -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EndpointError::Transport(format!("HTTP client build failed: {e}")))?;
        Ok(Self { settings, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'))
    }
}

fn request_body(settings: &EndpointSettings, request: &JudgeRequest) -> serde_json::Value {
    serde_json::json!({
        "model": settings.model,
        "max_tokens": settings.max_tokens,
        "temperature": settings.temperature,
        "system": request.system,
        "messages": [
            { "role": "user", "content": request.user },
            { "role": "assistant", "content": request.prefill },
        ]
    })
}

fn first_text(response: MessagesResponse) -> Result<String, EndpointError> {
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or(EndpointError::EmptyResponse)
}

#[async_trait]
impl ModelEndpoint for AnthropicEndpoint {
    async fn complete(&self, request: &JudgeRequest) -> Result<String, EndpointError> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request_body(&self.settings, request))
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| EndpointError::Transport(format!("response decode failed: {e}")))?;

        debug!(
            judge = %request.judge_id,
            elapsed = ?start.elapsed(),
            "Endpoint call complete"
        );
        first_text(parsed)
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JudgeRequest {
        JudgeRequest {
            judge_id: "1A_Positive".into(),
            system: "sys".into(),
            user: "usr".into(),
            prefill: "{".into(),
        }
    }

    #[test]
    fn body_carries_prefill_as_assistant_turn() {
        let body = request_body(&EndpointSettings::new("k"), &request());
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"], "{");
    }

    #[test]
    fn first_text_block_is_returned() {
        let response: MessagesResponse = serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": "\"score\": 3}"}]
        }))
        .unwrap();
        assert_eq!(first_text(response).unwrap(), "\"score\": 3}");
    }

    #[test]
    fn missing_content_is_empty_response() {
        let response: MessagesResponse =
            serde_json::from_value(serde_json::json!({ "content": [] })).unwrap();
        assert!(matches!(first_text(response), Err(EndpointError::EmptyResponse)));
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let mut settings = EndpointSettings::new("k");
        settings.base_url = "http://localhost:8080/".into();
        let endpoint = AnthropicEndpoint::new(settings).unwrap();
        assert_eq!(endpoint.messages_url(), "http://localhost:8080/v1/messages");
    }
}
