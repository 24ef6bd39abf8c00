//! Anthropic Messages API completion service.
//!
//! Sends one non-streaming `POST /v1/messages` per turn and maps the
//! response blocks back to text and tool calls.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::convert::{build_request_body, parse_api_error, parse_response};
use crate::service::{Completion, CompletionError, CompletionRequest, CompletionResult, CompletionService};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Connection settings for the Messages API.
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// Base URL, without the `/v1/messages` suffix.
    pub base_url: String,
    /// Model id.
    pub model: String,
    /// Max output tokens per turn.
    pub max_tokens: u32,
    /// API key sent as `x-api-key`.
    pub api_key: String,
}

impl AnthropicConfig {
    /// Config against the public endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: model.into(),
            max_tokens: 4_096,
            api_key: api_key.into(),
        }
    }
}

/// Completion service backed by the Anthropic Messages API.
pub struct AnthropicCompletionService {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl AnthropicCompletionService {
    /// Create a service with its own HTTP client.
    #[must_use]
    pub fn new(config: AnthropicConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a service sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: AnthropicConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> CompletionResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let _ = headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| CompletionError::Auth {
                message: format!("Invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionService for AnthropicCompletionService {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip_all, fields(agent = %request.agent, model = %self.config.model))]
    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<Completion> {
        let headers = self.build_headers()?;
        let body = build_request_body(request, &self.config.model, self.config.max_tokens);
        debug!(
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(self.url())
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let (message, retryable) = parse_api_error(&body_text, status.as_u16());
            error!(status = status.as_u16(), retryable, %message, "completion API error");
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(CompletionError::Auth { message });
            }
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
                retryable,
            });
        }

        let json: Value = response.json().await?;
        let completion = parse_response(json)?;
        debug!(
            has_text = completion.text.is_some(),
            tool_calls = completion.tool_calls.len(),
            "completion received"
        );
        Ok(completion)
    }
}
