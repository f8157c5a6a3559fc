//! OpenRouter chat-completion client.
//!
//! Speaks the OpenAI-compatible `POST /chat/completions` endpoint.
//! See: <https://openrouter.ai/docs/api-reference/chat-completion>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use tracing::debug;

use super::traits::CompletionProvider;
use crate::types::{ChatRequest, Message};
use crate::{Result, VizgenError};

/// Default base URL for the OpenRouter API
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default `X-Title` header value
pub const DEFAULT_APP_TITLE: &str = "TextVisualizer";

/// Default `HTTP-Referer` header value
pub const DEFAULT_APP_URL: &str = "https://github.com/vizgen/vizgen";

/// Model used by [`OpenRouterClient::check_connection`].
const PROBE_MODEL: &str = "anthropic/claude-3.5-haiku";

/// Client for the OpenRouter chat-completion API.
#[derive(Clone)]
pub struct OpenRouterClient {
    api_key: String,
    http: Client,
    base_url: String,
    endpoint: String,
    app_url: String,
    app_title: String,
}

impl OpenRouterClient {
    /// Create a client for the public OpenRouter API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        // Per-attempt deadlines are enforced by the caller; this only bounds
        // connection setup.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| VizgenError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(api_key, base_url, http))
    }

    /// Create a client sharing an existing HTTP connection pool.
    pub fn with_http_client(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        http: Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            api_key: api_key.into(),
            http,
            endpoint: format!("{base_url}/chat/completions"),
            base_url,
            app_url: DEFAULT_APP_URL.to_string(),
            app_title: DEFAULT_APP_TITLE.to_string(),
        }
    }

    /// Set the `HTTP-Referer` header identifying the calling application.
    pub fn app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = url.into();
        self
    }

    /// Set the `X-Title` header identifying the calling application.
    pub fn app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = title.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the API key is accepted by sending a tiny completion.
    ///
    /// Succeeds when the API answers with a 2xx status; otherwise returns
    /// the mapped error.
    pub async fn check_connection(&self) -> Result<()> {
        let body = serde_json::json!({
            "model": PROBE_MODEL,
            "messages": [Message::user("ping")],
            "max_tokens": 10,
        });
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.app_url)
            .header("X-Title", &self.app_title)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await?;
        Self::handle_response_errors(response).await.map(|_| ())
    }

    /// Map a non-success response to its error class, logging the body.
    async fn handle_response_errors(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "OpenRouter error response");

        Err(VizgenError::from_status(status.as_u16(), retry_after))
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.app_url)
            .header("X-Title", &self.app_title)
            .json(request)
            .send()
            .await?;

        let response = Self::handle_response_errors(response).await?;

        let body: CompletionResponse = response.json().await.map_err(|e| {
            debug!(error = %e, "OpenRouter response did not decode");
            VizgenError::MalformedResponse
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(VizgenError::MalformedResponse)
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = OpenRouterClient::with_http_client("k", "http://localhost:1/api/v1/", Client::new());
        assert_eq!(client.endpoint(), "http://localhost:1/api/v1/chat/completions");
        assert_eq!(client.base_url(), "http://localhost:1/api/v1");
    }

    #[test]
    fn response_without_content_decodes() {
        let body: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(body.choices[0].message.content.is_none());

        let body: CompletionResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(body.choices.is_empty());
    }
}
