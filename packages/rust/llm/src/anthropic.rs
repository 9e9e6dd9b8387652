//! Anthropic messages API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use draftpilot_shared::{DraftPilotError, Result};

use crate::provider::{LlmProvider, truncate_body};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

/// Client for the Anthropic messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: Url,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicProvider {
    /// Construct a client from a credential, model, optional endpoint
    /// override, and per-request timeout.
    pub fn new(
        api_key: String,
        model: String,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(base_url.unwrap_or(DEFAULT_BASE_URL))
            .map_err(|e| DraftPilotError::config(format!("invalid anthropic base url: {e}")))?
            .join("v1/messages")
            .map_err(|e| DraftPilotError::config(format!("invalid anthropic base url: {e}")))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("draftpilot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| DraftPilotError::provider("anthropic", format!("client build: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: system_prompt,
            messages: vec![UserMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| DraftPilotError::Network(format!("anthropic: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DraftPilotError::provider(
                "anthropic",
                format!("HTTP {status}: {}", truncate_body(&body)),
            ));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DraftPilotError::provider("anthropic", format!("bad response: {e}")))?;

        let text: String = parsed.content.into_iter().map(|b| b.text).collect();
        if text.is_empty() {
            return Err(DraftPilotError::provider(
                "anthropic",
                "empty content in response",
            ));
        }
        Ok(text)
    }
}
