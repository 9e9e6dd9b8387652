//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use draftpilot_shared::{DraftPilotError, Result};

use crate::provider::{LlmProvider, truncate_body};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Client for the OpenAI chat completions API (and compatible endpoints).
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: Url,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiProvider {
    /// Construct a client from a credential, model, optional endpoint
    /// override, and per-request timeout.
    pub fn new(
        api_key: String,
        model: String,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(base_url.unwrap_or(DEFAULT_BASE_URL))
            .map_err(|e| DraftPilotError::config(format!("invalid openai base url: {e}")))?
            .join("chat/completions")
            .map_err(|e| DraftPilotError::config(format!("invalid openai base url: {e}")))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("draftpilot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| DraftPilotError::provider("openai", format!("client build: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DraftPilotError::Network(format!("openai: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DraftPilotError::provider(
                "openai",
                format!("HTTP {status}: {}", truncate_body(&body)),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DraftPilotError::provider("openai", format!("bad response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| DraftPilotError::provider("openai", "empty choices in response"))
    }
}
