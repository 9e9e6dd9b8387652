//! Provider abstraction: one trait, one handle, one kind enum.

use std::sync::Arc;

use async_trait::async_trait;
use draftpilot_shared::{DraftPilotError, Result};

/// Supported language-model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Stable name used in config and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Parse a provider kind from its config name.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(DraftPilotError::config(format!(
                "unknown provider kind: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single language-model backend: one `complete` call, async,
/// constructed from credentials.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Model identifier in use.
    fn model(&self) -> &str;

    /// One completion request. No retry at this layer.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// A constructed provider tagged with its kind, so the gateway can tell
/// whether a failing call was already on the fallback.
#[derive(Clone)]
pub struct ProviderHandle {
    pub kind: ProviderKind,
    pub provider: Arc<dyn LlmProvider>,
}

impl ProviderHandle {
    pub fn new(kind: ProviderKind, provider: Arc<dyn LlmProvider>) -> Self {
        Self { kind, provider }
    }
}

/// Longest HTTP error body carried into a provider error.
const MAX_ERROR_BODY: usize = 300;

/// Truncate an HTTP error body for inclusion in a provider error, backing
/// off to a char boundary so multi-byte bodies slice cleanly.
pub(crate) fn truncate_body(body: &str) -> &str {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_truncates_on_char_boundaries() {
        let short = "quota exceeded";
        assert_eq!(truncate_body(short), short);

        // 451 bytes of three-byte characters; byte 300 falls mid-character.
        let multibyte = "€".repeat(151);
        let truncated = truncate_body(&multibyte);
        assert!(truncated.len() <= 300);
        assert_eq!(truncated.len() % 3, 0);
        assert!(truncated.chars().all(|c| c == '€'));
    }

    #[test]
    fn provider_kind_roundtrip() {
        assert_eq!(ProviderKind::parse("openai").unwrap(), ProviderKind::OpenAi);
        assert_eq!(
            ProviderKind::parse("anthropic").unwrap(),
            ProviderKind::Anthropic
        );
        assert!(ProviderKind::parse("gemini").is_err());
        assert_eq!(ProviderKind::OpenAi.as_str(), "openai");
    }
}
