//! LLM gateway for draftpilot.
//!
//! Selects and invokes a language-model provider per stage, with
//! authentication/quota-aware fallback:
//!
//! - Construction resolves exactly one **primary** provider: the configured
//!   provider (credential present, init ok) → the universal fallback
//!   provider (credential present) → the configured provider forced.
//! - An optional **secondary** provider serves only bias-detection
//!   cross-validation; its absence degrades to single-model mode.
//! - Per-stage overrides are constructed on demand; a failing override
//!   construction silently falls back to the primary.
//! - `invoke` wraps exactly one request, with at most one fallback
//!   substitution when the failure classifies as auth/quota and the
//!   failing call was not already on the fallback provider.

pub mod anthropic;
pub mod openai;
pub mod provider;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use draftpilot_shared::{AppConfig, DraftPilotError, ProvidersConfig, Result, StageId};

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmProvider, ProviderHandle, ProviderKind};

/// The seam the pipeline stages talk to. [`LlmGateway`] is the production
/// implementation; tests substitute stubs.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One completion routed through the provider configured for `stage`.
    async fn generate(
        &self,
        stage: StageId,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String>;

    /// Second-model completion for bias cross-validation. `Ok(None)` when
    /// no secondary provider is configured.
    async fn cross_validate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Provider-selecting gateway with bounded fallback substitution.
pub struct LlmGateway {
    primary: ProviderHandle,
    fallback: Option<ProviderHandle>,
    secondary: Option<ProviderHandle>,
    overrides: HashMap<StageId, (ProviderKind, String)>,
    providers_config: ProvidersConfig,
    timeout: Duration,
}

impl LlmGateway {
    /// Resolve providers from config. Fails only when no provider at all
    /// can be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let providers = &config.providers;
        let timeout = Duration::from_secs(config.generation.request_timeout_secs);

        let primary_kind = ProviderKind::parse(&providers.primary)?;
        let fallback_kind = ProviderKind::parse(&providers.fallback)?;

        // Primary resolution chain: configured -> universal fallback ->
        // configured forced (calls will surface the credential failure).
        let primary = match try_build(primary_kind, &providers.primary_model, providers, timeout) {
            Ok(handle) => handle,
            Err(primary_err) => {
                debug!(provider = %primary_kind, error = %primary_err, "primary provider unavailable");
                match try_build(fallback_kind, &providers.fallback_model, providers, timeout) {
                    Ok(handle) => {
                        info!(provider = %fallback_kind, "using fallback provider as primary");
                        handle
                    }
                    Err(_) => {
                        warn!(provider = %primary_kind, "no credentialed provider; forcing configured provider");
                        force_build(primary_kind, &providers.primary_model, providers, timeout)?
                    }
                }
            }
        };

        let fallback = if fallback_kind != primary.kind {
            try_build(fallback_kind, &providers.fallback_model, providers, timeout).ok()
        } else {
            None
        };

        let secondary = providers
            .secondary
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|name| {
                let kind = ProviderKind::parse(name).ok()?;
                let model = providers
                    .secondary_model
                    .clone()
                    .unwrap_or_else(|| providers.primary_model.clone());
                match try_build(kind, &model, providers, timeout) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        warn!(provider = name, error = %e, "secondary provider unavailable, bias scoring degrades to single-model mode");
                        None
                    }
                }
            });

        let mut overrides = HashMap::new();
        for entry in &providers.stage_overrides {
            let Some(stage) = StageId::parse(&entry.stage) else {
                warn!(stage = %entry.stage, "ignoring override for unknown stage");
                continue;
            };
            let Ok(kind) = ProviderKind::parse(&entry.provider) else {
                warn!(provider = %entry.provider, "ignoring override with unknown provider");
                continue;
            };
            overrides.insert(stage, (kind, entry.model.clone()));
        }

        info!(
            primary = %primary.kind,
            fallback = fallback.as_ref().map(|f| f.kind.as_str()),
            secondary = secondary.as_ref().map(|s| s.kind.as_str()),
            overrides = overrides.len(),
            "llm gateway ready"
        );

        Ok(Self {
            primary,
            fallback,
            secondary,
            overrides,
            providers_config: providers.clone(),
            timeout,
        })
    }

    /// Assemble a gateway from pre-built handles. Used for custom wiring
    /// and stubbed providers in tests; stage overrides are empty.
    pub fn from_parts(
        primary: ProviderHandle,
        fallback: Option<ProviderHandle>,
        secondary: Option<ProviderHandle>,
    ) -> Self {
        Self {
            primary,
            fallback,
            secondary,
            overrides: HashMap::new(),
            providers_config: ProvidersConfig::default(),
            timeout: Duration::from_secs(60),
        }
    }

    /// The resolved primary provider kind.
    pub fn primary_kind(&self) -> ProviderKind {
        self.primary.kind
    }

    /// Whether a secondary provider is available for cross-validation.
    pub fn has_cross_validator(&self) -> bool {
        self.secondary.is_some()
    }

    /// Select the provider for a stage: the configured override when it
    /// can be constructed, otherwise the primary.
    fn handle_for_stage(&self, stage: StageId) -> ProviderHandle {
        if let Some((kind, model)) = self.overrides.get(&stage) {
            match try_build(*kind, model, &self.providers_config, self.timeout) {
                Ok(handle) => return handle,
                Err(e) => {
                    debug!(stage = %stage, error = %e, "stage override construction failed, using primary");
                }
            }
        }
        self.primary.clone()
    }

    /// One request with at most one fallback substitution.
    async fn invoke_from(
        &self,
        start: ProviderHandle,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String> {
        let mut handle = start;
        let mut attempt: u8 = 0;

        loop {
            match handle.provider.complete(system_prompt, user_prompt).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    let substitute = self
                        .fallback
                        .as_ref()
                        .filter(|fb| {
                            attempt < 2 && err.is_auth_or_quota() && fb.kind != handle.kind
                        })
                        .cloned();
                    let Some(fb) = substitute else {
                        return Err(err);
                    };
                    warn!(
                        from = %handle.kind,
                        to = %fb.kind,
                        error = %err,
                        "auth/quota failure, substituting fallback provider"
                    );
                    handle = fb;
                    attempt += 1;
                }
            }
        }
    }

    /// One request on the primary provider.
    pub async fn invoke(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.invoke_from(self.primary.clone(), system_prompt, user_prompt)
            .await
    }
}

#[async_trait]
impl TextGenerator for LlmGateway {
    async fn generate(
        &self,
        stage: StageId,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String> {
        let handle = self.handle_for_stage(stage);
        self.invoke_from(handle, system_prompt, user_prompt).await
    }

    async fn cross_validate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Option<String>> {
        match &self.secondary {
            Some(handle) => {
                let text = handle.provider.complete(system_prompt, user_prompt).await?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }
}

/// Build a provider, requiring its credential to be present.
fn try_build(
    kind: ProviderKind,
    model: &str,
    config: &ProvidersConfig,
    timeout: Duration,
) -> Result<ProviderHandle> {
    let env_name = match kind {
        ProviderKind::OpenAi => &config.openai_api_key_env,
        ProviderKind::Anthropic => &config.anthropic_api_key_env,
    };
    let key = draftpilot_shared::credential_for(env_name).ok_or_else(|| {
        DraftPilotError::provider(kind.as_str(), format!("credential {env_name} not set"))
    })?;
    build(kind, key, model, config, timeout)
}

/// Build a provider even without a credential. The first call will fail
/// with an auth error, which classifies for fallback substitution.
fn force_build(
    kind: ProviderKind,
    model: &str,
    config: &ProvidersConfig,
    timeout: Duration,
) -> Result<ProviderHandle> {
    let env_name = match kind {
        ProviderKind::OpenAi => &config.openai_api_key_env,
        ProviderKind::Anthropic => &config.anthropic_api_key_env,
    };
    let key = draftpilot_shared::credential_for(env_name).unwrap_or_default();
    build(kind, key, model, config, timeout)
}

fn build(
    kind: ProviderKind,
    key: String,
    model: &str,
    config: &ProvidersConfig,
    timeout: Duration,
) -> Result<ProviderHandle> {
    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            key,
            model.to_string(),
            config.openai_base_url.as_deref(),
            timeout,
        )?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
            key,
            model.to_string(),
            config.anthropic_base_url.as_deref(),
            timeout,
        )?),
    };
    Ok(ProviderHandle::new(kind, provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider stub that counts calls and either answers or fails with a
    /// fixed message.
    struct StubProvider {
        fail_with: Option<String>,
        response: String,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn ok(response: &str) -> Arc<Self> {
            Arc::new(Self {
                fail_with: None,
                response: response.into(),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                fail_with: Some(message.into()),
                response: String::new(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(msg) => Err(DraftPilotError::provider("stub", msg.clone())),
                None => Ok(self.response.clone()),
            }
        }
    }

    fn gateway(
        primary: Arc<StubProvider>,
        fallback: Option<Arc<StubProvider>>,
    ) -> LlmGateway {
        LlmGateway::from_parts(
            ProviderHandle::new(ProviderKind::Anthropic, primary),
            fallback.map(|f| ProviderHandle::new(ProviderKind::OpenAi, f)),
            None,
        )
    }

    #[tokio::test]
    async fn quota_failure_substitutes_fallback_exactly_once() {
        let primary = StubProvider::failing("quota exceeded for this month");
        let fallback = StubProvider::ok("fallback answer");
        let gw = gateway(primary.clone(), Some(fallback.clone()));

        let text = gw.invoke("sys", "user").await.expect("fallback answers");
        assert_eq!(text, "fallback answer");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_fallback_propagates_after_one_substitution() {
        let primary = StubProvider::failing("429 too many requests");
        let fallback = StubProvider::failing("401 unauthorized");
        let gw = gateway(primary.clone(), Some(fallback.clone()));

        let err = gw.invoke("sys", "user").await.unwrap_err();
        assert!(err.to_string().contains("401"));
        // Exactly one fallback invocation, even though its own failure
        // also matches the auth signatures.
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn non_quota_failure_never_substitutes() {
        let primary = StubProvider::failing("connection reset by peer");
        let fallback = StubProvider::ok("unused");
        let gw = gateway(primary.clone(), Some(fallback.clone()));

        let err = gw.invoke("sys", "user").await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn quota_failure_without_fallback_propagates() {
        let primary = StubProvider::failing("rate limit hit");
        let gw = gateway(primary.clone(), None);

        let err = gw.invoke("sys", "user").await.unwrap_err();
        assert!(err.is_auth_or_quota());
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn cross_validate_is_none_without_secondary() {
        let gw = gateway(StubProvider::ok("x"), None);
        let result = gw.cross_validate("sys", "user").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn cross_validate_uses_secondary() {
        let secondary = StubProvider::ok("second opinion");
        let gw = LlmGateway::from_parts(
            ProviderHandle::new(ProviderKind::Anthropic, StubProvider::ok("first")),
            None,
            Some(ProviderHandle::new(ProviderKind::OpenAi, secondary.clone())),
        );
        let result = gw.cross_validate("sys", "user").await.unwrap();
        assert_eq!(result.as_deref(), Some("second opinion"));
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn generate_routes_through_primary_without_overrides() {
        let primary = StubProvider::ok("stage text");
        let gw = gateway(primary.clone(), None);
        let text = gw
            .generate(StageId::Research, "sys", "user")
            .await
            .unwrap();
        assert_eq!(text, "stage text");
        assert_eq!(primary.calls(), 1);
    }
}
