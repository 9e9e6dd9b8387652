//! Application configuration for draftpilot.
//!
//! User config lives at `~/.draftpilot/draftpilot.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Configuration is resolved once, at orchestrator construction, into one
//! immutable value passed to every component. No component re-reads config
//! mid-run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DraftPilotError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "draftpilot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".draftpilot";

// ---------------------------------------------------------------------------
// Config structs (matching draftpilot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Quality thresholds (gates recorded on the article, never fatal).
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    /// SEO refinement loop settings.
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Plagiarism remediation loop settings.
    #[serde(default)]
    pub plagiarism: PlagiarismConfig,

    /// Content generation defaults.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// `[providers]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Preferred primary provider: "openai" or "anthropic".
    #[serde(default = "default_primary")]
    pub primary: String,

    /// Model for the primary provider.
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Universal fallback provider, substituted on auth/quota failures.
    #[serde(default = "default_fallback")]
    pub fallback: String,

    /// Model for the fallback provider.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Optional secondary provider, used only for cross-validation in
    /// bias detection. Absence degrades bias scoring to single-model mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,

    /// Model for the secondary provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_model: Option<String>,

    /// Name of the env var holding the OpenAI key (never store the key itself).
    #[serde(default = "default_openai_key_env")]
    pub openai_api_key_env: String,

    /// Name of the env var holding the Anthropic key.
    #[serde(default = "default_anthropic_key_env")]
    pub anthropic_api_key_env: String,

    /// Optional OpenAI-compatible endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_base_url: Option<String>,

    /// Optional Anthropic endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_base_url: Option<String>,

    /// Per-stage provider/model overrides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stage_overrides: Vec<StageOverride>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            primary_model: default_primary_model(),
            fallback: default_fallback(),
            fallback_model: default_fallback_model(),
            secondary: None,
            secondary_model: None,
            openai_api_key_env: default_openai_key_env(),
            anthropic_api_key_env: default_anthropic_key_env(),
            openai_base_url: None,
            anthropic_base_url: None,
            stage_overrides: Vec::new(),
        }
    }
}

fn default_primary() -> String {
    "anthropic".into()
}
fn default_primary_model() -> String {
    "claude-3-5-sonnet-latest".into()
}
fn default_fallback() -> String {
    "openai".into()
}
fn default_fallback_model() -> String {
    "gpt-4o-mini".into()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}

/// `[[providers.stage_overrides]]` entry — route one stage to a different
/// provider/model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOverride {
    /// Stage name (snake_case, e.g. "humanization").
    pub stage: String,
    /// Provider kind for this stage.
    pub provider: String,
    /// Model for this stage.
    pub model: String,
}

/// `[thresholds]` section. All scores are 0–100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Maximum acceptable bias score.
    #[serde(default = "default_max_bias")]
    pub max_bias: f64,

    /// Maximum acceptable plagiarism percentage.
    #[serde(default = "default_max_plagiarism")]
    pub max_plagiarism: f64,

    /// Minimum acceptable SEO score.
    #[serde(default = "default_min_seo")]
    pub min_seo: f64,

    /// Minimum acceptable fact-check score.
    #[serde(default = "default_min_fact_check")]
    pub min_fact_check: f64,

    /// Minimum acceptable readability score.
    #[serde(default = "default_min_readability")]
    pub min_readability: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            max_bias: default_max_bias(),
            max_plagiarism: default_max_plagiarism(),
            min_seo: default_min_seo(),
            min_fact_check: default_min_fact_check(),
            min_readability: default_min_readability(),
        }
    }
}

fn default_max_bias() -> f64 {
    30.0
}
fn default_max_plagiarism() -> f64 {
    5.0
}
fn default_min_seo() -> f64 {
    75.0
}
fn default_min_fact_check() -> f64 {
    70.0
}
fn default_min_readability() -> f64 {
    60.0
}

/// `[refinement]` section — the SEO refinement loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Whether the refinement loop runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SEO score the loop tries to reach.
    #[serde(default = "default_target_seo")]
    pub target_seo_score: f64,

    /// Maximum refinement attempts.
    #[serde(default = "default_refine_retries")]
    pub max_retries: u32,

    /// Stages re-executed with the refinement instruction, in order.
    #[serde(default = "default_rewrite_stages")]
    pub rewrite_stages: Vec<String>,

    /// Delta-report metrics in priority order.
    #[serde(default = "default_priorities")]
    pub priorities: Vec<String>,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_seo_score: default_target_seo(),
            max_retries: default_refine_retries(),
            rewrite_stages: default_rewrite_stages(),
            priorities: default_priorities(),
        }
    }
}

fn default_target_seo() -> f64 {
    80.0
}
fn default_refine_retries() -> u32 {
    2
}
fn default_rewrite_stages() -> Vec<String> {
    vec!["content_generation".into(), "humanization".into()]
}
fn default_priorities() -> Vec<String> {
    vec![
        "keyword_density".into(),
        "readability".into(),
        "title_length".into(),
        "meta_description_length".into(),
        "content_length".into(),
    ]
}

/// `[plagiarism]` section — the remediation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlagiarismConfig {
    /// Whether plagiarism checking runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Score above which the article is considered plagiarized (percent).
    #[serde(default = "default_max_plagiarism")]
    pub threshold_percent: f64,

    /// Whether to auto-rewrite flagged content.
    #[serde(default = "default_true")]
    pub auto_rewrite: bool,

    /// Maximum rewrite attempts.
    #[serde(default = "default_plagiarism_retries")]
    pub max_retries: u32,

    /// Rewrite strategy: "matched-sections" or "full-article".
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

impl Default for PlagiarismConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_percent: default_max_plagiarism(),
            auto_rewrite: true,
            max_retries: default_plagiarism_retries(),
            strategy: default_strategy(),
        }
    }
}

fn default_plagiarism_retries() -> u32 {
    3
}
fn default_strategy() -> String {
    "matched-sections".into()
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Default target word count for queued articles.
    #[serde(default = "default_target_words")]
    pub default_target_words: u32,

    /// Per-request timeout for provider calls, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_target_words: default_target_words(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_target_words() -> u32 {
    1500
}
fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.draftpilot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DraftPilotError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.draftpilot/draftpilot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DraftPilotError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DraftPilotError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DraftPilotError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DraftPilotError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DraftPilotError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Look up a provider credential by the env-var name stored in config.
/// Returns `None` when unset or empty.
pub fn credential_for(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Check that at least one provider credential is available.
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    let openai = credential_for(&config.providers.openai_api_key_env);
    let anthropic = credential_for(&config.providers.anthropic_api_key_env);

    if openai.is_none() && anthropic.is_none() {
        return Err(DraftPilotError::config(format!(
            "no provider credential found. Set {} or {}.",
            config.providers.openai_api_key_env, config.providers.anthropic_api_key_env
        )));
    }
    Ok(())
}
