//! Error types for draftpilot.
//!
//! Library crates use [`DraftPilotError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.
//!
//! Quality-gate failures (bias too high, plagiarism above threshold after
//! remediation, SEO below target) are *not* errors — they are recorded as
//! sub-scores on the article and the run completes to review.

use std::path::PathBuf;

/// Top-level error type for all draftpilot operations.
#[derive(Debug, thiserror::Error)]
pub enum DraftPilotError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// A language-model provider call or construction failed.
    #[error("provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// An LLM response that failed structured parsing. The stage that hit
    /// this degrades to a typed default result; the error is recorded in
    /// the workflow log, never propagated as a run failure.
    #[error("malformed response in {stage}: {message}")]
    MalformedResponse { stage: String, message: String },

    /// Fatal stage failure — halts the pipeline run.
    #[error("stage {stage} failed: {message}")]
    Stage { stage: String, message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Data validation error (unknown article, bad patch, invalid state).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DraftPilotError>;

/// Message signatures that identify an auth/quota/rate-limit provider
/// failure. Matched case-insensitively as substrings.
const AUTH_OR_QUOTA_SIGNATURES: &[&str] = &[
    "expired",
    "invalid",
    "quota",
    "rate limit",
    "429",
    "403",
    "401",
];

/// Classify an error message as an auth/quota/rate-limit failure.
///
/// The gateway uses this to decide whether a single fallback-provider
/// substitution is warranted.
pub fn is_auth_or_quota(message: &str) -> bool {
    let lower = message.to_lowercase();
    AUTH_OR_QUOTA_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

impl DraftPilotError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a fatal stage error.
    pub fn stage(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable kind tag, recorded in workflow log entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Network(_) => "network",
            Self::Provider { .. } => "provider",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Stage { .. } => "stage",
            Self::Storage(_) => "storage",
            Self::Validation { .. } => "validation",
            Self::Io { .. } => "io",
        }
    }

    /// Whether this error matches the auth/quota fallback signatures.
    pub fn is_auth_or_quota(&self) -> bool {
        match self {
            Self::Provider { message, .. } => is_auth_or_quota(message),
            Self::Network(message) => is_auth_or_quota(message),
            _ => false,
        }
    }
}
