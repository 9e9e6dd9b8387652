//! Shared types, error model, and configuration for draftpilot.
//!
//! This crate is the foundation depended on by all other draftpilot crates.
//! It provides:
//! - [`DraftPilotError`] — the unified error type
//! - Domain types ([`Article`], [`ArticleId`], [`StageId`], [`QualityScores`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GenerationConfig, PlagiarismConfig, ProvidersConfig, RefinementConfig,
    StageOverride, ThresholdsConfig, config_dir, config_file_path, credential_for, init_config,
    load_config, load_config_from, validate_credentials,
};
pub use error::{DraftPilotError, Result, is_auth_or_quota};
pub use types::{
    Article, ArticleId, ArticleStatus, ArticleTemplate, ErrorLogEntry, QualityScores,
    StageErrorDetail, StageId, WorkflowLogEntry, WorkflowStatus,
};
