//! Plagiarism remediation loop.
//!
//! Runs inside the plagiarism-check stage; its outcome *is* that stage's
//! result. Bounded by `max_retries` total checks (the initial check counts
//! as the first attempt). A failed remediation is a quality-gate failure
//! recorded in the outcome, never a run failure.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use draftpilot_quality::PlagiarismMatch;
use draftpilot_shared::{Result, StageId};

use crate::context::PipelineContext;
use crate::prompts;
use crate::stage::StageDeps;

/// Result of the plagiarism check + remediation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationOutcome {
    /// Last measured plagiarism percentage.
    pub score_percent: f64,
    /// Whether the article ended at or below the threshold.
    pub passed: bool,
    /// Whether a check actually ran (false when disabled by config).
    pub checked: bool,
    /// Whether a rewrite was committed.
    pub rewritten: bool,
    /// Total checks performed, including the initial one.
    pub attempts: u32,
    /// Set when rewrites were exhausted without passing.
    #[serde(default)]
    pub rewrite_failed: bool,
    /// Flagged sections from the last failing check.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<PlagiarismMatch>,
    /// The committed rewrite, when one passed. Downstream stages read the
    /// draft through the context, which prefers this text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten_content: Option<String>,
}

impl RemediationOutcome {
    /// Outcome for a run where plagiarism checking is disabled.
    pub fn skipped() -> Self {
        Self {
            score_percent: 0.0,
            passed: true,
            checked: false,
            rewritten: false,
            attempts: 0,
            rewrite_failed: false,
            matches: Vec::new(),
            rewritten_content: None,
        }
    }
}

/// Check the current draft and, when configured, rewrite until it passes
/// or retries are exhausted.
pub async fn remediate(ctx: &PipelineContext, deps: &StageDeps) -> Result<RemediationOutcome> {
    let config = &deps.config.plagiarism;
    if !config.enabled {
        debug!("plagiarism checking disabled");
        return Ok(RemediationOutcome::skipped());
    }

    let threshold = config.threshold_percent;
    let title = ctx.title().to_string();
    let mut content = ctx.content().to_string();

    let mut report = deps.quality.plagiarism.analyze(&content, &title).await?;
    let mut attempts: u32 = 1;

    if report.score_percent <= threshold {
        return Ok(RemediationOutcome {
            score_percent: report.score_percent,
            passed: true,
            checked: true,
            rewritten: false,
            attempts,
            rewrite_failed: false,
            matches: Vec::new(),
            rewritten_content: None,
        });
    }

    if !config.auto_rewrite {
        info!(
            score = report.score_percent,
            threshold, "plagiarism above threshold, auto-rewrite disabled"
        );
        return Ok(RemediationOutcome {
            score_percent: report.score_percent,
            passed: false,
            checked: true,
            rewritten: false,
            attempts,
            rewrite_failed: false,
            matches: report.matches,
            rewritten_content: None,
        });
    }

    let full_article = config.strategy == "full-article";

    while attempts < config.max_retries {
        debug!(
            attempt = attempts,
            score = report.score_percent,
            "rewriting flagged content"
        );
        let (system, user) = prompts::plagiarism_rewrite(&content, &report.matches, full_article);
        content = deps
            .generator
            .generate(StageId::PlagiarismCheck, &system, &user)
            .await?;

        report = deps.quality.plagiarism.analyze(&content, &title).await?;
        attempts += 1;

        if report.score_percent <= threshold {
            info!(
                score = report.score_percent,
                attempts, "plagiarism remediated"
            );
            return Ok(RemediationOutcome {
                score_percent: report.score_percent,
                passed: true,
                checked: true,
                rewritten: true,
                attempts,
                rewrite_failed: false,
                matches: Vec::new(),
                rewritten_content: Some(content),
            });
        }
    }

    warn!(
        score = report.score_percent,
        attempts, "plagiarism rewrites exhausted without passing"
    );
    Ok(RemediationOutcome {
        score_percent: report.score_percent,
        passed: false,
        checked: true,
        rewritten: false,
        attempts,
        rewrite_failed: true,
        matches: report.matches,
        rewritten_content: None,
    })
}
