//! Final quality-score aggregation.
//!
//! The overall score is a weighted average over whichever sub-scores are
//! present; absent sub-scores and their weights are excluded and the total
//! is divided by the sum of included weights. The ai-detection, plagiarism,
//! and bias sub-scores are "lower is better" and are inverted (100 − s)
//! before weighting.

use draftpilot_shared::{QualityScores, StageId};

use crate::context::PipelineContext;
use crate::stage::StageOutput;

const W_SEO: f64 = 0.25;
const W_AI: f64 = 0.15;
const W_PLAGIARISM: f64 = 0.20;
const W_BIAS: f64 = 0.15;
const W_FACT: f64 = 0.15;
const W_READABILITY: f64 = 0.10;

/// Weighted overall score, or `None` when no sub-score is present.
pub fn aggregate(scores: &QualityScores) -> Option<f64> {
    let mut total = 0.0;
    let mut weight_sum = 0.0;

    let mut add = |value: Option<f64>, weight: f64, inverted: bool| {
        if let Some(v) = value {
            let v = if inverted { 100.0 - v } else { v };
            total += v.clamp(0.0, 100.0) * weight;
            weight_sum += weight;
        }
    };

    add(scores.seo, W_SEO, false);
    add(scores.ai_detection, W_AI, true);
    add(scores.plagiarism, W_PLAGIARISM, true);
    add(scores.bias, W_BIAS, true);
    add(scores.fact_check, W_FACT, false);
    add(scores.readability, W_READABILITY, false);

    if weight_sum == 0.0 {
        None
    } else {
        Some(total / weight_sum)
    }
}

/// Collect the sub-scores recorded in the context by the analysis stages.
/// The plagiarism sub-score is included only when a check actually ran.
pub fn collect(ctx: &PipelineContext) -> QualityScores {
    let mut scores = QualityScores::default();

    if let Some(StageOutput::SeoOptimization { analysis, .. }) = ctx.get(StageId::SeoOptimization) {
        scores.seo = Some(analysis.score);
    }
    if let Some(StageOutput::AiDetection(report)) = ctx.get(StageId::AiDetection) {
        scores.ai_detection = Some(report.score);
    }
    if let Some(StageOutput::PlagiarismCheck(outcome)) = ctx.get(StageId::PlagiarismCheck) {
        if outcome.checked {
            scores.plagiarism = Some(outcome.score_percent);
        }
    }
    if let Some(StageOutput::BiasDetection(report)) = ctx.get(StageId::BiasDetection) {
        scores.bias = Some(report.score);
    }
    if let Some(StageOutput::FactVerification(report)) = ctx.get(StageId::FactVerification) {
        scores.fact_check = Some(report.score);
    }
    if let Some(StageOutput::ReadabilityCheck { score, .. }) = ctx.get(StageId::ReadabilityCheck) {
        scores.readability = Some(*score);
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_average_with_inversions() {
        let scores = QualityScores {
            seo: Some(80.0),
            ai_detection: Some(30.0),
            plagiarism: Some(2.0),
            bias: Some(10.0),
            fact_check: Some(90.0),
            readability: Some(70.0),
            overall: None,
        };
        // 80*.25 + 70*.15 + 98*.20 + 90*.15 + 90*.15 + 70*.10, all weights present.
        let expected = 80.0 * 0.25
            + (100.0 - 30.0) * 0.15
            + (100.0 - 2.0) * 0.20
            + (100.0 - 10.0) * 0.15
            + 90.0 * 0.15
            + 70.0 * 0.10;
        let overall = aggregate(&scores).expect("all sub-scores present");
        assert!((overall - expected).abs() < 1e-9);
        assert!((overall - 84.1).abs() < 1e-9);
    }

    #[test]
    fn absent_sub_scores_are_excluded_not_zeroed() {
        let scores = QualityScores {
            seo: Some(80.0),
            readability: Some(60.0),
            ..QualityScores::default()
        };
        // (80*.25 + 60*.10) / .35
        let overall = aggregate(&scores).unwrap();
        let expected = (80.0 * 0.25 + 60.0 * 0.10) / 0.35;
        assert!((overall - expected).abs() < 1e-9);
    }

    #[test]
    fn no_sub_scores_means_no_overall() {
        assert!(aggregate(&QualityScores::default()).is_none());
    }

    #[test]
    fn overall_stays_in_range() {
        let scores = QualityScores {
            seo: Some(100.0),
            ai_detection: Some(0.0),
            plagiarism: Some(0.0),
            bias: Some(0.0),
            fact_check: Some(100.0),
            readability: Some(100.0),
            overall: None,
        };
        assert!((aggregate(&scores).unwrap() - 100.0).abs() < 1e-9);

        let scores = QualityScores {
            seo: Some(0.0),
            ai_detection: Some(100.0),
            plagiarism: Some(100.0),
            bias: Some(100.0),
            fact_check: Some(0.0),
            readability: Some(0.0),
            overall: None,
        };
        assert_eq!(aggregate(&scores).unwrap(), 0.0);
    }

    #[test]
    fn collect_skips_unchecked_plagiarism() {
        use crate::remediate::RemediationOutcome;
        use draftpilot_shared::{Article, ArticleTemplate};

        let article = Article::queued("test", ArticleTemplate::News, 800);
        let mut ctx = PipelineContext::for_article(&article);
        ctx.insert(StageOutput::PlagiarismCheck(RemediationOutcome::skipped()))
            .unwrap();

        let scores = collect(&ctx);
        assert!(scores.plagiarism.is_none());
    }
}
