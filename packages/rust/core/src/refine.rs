//! SEO refinement loop.
//!
//! Evaluated once, right after the seo_optimization stage. An explicit
//! iterative loop with an attempt counter: build a delta report against the
//! configured targets, turn it into a rewrite instruction, re-execute the
//! configured rewrite stages, then re-run the SEO analysis. Stops when the
//! target score is reached or attempts are exhausted. Never fatal — a
//! sub-stage failure is logged and that target is skipped for the attempt.

use tracing::{debug, info, warn};

use draftpilot_quality::SeoAnalysis;
use draftpilot_shared::{Article, StageId};

use crate::context::PipelineContext;
use crate::stage::{StageDeps, StageOutput};
use crate::stages;

/// Healthy keyword-density band, percent of total words.
const DENSITY_BAND: (f64, f64) = (0.8, 2.5);
/// Healthy title length band, characters.
const TITLE_BAND: (usize, usize) = (30, 65);
/// Healthy meta-description band, characters.
const META_BAND: (usize, usize) = (120, 160);
/// Issues/improvements carried into the instruction, each.
const MAX_LISTED: usize = 5;

/// Run the refinement loop against the current context. Updates the
/// `content_generation` / `humanization` / `seo_optimization` keys in place.
pub async fn refine(article: &Article, ctx: &mut PipelineContext, deps: &StageDeps) {
    let config = &deps.config.refinement;
    if !config.enabled || config.max_retries == 0 {
        debug!("seo refinement disabled");
        return;
    }

    let Some(StageOutput::SeoOptimization { analysis, .. }) = ctx.get(StageId::SeoOptimization)
    else {
        return;
    };
    let mut current = analysis.clone();
    if current.score >= config.target_seo_score {
        debug!(score = current.score, "seo already at target, skipping refinement");
        return;
    }

    let mut attempt: u32 = 0;
    loop {
        info!(
            attempt,
            score = current.score,
            target = config.target_seo_score,
            "refining for seo"
        );
        let instruction = build_instruction(&current, ctx, deps);
        ctx.set_refinement_instruction(instruction);

        for name in &deps.config.refinement.rewrite_stages {
            let Some(id) = StageId::parse(name) else {
                warn!(stage = %name, "ignoring unknown rewrite stage");
                continue;
            };
            let stage = stages::stage_for(id);
            match stage.execute(article, ctx, deps).await {
                Ok(output) => {
                    if let Err(e) = ctx.insert(output) {
                        warn!(stage = %id, error = %e, "could not merge rewrite output");
                    }
                }
                // The previous value for this key is untouched; move on to
                // the next rewrite target.
                Err(e) => warn!(stage = %id, error = %e, "rewrite sub-stage failed, keeping previous draft"),
            }
        }
        ctx.clear_refinement_instruction();

        match stages::stage_for(StageId::SeoOptimization)
            .execute(article, ctx, deps)
            .await
        {
            Ok(StageOutput::SeoOptimization { analysis, .. }) => {
                current = analysis.clone();
                if let Err(e) = ctx.insert(StageOutput::SeoOptimization {
                    analysis,
                    refined: true,
                }) {
                    warn!(error = %e, "could not merge refined seo analysis");
                }
            }
            Ok(_) | Err(_) => {
                warn!("seo re-analysis failed, stopping refinement");
                return;
            }
        }

        if current.score >= config.target_seo_score {
            info!(score = current.score, attempts = attempt + 1, "seo target reached");
            return;
        }
        if attempt + 1 >= config.max_retries {
            info!(
                score = current.score,
                attempts = attempt + 1,
                "seo refinement exhausted below target"
            );
            return;
        }
        attempt += 1;
    }
}

/// Natural-language rewrite instruction from the delta report plus the
/// analyzer's outstanding issues and improvements.
fn build_instruction(analysis: &SeoAnalysis, ctx: &PipelineContext, deps: &StageDeps) -> String {
    let mut lines: Vec<String> = Vec::new();

    for priority in &deps.config.refinement.priorities {
        match priority.as_str() {
            "keyword_density" => {
                if analysis.keyword_density < DENSITY_BAND.0 || analysis.keyword_density > DENSITY_BAND.1 {
                    lines.push(format!(
                        "Adjust focus-keyword density from {:.2}% into the {:.1}–{:.1}% range.",
                        analysis.keyword_density, DENSITY_BAND.0, DENSITY_BAND.1
                    ));
                }
            }
            "readability" => {
                let min = deps.config.thresholds.min_readability;
                if analysis.readability < min {
                    lines.push(format!(
                        "Raise readability from {:.0} to at least {min:.0}: shorter sentences, simpler words.",
                        analysis.readability
                    ));
                }
            }
            "title_length" => {
                if analysis.title_length < TITLE_BAND.0 || analysis.title_length > TITLE_BAND.1 {
                    lines.push(format!(
                        "Adjust the title from {} characters into the {}–{} range.",
                        analysis.title_length, TITLE_BAND.0, TITLE_BAND.1
                    ));
                }
            }
            "meta_description_length" => {
                if analysis.meta_description_length < META_BAND.0
                    || analysis.meta_description_length > META_BAND.1
                {
                    lines.push(format!(
                        "Adjust the meta description from {} characters into the {}–{} range.",
                        analysis.meta_description_length, META_BAND.0, META_BAND.1
                    ));
                }
            }
            "content_length" => {
                let target = ctx.target_words() as usize;
                if analysis.content_length < target {
                    lines.push(format!(
                        "Expand the article from {} words toward the {target}-word target.",
                        analysis.content_length
                    ));
                }
            }
            other => debug!(priority = %other, "ignoring unknown refinement priority"),
        }
    }

    let mut instruction = String::from("Improve the article's SEO without changing its topic.\n");
    for line in &lines {
        instruction.push_str("- ");
        instruction.push_str(line);
        instruction.push('\n');
    }
    if !analysis.issues.is_empty() {
        instruction.push_str("Outstanding issues:\n");
        for issue in analysis.issues.iter().take(MAX_LISTED) {
            instruction.push_str(&format!("- {issue}\n"));
        }
    }
    if !analysis.improvements.is_empty() {
        instruction.push_str("Suggested improvements:\n");
        for improvement in analysis.improvements.iter().take(MAX_LISTED) {
            instruction.push_str(&format!("- {improvement}\n"));
        }
    }
    instruction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        deps_with_seo, sample_article, sample_context, ScriptedGenerator, ScriptedSeo,
    };

    fn context_with_draft_and_analysis(score: f64) -> PipelineContext {
        let mut ctx = sample_context();
        ctx.insert(StageOutput::ContentGeneration {
            content: "the first draft".into(),
            word_count: 3,
        })
        .unwrap();
        ctx.insert(StageOutput::SeoOptimization {
            analysis: SeoAnalysis {
                score,
                keyword_density: 0.4,
                readability: 50.0,
                title_length: 20,
                meta_description_length: 40,
                content_length: 3,
                issues: vec!["low density".into()],
                improvements: vec!["add the keyword to the intro".into()],
            },
            refined: false,
        })
        .unwrap();
        ctx
    }

    #[tokio::test]
    async fn recheck_runs_at_most_max_retries_times() {
        let seo = ScriptedSeo::with_scores(&[55.0, 60.0, 65.0, 70.0]);
        let generator = ScriptedGenerator::always("a slightly better draft");
        let mut deps = deps_with_seo(seo.clone(), generator);
        deps.config.refinement.target_seo_score = 80.0;
        deps.config.refinement.max_retries = 2;

        let article = sample_article();
        let mut ctx = context_with_draft_and_analysis(50.0);
        refine(&article, &mut ctx, &deps).await;

        assert_eq!(seo.calls(), 2);
        match ctx.get(StageId::SeoOptimization) {
            Some(StageOutput::SeoOptimization { analysis, refined }) => {
                assert!(*refined);
                assert_eq!(analysis.score, 60.0);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stops_early_once_target_is_reached() {
        let seo = ScriptedSeo::with_scores(&[85.0]);
        let generator = ScriptedGenerator::always("a much better draft");
        let mut deps = deps_with_seo(seo.clone(), generator);
        deps.config.refinement.target_seo_score = 80.0;
        deps.config.refinement.max_retries = 5;

        let article = sample_article();
        let mut ctx = context_with_draft_and_analysis(50.0);
        refine(&article, &mut ctx, &deps).await;

        assert_eq!(seo.calls(), 1);
    }

    #[tokio::test]
    async fn skips_when_already_at_target() {
        let seo = ScriptedSeo::with_scores(&[10.0]);
        let generator = ScriptedGenerator::always("unused");
        let deps = deps_with_seo(seo.clone(), generator.clone());

        let article = sample_article();
        let mut ctx = context_with_draft_and_analysis(92.0);
        refine(&article, &mut ctx, &deps).await;

        assert_eq!(seo.calls(), 0);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let seo = ScriptedSeo::with_scores(&[90.0]);
        let generator = ScriptedGenerator::always("unused");
        let mut deps = deps_with_seo(seo.clone(), generator.clone());
        deps.config.refinement.enabled = false;

        let article = sample_article();
        let mut ctx = context_with_draft_and_analysis(10.0);
        refine(&article, &mut ctx, &deps).await;

        assert_eq!(seo.calls(), 0);
    }

    #[tokio::test]
    async fn rewrite_prompts_carry_the_instruction_and_slot_is_cleared() {
        let seo = ScriptedSeo::with_scores(&[85.0]);
        let generator = ScriptedGenerator::always("rewritten draft");
        let mut deps = deps_with_seo(seo, generator.clone());
        deps.config.refinement.target_seo_score = 80.0;

        let article = sample_article();
        let mut ctx = context_with_draft_and_analysis(50.0);
        refine(&article, &mut ctx, &deps).await;

        let prompts = generator.prompts();
        assert!(!prompts.is_empty());
        assert!(prompts
            .iter()
            .any(|(_, user)| user.contains("Refinement instruction")));
        assert!(prompts.iter().any(|(_, user)| user.contains("low density")));
        assert!(ctx.refinement_instruction().is_none());
    }

    #[tokio::test]
    async fn refined_draft_replaces_a_committed_plagiarism_rewrite() {
        let seo = ScriptedSeo::with_scores(&[85.0]);
        let generator = ScriptedGenerator::always("a freshly refined draft body");
        let mut deps = deps_with_seo(seo, generator);
        deps.config.refinement.target_seo_score = 80.0;

        let article = sample_article();
        let mut ctx = context_with_draft_and_analysis(50.0);
        ctx.insert(StageOutput::PlagiarismCheck(
            crate::remediate::RemediationOutcome {
                rewritten_content: Some("the stale remediated text".into()),
                ..crate::remediate::RemediationOutcome::skipped()
            },
        ))
        .unwrap();
        assert_eq!(ctx.content(), "the stale remediated text");

        refine(&article, &mut ctx, &deps).await;

        // Downstream readers see the refined draft, not the stale rewrite,
        // and the re-analysis measured the refined draft too.
        assert_eq!(ctx.content(), "a freshly refined draft body");
        match ctx.get(StageId::SeoOptimization) {
            Some(StageOutput::SeoOptimization { analysis, refined }) => {
                assert!(*refined);
                assert_eq!(analysis.content_length, 5);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn instruction_lists_only_out_of_band_metrics() {
        let deps = deps_with_seo(
            ScriptedSeo::with_scores(&[50.0]),
            ScriptedGenerator::always("x"),
        );
        let ctx = sample_context();
        let analysis = SeoAnalysis {
            score: 50.0,
            keyword_density: 1.5, // in band
            readability: 40.0,    // below min
            title_length: 50,     // in band
            meta_description_length: 40, // below band
            content_length: 100,  // below target
            issues: vec![],
            improvements: vec![],
        };
        let instruction = build_instruction(&analysis, &ctx, &deps);
        assert!(!instruction.contains("keyword density"));
        assert!(instruction.contains("readability"));
        assert!(instruction.contains("meta description"));
        assert!(instruction.contains("1200-word target"));
    }
}
