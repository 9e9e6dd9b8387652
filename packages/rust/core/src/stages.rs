//! The 14 pipeline stages.
//!
//! LLM-backed stages declare a JSON payload per stage; a response that
//! fails parsing degrades to a typed default result (logged as malformed)
//! rather than failing the stage. Analysis stages call the quality
//! adapters; their gate failures are recorded as data, never raised.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use draftpilot_quality::heuristic::{avg_sentence_length, readability_score, word_count};
use draftpilot_shared::{Article, Result, StageId};

use crate::context::PipelineContext;
use crate::prompts;
use crate::remediate;
use crate::score;
use crate::stage::{Stage, StageDeps, StageOutput};

/// The stage implementation for one stage id.
pub fn stage_for(id: StageId) -> Box<dyn Stage> {
    match id {
        StageId::KeywordAnalysis => Box::new(KeywordAnalysisStage),
        StageId::Research => Box::new(ResearchStage),
        StageId::Outline => Box::new(OutlineStage),
        StageId::ContentGeneration => Box::new(ContentGenerationStage),
        StageId::Humanization => Box::new(HumanizationStage),
        StageId::AiDetection => Box::new(AiDetectionStage),
        StageId::PlagiarismCheck => Box::new(PlagiarismCheckStage),
        StageId::BiasDetection => Box::new(BiasDetectionStage),
        StageId::FactVerification => Box::new(FactVerificationStage),
        StageId::PerspectiveAnalysis => Box::new(PerspectiveAnalysisStage),
        StageId::SeoOptimization => Box::new(SeoOptimizationStage),
        StageId::MetaGeneration => Box::new(MetaGenerationStage),
        StageId::ReadabilityCheck => Box::new(ReadabilityCheckStage),
        StageId::Finalization => Box::new(FinalizationStage),
    }
}

/// All stages in pipeline order.
pub fn all_stages() -> Vec<Box<dyn Stage>> {
    StageId::ALL.iter().map(|id| stage_for(*id)).collect()
}

// ---------------------------------------------------------------------------
// Model-output parsing
// ---------------------------------------------------------------------------

/// Strip a markdown code fence the model may wrap its JSON in.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

/// Parse a stage's declared JSON payload. `None` means the response was
/// malformed; the caller degrades to its typed default.
fn parse_payload<T: DeserializeOwned>(stage: StageId, raw: &str) -> Option<T> {
    match serde_json::from_str(strip_fences(raw)) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(stage = %stage, error = %e, "malformed model response, degrading to default result");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// 1. keyword_analysis
// ---------------------------------------------------------------------------

pub struct KeywordAnalysisStage;

#[derive(Deserialize)]
struct KeywordPayload {
    #[serde(default)]
    focus_keyword: String,
    #[serde(default)]
    related_keywords: Vec<String>,
    #[serde(default)]
    search_intent: String,
}

#[async_trait]
impl Stage for KeywordAnalysisStage {
    fn id(&self) -> StageId {
        StageId::KeywordAnalysis
    }

    async fn execute(
        &self,
        article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let (system, user) = prompts::keyword_analysis(ctx);
        let response = deps.generator.generate(self.id(), &system, &user).await?;

        let payload = parse_payload::<KeywordPayload>(self.id(), &response);
        Ok(match payload {
            Some(p) => StageOutput::KeywordAnalysis {
                focus_keyword: if p.focus_keyword.is_empty() {
                    article.keyword.clone()
                } else {
                    p.focus_keyword
                },
                related_keywords: p.related_keywords,
                search_intent: p.search_intent,
            },
            None => StageOutput::KeywordAnalysis {
                focus_keyword: article.keyword.clone(),
                related_keywords: Vec::new(),
                search_intent: "informational".into(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// 2. research
// ---------------------------------------------------------------------------

pub struct ResearchStage;

#[derive(Deserialize)]
struct ResearchPayload {
    #[serde(default)]
    findings: Vec<String>,
    #[serde(default)]
    sources: Vec<String>,
}

#[async_trait]
impl Stage for ResearchStage {
    fn id(&self) -> StageId {
        StageId::Research
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let (system, user) = prompts::research(ctx);
        let response = deps.generator.generate(self.id(), &system, &user).await?;

        let payload = parse_payload::<ResearchPayload>(self.id(), &response).unwrap_or(
            ResearchPayload {
                findings: Vec::new(),
                sources: Vec::new(),
            },
        );
        Ok(StageOutput::Research {
            findings: payload.findings,
            sources: payload.sources,
        })
    }
}

// ---------------------------------------------------------------------------
// 3. outline
// ---------------------------------------------------------------------------

pub struct OutlineStage;

#[derive(Deserialize)]
struct OutlinePayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    sections: Vec<String>,
}

#[async_trait]
impl Stage for OutlineStage {
    fn id(&self) -> StageId {
        StageId::Outline
    }

    async fn execute(
        &self,
        article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let (system, user) = prompts::outline(ctx);
        let response = deps.generator.generate(self.id(), &system, &user).await?;

        let payload = parse_payload::<OutlinePayload>(self.id(), &response);
        Ok(match payload {
            Some(p) => StageOutput::Outline {
                title: if p.title.is_empty() {
                    article.keyword.clone()
                } else {
                    p.title
                },
                sections: p.sections,
            },
            None => StageOutput::Outline {
                title: article.keyword.clone(),
                sections: Vec::new(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// 4. content_generation / 5. humanization — plain-text transforms
// ---------------------------------------------------------------------------

pub struct ContentGenerationStage;

#[async_trait]
impl Stage for ContentGenerationStage {
    fn id(&self) -> StageId {
        StageId::ContentGeneration
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let (system, user) = prompts::content_generation(ctx);
        let content = deps.generator.generate(self.id(), &system, &user).await?;
        let word_count = word_count(&content);
        debug!(word_count, "draft generated");
        Ok(StageOutput::ContentGeneration {
            content,
            word_count,
        })
    }
}

pub struct HumanizationStage;

#[async_trait]
impl Stage for HumanizationStage {
    fn id(&self) -> StageId {
        StageId::Humanization
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let (system, user) = prompts::humanization(ctx);
        let content = deps.generator.generate(self.id(), &system, &user).await?;
        let word_count = word_count(&content);
        Ok(StageOutput::Humanization {
            content,
            word_count,
        })
    }
}

// ---------------------------------------------------------------------------
// 6. ai_detection
// ---------------------------------------------------------------------------

pub struct AiDetectionStage;

#[async_trait]
impl Stage for AiDetectionStage {
    fn id(&self) -> StageId {
        StageId::AiDetection
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let report = deps.quality.ai.analyze(ctx.content()).await?;
        Ok(StageOutput::AiDetection(report))
    }
}

// ---------------------------------------------------------------------------
// 7. plagiarism_check — hosts the remediation loop
// ---------------------------------------------------------------------------

pub struct PlagiarismCheckStage;

#[async_trait]
impl Stage for PlagiarismCheckStage {
    fn id(&self) -> StageId {
        StageId::PlagiarismCheck
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let outcome = remediate::remediate(ctx, deps).await?;
        Ok(StageOutput::PlagiarismCheck(outcome))
    }
}

// ---------------------------------------------------------------------------
// 8. bias_detection — optional second-model cross-validation
// ---------------------------------------------------------------------------

pub struct BiasDetectionStage;

#[async_trait]
impl Stage for BiasDetectionStage {
    fn id(&self) -> StageId {
        StageId::BiasDetection
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let content = ctx.content();
        let mut report = deps.quality.bias.analyze(content, ctx.title()).await?;

        let (system, user) = prompts::bias_cross_validation(content);
        match deps.generator.cross_validate(&system, &user).await {
            Ok(Some(response)) => {
                if let Some(second) = first_number(&response) {
                    report.score = (report.score + second.clamp(0.0, 100.0)) / 2.0;
                    report.cross_validated = true;
                } else {
                    warn!("cross-validation response had no parsable score, keeping single-model score");
                }
            }
            Ok(None) => debug!("no secondary provider, single-model bias scoring"),
            Err(e) => {
                // Degraded mode, not a stage failure.
                warn!(error = %e, "bias cross-validation call failed, keeping single-model score");
            }
        }

        Ok(StageOutput::BiasDetection(report))
    }
}

/// First numeric token in a model response, e.g. "Score: 42/100" -> 42.0.
fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

// ---------------------------------------------------------------------------
// 9. fact_verification / 10. perspective_analysis
// ---------------------------------------------------------------------------

pub struct FactVerificationStage;

#[async_trait]
impl Stage for FactVerificationStage {
    fn id(&self) -> StageId {
        StageId::FactVerification
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let report = deps.quality.fact.analyze(ctx.content(), ctx.title()).await?;
        Ok(StageOutput::FactVerification(report))
    }
}

pub struct PerspectiveAnalysisStage;

#[async_trait]
impl Stage for PerspectiveAnalysisStage {
    fn id(&self) -> StageId {
        StageId::PerspectiveAnalysis
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let report = deps
            .quality
            .perspective
            .analyze(ctx.content(), ctx.title())
            .await?;
        Ok(StageOutput::PerspectiveAnalysis(report))
    }
}

// ---------------------------------------------------------------------------
// 11. seo_optimization
// ---------------------------------------------------------------------------

pub struct SeoOptimizationStage;

#[async_trait]
impl Stage for SeoOptimizationStage {
    fn id(&self) -> StageId {
        StageId::SeoOptimization
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let analysis = deps
            .quality
            .seo
            .analyze(
                ctx.content(),
                ctx.title(),
                &ctx.meta_description(),
                ctx.focus_keyword(),
            )
            .await?;
        Ok(StageOutput::SeoOptimization {
            analysis,
            refined: false,
        })
    }
}

// ---------------------------------------------------------------------------
// 12. meta_generation
// ---------------------------------------------------------------------------

pub struct MetaGenerationStage;

#[derive(Deserialize)]
struct MetaPayload {
    #[serde(default)]
    meta_title: String,
    #[serde(default)]
    meta_description: String,
    #[serde(default)]
    slug: String,
}

#[async_trait]
impl Stage for MetaGenerationStage {
    fn id(&self) -> StageId {
        StageId::MetaGeneration
    }

    async fn execute(
        &self,
        article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput> {
        let (system, user) = prompts::meta_generation(ctx);
        let response = deps.generator.generate(self.id(), &system, &user).await?;

        let payload = parse_payload::<MetaPayload>(self.id(), &response);
        Ok(match payload {
            Some(p) => StageOutput::MetaGeneration {
                meta_title: if p.meta_title.is_empty() {
                    ctx.title().to_string()
                } else {
                    p.meta_title
                },
                meta_description: if p.meta_description.is_empty() {
                    ctx.meta_description()
                } else {
                    p.meta_description
                },
                slug: if p.slug.is_empty() {
                    slugify(&article.keyword)
                } else {
                    p.slug
                },
            },
            None => StageOutput::MetaGeneration {
                meta_title: ctx.title().to_string(),
                meta_description: ctx.meta_description(),
                slug: slugify(&article.keyword),
            },
        })
    }
}

/// Kebab-case slug from a keyword.
fn slugify(keyword: &str) -> String {
    keyword
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

// ---------------------------------------------------------------------------
// 13. readability_check
// ---------------------------------------------------------------------------

pub struct ReadabilityCheckStage;

#[async_trait]
impl Stage for ReadabilityCheckStage {
    fn id(&self) -> StageId {
        StageId::ReadabilityCheck
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        _deps: &StageDeps,
    ) -> Result<StageOutput> {
        let content = ctx.content();
        Ok(StageOutput::ReadabilityCheck {
            score: readability_score(content),
            avg_sentence_length: avg_sentence_length(content),
        })
    }
}

// ---------------------------------------------------------------------------
// 14. finalization — aggregates the quality scores
// ---------------------------------------------------------------------------

pub struct FinalizationStage;

#[async_trait]
impl Stage for FinalizationStage {
    fn id(&self) -> StageId {
        StageId::Finalization
    }

    async fn execute(
        &self,
        _article: &Article,
        ctx: &PipelineContext,
        _deps: &StageDeps,
    ) -> Result<StageOutput> {
        let mut scores = score::collect(ctx);
        scores.overall = score::aggregate(&scores);
        Ok(StageOutput::Finalization { scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{deps_with_generator, sample_article, sample_context, ScriptedGenerator};

    #[test]
    fn stage_list_matches_pipeline_order() {
        let stages = all_stages();
        assert_eq!(stages.len(), 14);
        for (stage, id) in stages.iter().zip(StageId::ALL) {
            assert_eq!(stage.id(), id);
        }
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn first_number_extraction() {
        assert_eq!(first_number("Score: 42/100"), Some(42.0));
        assert_eq!(first_number("17.5"), Some(17.5));
        assert_eq!(first_number("no digits here"), None);
    }

    #[test]
    fn slugify_keywords() {
        assert_eq!(slugify("Rust Async Traits"), "rust-async-traits");
        assert_eq!(slugify("C++ vs. Rust!"), "c-vs-rust");
    }

    #[tokio::test]
    async fn malformed_keyword_response_degrades_to_default() {
        let generator = ScriptedGenerator::always("this is not json");
        let deps = deps_with_generator(generator);
        let article = sample_article();
        let ctx = sample_context();

        let output = KeywordAnalysisStage
            .execute(&article, &ctx, &deps)
            .await
            .expect("degrades, never fails");
        match output {
            StageOutput::KeywordAnalysis {
                focus_keyword,
                related_keywords,
                search_intent,
            } => {
                assert_eq!(focus_keyword, article.keyword);
                assert!(related_keywords.is_empty());
                assert_eq!(search_intent, "informational");
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn keyword_stage_parses_fenced_json() {
        let generator = ScriptedGenerator::always(
            "```json\n{\"focus_keyword\": \"rust traits\", \
             \"related_keywords\": [\"dyn\", \"impl\"], \"search_intent\": \"informational\"}\n```",
        );
        let deps = deps_with_generator(generator);
        let output = KeywordAnalysisStage
            .execute(&sample_article(), &sample_context(), &deps)
            .await
            .unwrap();
        match output {
            StageOutput::KeywordAnalysis {
                focus_keyword,
                related_keywords,
                ..
            } => {
                assert_eq!(focus_keyword, "rust traits");
                assert_eq!(related_keywords.len(), 2);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bias_stage_averages_cross_validation_score() {
        // Heuristic bias over neutral text scores 0; the secondary says 40.
        let generator = ScriptedGenerator::with_cross_validation("unused", "The score is 40.");
        let deps = deps_with_generator(generator);
        let mut ctx = sample_context();
        ctx.insert(StageOutput::ContentGeneration {
            content: "A plain factual sentence about widgets.".into(),
            word_count: 6,
        })
        .unwrap();

        let output = BiasDetectionStage
            .execute(&sample_article(), &ctx, &deps)
            .await
            .unwrap();
        match output {
            StageOutput::BiasDetection(report) => {
                assert!(report.cross_validated);
                assert!((report.score - 20.0).abs() < 1e-9);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn readability_stage_uses_sentence_heuristic() {
        let mut ctx = sample_context();
        let content = "Short sentence one. Short sentence two. Short sentence three.";
        ctx.insert(StageOutput::ContentGeneration {
            content: content.into(),
            word_count: word_count(content),
        })
        .unwrap();

        let deps = deps_with_generator(ScriptedGenerator::always("unused"));
        let output = ReadabilityCheckStage
            .execute(&sample_article(), &ctx, &deps)
            .await
            .unwrap();
        match output {
            StageOutput::ReadabilityCheck {
                score,
                avg_sentence_length,
            } => {
                assert!(score > 0.0 && score <= 100.0);
                assert!(avg_sentence_length > 0.0);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }
}
