//! Stage contract and the closed set of stage outputs.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use draftpilot_llm::TextGenerator;
use draftpilot_quality::{
    AiDetectionReport, BiasReport, FactCheckReport, PerspectiveReport, QualityToolset, SeoAnalysis,
};
use draftpilot_shared::{AppConfig, Article, QualityScores, Result, StageId};

use crate::context::PipelineContext;
use crate::remediate::RemediationOutcome;

/// Collaborators handed to every stage: the LLM seam, the quality adapters,
/// and the resolved configuration.
#[derive(Clone)]
pub struct StageDeps {
    pub generator: Arc<dyn TextGenerator>,
    pub quality: QualityToolset,
    pub config: AppConfig,
}

/// One named, ordered transform in the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    async fn execute(
        &self,
        article: &Article,
        ctx: &PipelineContext,
        deps: &StageDeps,
    ) -> Result<StageOutput>;
}

/// The closed set of stage results — one typed variant per stage, keyed in
/// the context by the stage that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageOutput {
    KeywordAnalysis {
        focus_keyword: String,
        related_keywords: Vec<String>,
        search_intent: String,
    },
    Research {
        findings: Vec<String>,
        sources: Vec<String>,
    },
    Outline {
        title: String,
        sections: Vec<String>,
    },
    ContentGeneration {
        content: String,
        word_count: usize,
    },
    Humanization {
        content: String,
        word_count: usize,
    },
    AiDetection(AiDetectionReport),
    PlagiarismCheck(RemediationOutcome),
    BiasDetection(BiasReport),
    FactVerification(FactCheckReport),
    PerspectiveAnalysis(PerspectiveReport),
    SeoOptimization {
        analysis: SeoAnalysis,
        /// Whether the refinement loop rewrote content after the initial pass.
        refined: bool,
    },
    MetaGeneration {
        meta_title: String,
        meta_description: String,
        slug: String,
    },
    ReadabilityCheck {
        score: f64,
        avg_sentence_length: f64,
    },
    Finalization {
        scores: QualityScores,
    },
}

impl StageOutput {
    /// The stage that produces this output variant.
    pub fn stage(&self) -> StageId {
        match self {
            Self::KeywordAnalysis { .. } => StageId::KeywordAnalysis,
            Self::Research { .. } => StageId::Research,
            Self::Outline { .. } => StageId::Outline,
            Self::ContentGeneration { .. } => StageId::ContentGeneration,
            Self::Humanization { .. } => StageId::Humanization,
            Self::AiDetection(_) => StageId::AiDetection,
            Self::PlagiarismCheck(_) => StageId::PlagiarismCheck,
            Self::BiasDetection(_) => StageId::BiasDetection,
            Self::FactVerification(_) => StageId::FactVerification,
            Self::PerspectiveAnalysis(_) => StageId::PerspectiveAnalysis,
            Self::SeoOptimization { .. } => StageId::SeoOptimization,
            Self::MetaGeneration { .. } => StageId::MetaGeneration,
            Self::ReadabilityCheck { .. } => StageId::ReadabilityCheck,
            Self::Finalization { .. } => StageId::Finalization,
        }
    }
}
