//! Shared stubs for the engine, loop, and stage tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use draftpilot_llm::TextGenerator;
use draftpilot_quality::{
    PlagiarismChecker, PlagiarismMatch, PlagiarismReport, QualityToolset, SeoAnalysis, SeoAnalyzer,
};
use draftpilot_shared::{
    AppConfig, Article, ArticleTemplate, DraftPilotError, Result, StageId,
};

use crate::context::PipelineContext;
use crate::stage::StageDeps;

pub fn sample_article() -> Article {
    Article::queued("rust error handling", ArticleTemplate::HowTo, 1200)
}

pub fn sample_context() -> PipelineContext {
    PipelineContext::for_article(&sample_article())
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Text-generator stub: per-stage scripted responses, an optional scripted
/// failure, an optional cross-validation answer, and a record of every
/// prompt it received.
pub struct ScriptedGenerator {
    default_response: String,
    per_stage: HashMap<StageId, String>,
    fail_for: Option<(StageId, String)>,
    cross_validation: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(StageId, String)>>,
}

impl ScriptedGenerator {
    pub fn always(response: &str) -> Arc<Self> {
        Arc::new(Self {
            default_response: response.into(),
            per_stage: HashMap::new(),
            fail_for: None,
            cross_validation: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn with_cross_validation(response: &str, secondary: &str) -> Arc<Self> {
        Arc::new(Self {
            default_response: response.into(),
            per_stage: HashMap::new(),
            fail_for: None,
            cross_validation: Some(secondary.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Default response everywhere, except `stage` fails with `message`.
    pub fn failing_for(stage: StageId, message: &str, response: &str) -> Arc<Self> {
        Arc::new(Self {
            default_response: response.into(),
            per_stage: HashMap::new(),
            fail_for: Some((stage, message.into())),
            cross_validation: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Scripted per-stage responses on top of a default.
    pub fn scripted(default: &str, per_stage: HashMap<StageId, String>) -> Arc<Self> {
        Arc::new(Self {
            default_response: default.into(),
            per_stage,
            fail_for: None,
            cross_validation: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts seen so far, with the stage that sent them.
    pub fn prompts(&self) -> Vec<(StageId, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, stage: StageId, _system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push((stage, user.to_string()));
        if let Some((failing, message)) = &self.fail_for {
            if *failing == stage {
                return Err(DraftPilotError::stage(stage.as_str(), message.clone()));
            }
        }
        Ok(self
            .per_stage
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone()))
    }

    async fn cross_validate(&self, _system: &str, _user: &str) -> Result<Option<String>> {
        Ok(self.cross_validation.clone())
    }
}

// ---------------------------------------------------------------------------
// ScriptedPlagiarism
// ---------------------------------------------------------------------------

/// Plagiarism-checker stub returning a fixed sequence of scores; the last
/// score repeats if called more often than scripted.
pub struct ScriptedPlagiarism {
    scores: Vec<f64>,
    calls: AtomicUsize,
}

impl ScriptedPlagiarism {
    pub fn with_scores(scores: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlagiarismChecker for ScriptedPlagiarism {
    async fn analyze(&self, _content: &str, _title: &str) -> Result<PlagiarismReport> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let score = *self
            .scores
            .get(call)
            .or_else(|| self.scores.last())
            .unwrap_or(&0.0);
        Ok(PlagiarismReport {
            score_percent: score,
            matches: vec![PlagiarismMatch {
                excerpt: "a matched excerpt".into(),
                source: "stub source".into(),
            }],
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedSeo
// ---------------------------------------------------------------------------

/// SEO-analyzer stub returning a fixed sequence of scores.
pub struct ScriptedSeo {
    scores: Vec<f64>,
    calls: AtomicUsize,
}

impl ScriptedSeo {
    pub fn with_scores(scores: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeoAnalyzer for ScriptedSeo {
    async fn analyze(
        &self,
        content: &str,
        title: &str,
        meta_description: &str,
        _keyword: &str,
    ) -> Result<SeoAnalysis> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let score = *self
            .scores
            .get(call)
            .or_else(|| self.scores.last())
            .unwrap_or(&0.0);
        Ok(SeoAnalysis {
            score,
            keyword_density: 0.4,
            readability: 55.0,
            title_length: title.len(),
            meta_description_length: meta_description.len(),
            content_length: content.split_whitespace().count(),
            issues: vec!["keyword density below the healthy band".into()],
            improvements: vec!["work the focus keyword into a subheading".into()],
        })
    }
}

// ---------------------------------------------------------------------------
// Deps builders
// ---------------------------------------------------------------------------

pub fn deps_with_generator(generator: Arc<ScriptedGenerator>) -> StageDeps {
    StageDeps {
        generator,
        quality: QualityToolset::heuristic(),
        config: AppConfig::default(),
    }
}

pub fn deps_with(plagiarism: Arc<ScriptedPlagiarism>) -> StageDeps {
    let mut quality = QualityToolset::heuristic();
    quality.plagiarism = plagiarism;
    StageDeps {
        generator: ScriptedGenerator::always("a rewritten draft body"),
        quality,
        config: AppConfig::default(),
    }
}

pub fn deps_with_seo(seo: Arc<ScriptedSeo>, generator: Arc<ScriptedGenerator>) -> StageDeps {
    let mut quality = QualityToolset::heuristic();
    quality.seo = seo;
    StageDeps {
        generator,
        quality,
        config: AppConfig::default(),
    }
}
