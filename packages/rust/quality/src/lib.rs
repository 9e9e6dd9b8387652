//! Quality tool adapters for draftpilot.
//!
//! Each tool is a dyn trait with one `analyze` call taking the draft text
//! (plus title/keyword where relevant) and returning a structured report.
//! The adapters hold no shared state; the pipeline treats their gate
//! failures as data, never as run failures.
//!
//! The built-in [`heuristic`] implementations are deterministic local
//! analyzers. They are the default wiring and the substrate for tests;
//! external HTTP-backed checkers can be swapped in behind the same traits.

pub mod heuristic;
pub mod report;

use std::sync::Arc;

use async_trait::async_trait;
use draftpilot_shared::Result;

pub use report::{
    AiDetectionReport, BiasReport, FactCheckReport, PerspectiveReport, PlagiarismMatch,
    PlagiarismReport, SeoAnalysis,
};

/// SEO scoring over the draft, its title and meta description.
#[async_trait]
pub trait SeoAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        content: &str,
        title: &str,
        meta_description: &str,
        keyword: &str,
    ) -> Result<SeoAnalysis>;
}

/// Plagiarism detection against existing sources.
#[async_trait]
pub trait PlagiarismChecker: Send + Sync {
    async fn analyze(&self, content: &str, title: &str) -> Result<PlagiarismReport>;
}

/// Bias scoring. Lower is better.
#[async_trait]
pub trait BiasDetector: Send + Sync {
    async fn analyze(&self, content: &str, title: &str) -> Result<BiasReport>;
}

/// Claim/citation verification.
#[async_trait]
pub trait FactChecker: Send + Sync {
    async fn analyze(&self, content: &str, title: &str) -> Result<FactCheckReport>;
}

/// AI-generated-text likelihood. Lower is better.
#[async_trait]
pub trait AiDetector: Send + Sync {
    async fn analyze(&self, content: &str) -> Result<AiDetectionReport>;
}

/// Viewpoint coverage analysis.
#[async_trait]
pub trait PerspectiveAnalyzer: Send + Sync {
    async fn analyze(&self, content: &str, title: &str) -> Result<PerspectiveReport>;
}

/// The full set of quality adapters handed to the pipeline.
#[derive(Clone)]
pub struct QualityToolset {
    pub seo: Arc<dyn SeoAnalyzer>,
    pub plagiarism: Arc<dyn PlagiarismChecker>,
    pub bias: Arc<dyn BiasDetector>,
    pub fact: Arc<dyn FactChecker>,
    pub ai: Arc<dyn AiDetector>,
    pub perspective: Arc<dyn PerspectiveAnalyzer>,
}

impl QualityToolset {
    /// Toolset backed entirely by the built-in heuristic analyzers.
    pub fn heuristic() -> Self {
        Self {
            seo: Arc::new(heuristic::HeuristicSeoAnalyzer::default()),
            plagiarism: Arc::new(heuristic::HeuristicPlagiarismChecker),
            bias: Arc::new(heuristic::HeuristicBiasDetector::default()),
            fact: Arc::new(heuristic::HeuristicFactChecker::default()),
            ai: Arc::new(heuristic::HeuristicAiDetector),
            perspective: Arc::new(heuristic::HeuristicPerspectiveAnalyzer::default()),
        }
    }
}
