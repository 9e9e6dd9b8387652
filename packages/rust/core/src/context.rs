//! Per-run context accumulator.
//!
//! An ordered map from stage to stage output, seeded from article metadata.
//! Keys appear only after their stage executed. Once written, a key is
//! immutable — except `content_generation`, `humanization`, and
//! `seo_optimization`, which the refinement loop may overwrite in place.
//! Lives for exactly one pipeline run; never persisted wholesale.

use std::collections::BTreeMap;

use draftpilot_shared::{Article, ArticleTemplate, DraftPilotError, Result, StageId};

use crate::stage::StageOutput;

/// Longest provisional meta description derived from content, in characters.
const PROVISIONAL_META_LEN: usize = 160;

/// Stages the refinement loop may overwrite after their first execution.
const REWRITABLE: [StageId; 3] = [
    StageId::ContentGeneration,
    StageId::Humanization,
    StageId::SeoOptimization,
];

/// The accumulating per-run record of all stage outputs.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    keyword: String,
    template: ArticleTemplate,
    target_words: u32,
    outputs: BTreeMap<StageId, StageOutput>,
    refinement_instruction: Option<String>,
}

impl PipelineContext {
    /// Seed a fresh context from the article's metadata.
    pub fn for_article(article: &Article) -> Self {
        Self {
            keyword: article.keyword.clone(),
            template: article.template,
            target_words: article.target_words,
            outputs: BTreeMap::new(),
            refinement_instruction: None,
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn template(&self) -> ArticleTemplate {
        self.template
    }

    pub fn target_words(&self) -> u32 {
        self.target_words
    }

    /// Merge a stage output under its stage's key. Refuses to overwrite an
    /// existing key unless the stage is one of the rewrite targets.
    pub fn insert(&mut self, output: StageOutput) -> Result<()> {
        let stage = output.stage();
        if self.outputs.contains_key(&stage) && !REWRITABLE.contains(&stage) {
            return Err(DraftPilotError::stage(
                stage.as_str(),
                "context key already written and is not a rewrite target",
            ));
        }
        // A fresh draft supersedes a committed plagiarism rewrite, so
        // `content()` follows the newest text rather than the remediated one.
        if matches!(stage, StageId::ContentGeneration | StageId::Humanization) {
            if let Some(StageOutput::PlagiarismCheck(outcome)) =
                self.outputs.get_mut(&StageId::PlagiarismCheck)
            {
                outcome.rewritten_content = None;
            }
        }
        self.outputs.insert(stage, output);
        Ok(())
    }

    pub fn get(&self, stage: StageId) -> Option<&StageOutput> {
        self.outputs.get(&stage)
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.outputs.contains_key(&stage)
    }

    /// Stages executed so far, in pipeline order.
    pub fn executed_stages(&self) -> Vec<StageId> {
        self.outputs.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    // -----------------------------------------------------------------------
    // Derived accessors used by stages and loops
    // -----------------------------------------------------------------------

    /// The focus keyword: keyword-analysis output when present, otherwise
    /// the seed keyword.
    pub fn focus_keyword(&self) -> &str {
        if let Some(StageOutput::KeywordAnalysis { focus_keyword, .. }) =
            self.get(StageId::KeywordAnalysis)
        {
            if !focus_keyword.is_empty() {
                return focus_keyword;
            }
        }
        &self.keyword
    }

    /// The working title: outline output when present, otherwise the keyword.
    pub fn title(&self) -> &str {
        if let Some(StageOutput::Outline { title, .. }) = self.get(StageId::Outline) {
            if !title.is_empty() {
                return title;
            }
        }
        &self.keyword
    }

    /// The current draft text. Prefers the plagiarism-remediated rewrite
    /// (until a later draft supersedes it), then the humanized draft, then
    /// the generated draft.
    pub fn content(&self) -> &str {
        if let Some(StageOutput::PlagiarismCheck(outcome)) = self.get(StageId::PlagiarismCheck) {
            if let Some(rewritten) = &outcome.rewritten_content {
                return rewritten;
            }
        }
        if let Some(StageOutput::Humanization { content, .. }) = self.get(StageId::Humanization) {
            return content;
        }
        if let Some(StageOutput::ContentGeneration { content, .. }) =
            self.get(StageId::ContentGeneration)
        {
            return content;
        }
        ""
    }

    /// The meta description: meta-generation output when present, otherwise
    /// a provisional excerpt of the draft (the SEO stage runs before meta
    /// generation).
    pub fn meta_description(&self) -> String {
        if let Some(StageOutput::MetaGeneration {
            meta_description, ..
        }) = self.get(StageId::MetaGeneration)
        {
            return meta_description.clone();
        }
        let content = self.content();
        let mut end = PROVISIONAL_META_LEN.min(content.len());
        while end > 0 && !content.is_char_boundary(end) {
            end -= 1;
        }
        content[..end].to_string()
    }

    // -----------------------------------------------------------------------
    // Refinement instruction slot
    // -----------------------------------------------------------------------

    pub fn set_refinement_instruction(&mut self, instruction: String) {
        self.refinement_instruction = Some(instruction);
    }

    pub fn clear_refinement_instruction(&mut self) {
        self.refinement_instruction = None;
    }

    pub fn refinement_instruction(&self) -> Option<&str> {
        self.refinement_instruction.as_deref()
    }
}
