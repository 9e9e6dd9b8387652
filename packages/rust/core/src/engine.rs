//! Stage execution engine.
//!
//! Drives one article through the pipeline: records every stage invocation
//! in the workflow log, persists durable checkpoints as stages complete,
//! evaluates the SEO refinement loop after the seo_optimization stage, and
//! reports terminal status on the article record. A stage failure halts
//! the run; resuming is an explicit re-invocation from the failed stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use draftpilot_shared::{
    ArticleId, ArticleStatus, DraftPilotError, ErrorLogEntry, Result, StageErrorDetail, StageId,
    WorkflowLogEntry,
};
use draftpilot_storage::{ArticlePatch, ArticleStore};

use crate::context::PipelineContext;
use crate::refine;
use crate::score;
use crate::stage::StageDeps;
use crate::stages;
use crate::workflow_log::WorkflowLog;

/// Outcome of one `process` invocation.
#[derive(Debug)]
pub struct RunReport {
    pub success: bool,
    pub article_id: ArticleId,
    pub total_time: Duration,
    pub error: Option<String>,
}

/// The pipeline orchestrator.
pub struct PipelineEngine {
    store: Arc<dyn ArticleStore>,
    log: Arc<dyn WorkflowLog>,
    deps: StageDeps,
}

impl PipelineEngine {
    pub fn new(store: Arc<dyn ArticleStore>, log: Arc<dyn WorkflowLog>, deps: StageDeps) -> Self {
        Self { store, log, deps }
    }

    /// Run the pipeline and fold any failure into the report. An unknown
    /// `start_stage` name starts from the beginning (documented leniency,
    /// not an error).
    #[instrument(skip(self, start_stage), fields(article = %article_id))]
    pub async fn process(&self, article_id: ArticleId, start_stage: Option<&str>) -> RunReport {
        let start_index = match start_stage {
            Some(name) => match StageId::parse(name) {
                Some(stage) => stage.index(),
                None => {
                    debug!(stage = %name, "unknown start stage, starting from the beginning");
                    0
                }
            },
            None => 0,
        };

        let started = Instant::now();
        match self.run(article_id, start_index).await {
            Ok(_) => RunReport {
                success: true,
                article_id,
                total_time: started.elapsed(),
                error: None,
            },
            Err(e) => RunReport {
                success: false,
                article_id,
                total_time: started.elapsed(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Resume a failed article from its recorded failed stage. Earlier
    /// completed stages are not re-executed and their checkpoints are not
    /// rewritten.
    #[instrument(skip(self), fields(article = %article_id))]
    pub async fn retry(&self, article_id: ArticleId) -> Result<PipelineContext> {
        let article = self
            .store
            .load(article_id)
            .await?
            .ok_or_else(|| DraftPilotError::validation(format!("unknown article {article_id}")))?;

        let start_index = match article.failed_stage {
            Some(stage) => {
                info!(stage = %stage, "resuming from failed stage");
                stage.index()
            }
            None => {
                warn!("no failed stage recorded, running from the beginning");
                0
            }
        };
        self.run(article_id, start_index).await
    }

    /// Execute stages from `start_index` onward. Returns the final context
    /// on success; the first stage failure halts the run after persisting
    /// the failure onto the article.
    pub async fn run(&self, article_id: ArticleId, start_index: usize) -> Result<PipelineContext> {
        let article = self
            .store
            .load(article_id)
            .await?
            .ok_or_else(|| DraftPilotError::validation(format!("unknown article {article_id}")))?;

        self.store
            .update(
                article_id,
                &ArticlePatch::status(ArticleStatus::Generating).clearing_failed_stage(),
            )
            .await?;

        let mut ctx = PipelineContext::for_article(&article);

        for stage in stages::all_stages().into_iter().skip(start_index) {
            let stage_id = stage.id();
            self.log
                .record(article_id, WorkflowLogEntry::started(stage_id))
                .await?;
            let stage_started = Instant::now();

            match stage.execute(&article, &ctx, &self.deps).await {
                Ok(output) => {
                    let duration_ms = stage_started.elapsed().as_millis() as u64;
                    ctx.insert(output)?;
                    self.log
                        .record(article_id, WorkflowLogEntry::completed(stage_id, duration_ms))
                        .await?;

                    if stage_id.is_durable() {
                        self.checkpoint(article_id, &ctx, stage_id).await?;
                    }
                    self.store
                        .update(
                            article_id,
                            &ArticlePatch::default().with_current_stage(stage_id),
                        )
                        .await?;

                    if stage_id == StageId::SeoOptimization {
                        refine::refine(&article, &mut ctx, &self.deps).await;
                        // The loop may have rewritten checkpointed outputs,
                        // including superseding a committed plagiarism rewrite.
                        for rewritten in [
                            StageId::ContentGeneration,
                            StageId::Humanization,
                            StageId::PlagiarismCheck,
                            StageId::SeoOptimization,
                        ] {
                            if ctx.contains(rewritten) {
                                self.checkpoint(article_id, &ctx, rewritten).await?;
                            }
                        }
                    }
                }
                Err(err) => {
                    let duration_ms = stage_started.elapsed().as_millis() as u64;
                    let detail = StageErrorDetail::from_error(
                        err.kind(),
                        &err.to_string(),
                        &format!("{err:?}"),
                    );
                    warn!(stage = %stage_id, error = %err, "stage failed, halting run");
                    self.log
                        .record(
                            article_id,
                            WorkflowLogEntry::failed(stage_id, duration_ms, detail.clone()),
                        )
                        .await?;
                    self.store
                        .update(
                            article_id,
                            &ArticlePatch::status(ArticleStatus::Failed)
                                .with_failed_stage(stage_id),
                        )
                        .await?;
                    self.store
                        .append_error_log(
                            article_id,
                            &ErrorLogEntry {
                                stage: stage_id,
                                kind: detail.kind,
                                message: detail.message,
                                detail: detail.detail,
                                occurred_at: Utc::now(),
                            },
                        )
                        .await?;
                    return Err(err);
                }
            }
        }

        let scores = match ctx.get(StageId::Finalization) {
            Some(crate::stage::StageOutput::Finalization { scores }) => scores.clone(),
            _ => {
                let mut scores = score::collect(&ctx);
                scores.overall = score::aggregate(&scores);
                scores
            }
        };
        info!(overall = scores.overall, "pipeline complete, awaiting review");
        self.store
            .update(
                article_id,
                &ArticlePatch::status(ArticleStatus::Reviewing)
                    .with_current_stage(StageId::Finalization)
                    .with_scores(scores),
            )
            .await?;

        Ok(ctx)
    }

    /// Persist a stage's output onto the article record (crash recovery
    /// boundary).
    async fn checkpoint(
        &self,
        article_id: ArticleId,
        ctx: &PipelineContext,
        stage: StageId,
    ) -> Result<()> {
        let Some(output) = ctx.get(stage) else {
            return Ok(());
        };
        let value = serde_json::to_value(output)
            .map_err(|e| DraftPilotError::stage(stage.as_str(), e.to_string()))?;
        self.store.save_stage_output(article_id, stage, &value).await
    }
}
