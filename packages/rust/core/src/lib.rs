//! Pipeline engine for draftpilot.
//!
//! Orchestrates the 14 article-generation stages: builds the per-run
//! [`PipelineContext`], executes stages in order, records every invocation
//! in the workflow log, persists durable checkpoints, drives the SEO
//! refinement and plagiarism remediation loops, and aggregates the final
//! quality score.

pub mod context;
pub mod engine;
pub mod prompts;
pub mod refine;
pub mod remediate;
pub mod score;
pub mod stage;
pub mod stages;
pub mod workflow_log;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::PipelineContext;
pub use engine::{PipelineEngine, RunReport};
pub use remediate::RemediationOutcome;
pub use stage::{Stage, StageDeps, StageOutput};
pub use workflow_log::{MemoryWorkflowLog, StoreWorkflowLog, WorkflowLog};
