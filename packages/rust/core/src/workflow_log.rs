//! Workflow log sink.
//!
//! The engine records every stage invocation through this trait rather
//! than a global side channel. The production sink appends to the article
//! store; the in-memory sink backs tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use draftpilot_shared::{ArticleId, Result, WorkflowLogEntry};
use draftpilot_storage::ArticleStore;

/// Append-only sink for stage invocation records.
#[async_trait]
pub trait WorkflowLog: Send + Sync {
    async fn record(&self, article: ArticleId, entry: WorkflowLogEntry) -> Result<()>;
}

/// Sink that persists entries through the article store.
pub struct StoreWorkflowLog {
    store: Arc<dyn ArticleStore>,
}

impl StoreWorkflowLog {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WorkflowLog for StoreWorkflowLog {
    async fn record(&self, article: ArticleId, entry: WorkflowLogEntry) -> Result<()> {
        self.store.append_workflow_entry(article, &entry).await
    }
}

/// In-memory sink for tests and dry runs.
#[derive(Default)]
pub struct MemoryWorkflowLog {
    entries: Mutex<Vec<(ArticleId, WorkflowLogEntry)>>,
}

impl MemoryWorkflowLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entries recorded for one article, in order.
    pub fn entries_for(&self, article: ArticleId) -> Vec<WorkflowLogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == article)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl WorkflowLog for MemoryWorkflowLog {
    async fn record(&self, article: ArticleId, entry: WorkflowLogEntry) -> Result<()> {
        self.entries.lock().unwrap().push((article, entry));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftpilot_shared::{StageId, WorkflowStatus};

    #[tokio::test]
    async fn memory_sink_keeps_per_article_order() {
        let log = MemoryWorkflowLog::new();
        let a = ArticleId::new();
        let b = ArticleId::new();

        log.record(a, WorkflowLogEntry::started(StageId::Research))
            .await
            .unwrap();
        log.record(b, WorkflowLogEntry::started(StageId::Outline))
            .await
            .unwrap();
        log.record(a, WorkflowLogEntry::completed(StageId::Research, 10))
            .await
            .unwrap();

        let entries = log.entries_for(a);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, WorkflowStatus::Started);
        assert_eq!(entries[1].status, WorkflowStatus::Completed);
        assert_eq!(log.entries_for(b).len(), 1);
    }
}
