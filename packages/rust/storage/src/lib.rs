//! libSQL storage layer for draftpilot.
//!
//! The [`ArticleStore`] trait is the persistence seam the pipeline engine
//! runs against. [`LibsqlStore`] is the production implementation backed by
//! an embedded libSQL database; [`MemoryStore`] backs engine tests.
//!
//! Durability model:
//! - `articles` holds the mutable aggregate (status, stages, scores).
//! - `stage_outputs` holds one durable checkpoint per (article, stage);
//!   re-saving a stage replaces the previous checkpoint.
//! - `workflow_log` and `error_log` are append-only.

mod migrations;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use draftpilot_shared::{
    Article, ArticleId, ArticleStatus, ArticleTemplate, DraftPilotError, ErrorLogEntry,
    QualityScores, Result, StageErrorDetail, StageId, WorkflowLogEntry, WorkflowStatus,
};
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ArticleStore trait
// ---------------------------------------------------------------------------

/// Partial update applied to an article record.
///
/// Only the fields that are `Some` are written; `clear_failed_stage` is a
/// separate flag because "set `failed_stage` to NULL" and "leave it alone"
/// both map to `None` otherwise.
#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub status: Option<ArticleStatus>,
    pub current_stage: Option<StageId>,
    pub failed_stage: Option<StageId>,
    pub clear_failed_stage: bool,
    pub scores: Option<QualityScores>,
}

impl ArticlePatch {
    pub fn status(status: ArticleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_current_stage(mut self, stage: StageId) -> Self {
        self.current_stage = Some(stage);
        self
    }

    pub fn with_failed_stage(mut self, stage: StageId) -> Self {
        self.failed_stage = Some(stage);
        self
    }

    pub fn clearing_failed_stage(mut self) -> Self {
        self.clear_failed_stage = true;
        self
    }

    pub fn with_scores(mut self, scores: QualityScores) -> Self {
        self.scores = Some(scores);
        self
    }
}

/// Persistence operations the pipeline engine depends on.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a new article record.
    async fn insert(&self, article: &Article) -> Result<()>;

    /// Load an article by ID. `None` if no such article exists.
    async fn load(&self, id: ArticleId) -> Result<Option<Article>>;

    /// Apply a partial update; always bumps `updated_at`.
    async fn update(&self, id: ArticleId, patch: &ArticlePatch) -> Result<()>;

    /// List all articles, newest first.
    async fn list(&self) -> Result<Vec<Article>>;

    /// Save a durable stage checkpoint, replacing any previous checkpoint
    /// for the same (article, stage).
    async fn save_stage_output(
        &self,
        id: ArticleId,
        stage: StageId,
        output: &serde_json::Value,
    ) -> Result<()>;

    /// Load a previously saved stage checkpoint.
    async fn load_stage_output(
        &self,
        id: ArticleId,
        stage: StageId,
    ) -> Result<Option<serde_json::Value>>;

    /// Append to the article's error log.
    async fn append_error_log(&self, id: ArticleId, entry: &ErrorLogEntry) -> Result<()>;

    /// Read the article's error log, oldest first.
    async fn error_log(&self, id: ArticleId) -> Result<Vec<ErrorLogEntry>>;

    /// Append a workflow log entry.
    async fn append_workflow_entry(&self, id: ArticleId, entry: &WorkflowLogEntry) -> Result<()>;

    /// Read the article's workflow log, oldest first.
    async fn workflow_log(&self, id: ArticleId) -> Result<Vec<WorkflowLogEntry>>;
}

/// SHA-256 hex digest of a checkpoint payload, stored alongside it for
/// change detection.
pub fn content_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// LibsqlStore
// ---------------------------------------------------------------------------

/// Production article store backed by an embedded libSQL database.
pub struct LibsqlStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl LibsqlStore {
    /// Open or create a database at `path` and run pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DraftPilotError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    DraftPilotError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

#[async_trait]
impl ArticleStore for LibsqlStore {
    async fn insert(&self, article: &Article) -> Result<()> {
        let scores_json = serde_json::to_string(&article.scores)
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO articles
                   (id, keyword, template, target_words, status, current_stage,
                    failed_stage, scores_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    article.id.to_string(),
                    article.keyword.as_str(),
                    article.template.as_str(),
                    i64::from(article.target_words),
                    article.status.as_str(),
                    article.current_stage.map(|s| s.as_str()),
                    article.failed_stage.map(|s| s.as_str()),
                    scores_json.as_str(),
                    article.created_at.to_rfc3339(),
                    article.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, id: ArticleId) -> Result<Option<Article>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, keyword, template, target_words, status, current_stage,
                        failed_stage, scores_json, created_at, updated_at
                 FROM articles WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_article(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DraftPilotError::Storage(e.to_string())),
        }
    }

    async fn update(&self, id: ArticleId, patch: &ArticlePatch) -> Result<()> {
        // Fixed-shape UPDATE with per-column "keep or replace" guards keeps
        // this to a single statement regardless of which fields are set.
        let scores_json = match &patch.scores {
            Some(scores) => Some(
                serde_json::to_string(scores)
                    .map_err(|e| DraftPilotError::Storage(e.to_string()))?,
            ),
            None => None,
        };
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE articles SET
                   status        = COALESCE(?1, status),
                   current_stage = COALESCE(?2, current_stage),
                   failed_stage  = CASE WHEN ?3 THEN NULL ELSE COALESCE(?4, failed_stage) END,
                   scores_json   = COALESCE(?5, scores_json),
                   updated_at    = ?6
                 WHERE id = ?7",
                params![
                    patch.status.map(|s| s.as_str()),
                    patch.current_stage.map(|s| s.as_str()),
                    i64::from(patch.clear_failed_stage),
                    patch.failed_stage.map(|s| s.as_str()),
                    scores_json.as_deref(),
                    now.as_str(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Article>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, keyword, template, target_words, status, current_stage,
                        failed_stage, scores_json, created_at, updated_at
                 FROM articles ORDER BY created_at DESC",
                params![],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_article(&row)?);
        }
        Ok(results)
    }

    async fn save_stage_output(
        &self,
        id: ArticleId,
        stage: StageId,
        output: &serde_json::Value,
    ) -> Result<()> {
        let output_json =
            serde_json::to_string(output).map_err(|e| DraftPilotError::Storage(e.to_string()))?;
        let hash = content_hash(&output_json);
        let row_id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO stage_outputs (id, article_id, stage, output_json, content_hash, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(article_id, stage) DO UPDATE SET
                   output_json = excluded.output_json,
                   content_hash = excluded.content_hash,
                   saved_at = excluded.saved_at",
                params![
                    row_id.as_str(),
                    id.to_string(),
                    stage.as_str(),
                    output_json.as_str(),
                    hash.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn load_stage_output(
        &self,
        id: ArticleId,
        stage: StageId,
    ) -> Result<Option<serde_json::Value>> {
        let mut rows = self
            .conn
            .query(
                "SELECT output_json FROM stage_outputs WHERE article_id = ?1 AND stage = ?2",
                params![id.to_string(), stage.as_str()],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
                let value = serde_json::from_str(&raw)
                    .map_err(|e| DraftPilotError::Storage(format!("corrupt checkpoint: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DraftPilotError::Storage(e.to_string())),
        }
    }

    async fn append_error_log(&self, id: ArticleId, entry: &ErrorLogEntry) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO error_log (article_id, stage, kind, message, detail, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    entry.stage.as_str(),
                    entry.kind.as_str(),
                    entry.message.as_str(),
                    entry.detail.as_deref(),
                    entry.occurred_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn error_log(&self, id: ArticleId) -> Result<Vec<ErrorLogEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stage, kind, message, detail, occurred_at
                 FROM error_log WHERE article_id = ?1 ORDER BY id",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let stage_raw: String = row
                .get(0)
                .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
            results.push(ErrorLogEntry {
                stage: parse_stage(&stage_raw)?,
                kind: row
                    .get(1)
                    .map_err(|e| DraftPilotError::Storage(e.to_string()))?,
                message: row
                    .get(2)
                    .map_err(|e| DraftPilotError::Storage(e.to_string()))?,
                detail: row.get::<String>(3).ok(),
                occurred_at: parse_timestamp(
                    &row.get::<String>(4)
                        .map_err(|e| DraftPilotError::Storage(e.to_string()))?,
                )?,
            });
        }
        Ok(results)
    }

    async fn append_workflow_entry(&self, id: ArticleId, entry: &WorkflowLogEntry) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO workflow_log
                   (article_id, stage, status, duration_ms, error_kind, error_message,
                    error_detail, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    entry.stage.as_str(),
                    entry.status.as_str(),
                    entry.duration_ms.map(|d| d as i64),
                    entry.error.as_ref().map(|e| e.kind.as_str()),
                    entry.error.as_ref().map(|e| e.message.as_str()),
                    entry.error.as_ref().and_then(|e| e.detail.as_deref()),
                    entry.recorded_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn workflow_log(&self, id: ArticleId) -> Result<Vec<WorkflowLogEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stage, status, duration_ms, error_kind, error_message, error_detail,
                        recorded_at
                 FROM workflow_log WHERE article_id = ?1 ORDER BY id",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_workflow_entry(&row)?);
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Row converters
// ---------------------------------------------------------------------------

fn parse_stage(raw: &str) -> Result<StageId> {
    StageId::parse(raw)
        .ok_or_else(|| DraftPilotError::Storage(format!("unknown stage in database: {raw}")))
}

fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DraftPilotError::Storage(format!("invalid timestamp: {e}")))
}

/// Convert a database row to an [`Article`].
fn row_to_article(row: &libsql::Row) -> Result<Article> {
    let id_raw: String = row
        .get(0)
        .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
    let template_raw: String = row
        .get(2)
        .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
    let status_raw: String = row
        .get(4)
        .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
    let scores_raw: String = row
        .get(7)
        .map_err(|e| DraftPilotError::Storage(e.to_string()))?;

    Ok(Article {
        id: id_raw
            .parse()
            .map_err(|e| DraftPilotError::Storage(format!("invalid article id: {e}")))?,
        keyword: row
            .get(1)
            .map_err(|e| DraftPilotError::Storage(e.to_string()))?,
        template: ArticleTemplate::parse(&template_raw).ok_or_else(|| {
            DraftPilotError::Storage(format!("unknown template in database: {template_raw}"))
        })?,
        target_words: row
            .get::<i64>(3)
            .map_err(|e| DraftPilotError::Storage(e.to_string()))? as u32,
        status: ArticleStatus::parse(&status_raw).ok_or_else(|| {
            DraftPilotError::Storage(format!("unknown status in database: {status_raw}"))
        })?,
        current_stage: row
            .get::<String>(5)
            .ok()
            .as_deref()
            .and_then(StageId::parse),
        failed_stage: row
            .get::<String>(6)
            .ok()
            .as_deref()
            .and_then(StageId::parse),
        scores: serde_json::from_str(&scores_raw)
            .map_err(|e| DraftPilotError::Storage(format!("corrupt scores: {e}")))?,
        created_at: parse_timestamp(
            &row.get::<String>(8)
                .map_err(|e| DraftPilotError::Storage(e.to_string()))?,
        )?,
        updated_at: parse_timestamp(
            &row.get::<String>(9)
                .map_err(|e| DraftPilotError::Storage(e.to_string()))?,
        )?,
    })
}

/// Convert a database row to a [`WorkflowLogEntry`].
fn row_to_workflow_entry(row: &libsql::Row) -> Result<WorkflowLogEntry> {
    let stage_raw: String = row
        .get(0)
        .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
    let status_raw: String = row
        .get(1)
        .map_err(|e| DraftPilotError::Storage(e.to_string()))?;
    let status = match status_raw.as_str() {
        "started" => WorkflowStatus::Started,
        "completed" => WorkflowStatus::Completed,
        "failed" => WorkflowStatus::Failed,
        other => {
            return Err(DraftPilotError::Storage(format!(
                "unknown workflow status in database: {other}"
            )));
        }
    };

    let error_kind: Option<String> = row.get::<String>(3).ok();
    let error = match error_kind {
        Some(kind) => Some(StageErrorDetail {
            kind,
            message: row.get::<String>(4).unwrap_or_default(),
            detail: row.get::<String>(5).ok(),
        }),
        None => None,
    };

    Ok(WorkflowLogEntry {
        stage: parse_stage(&stage_raw)?,
        status,
        duration_ms: row.get::<i64>(2).ok().map(|d| d as u64),
        error,
        recorded_at: parse_timestamp(
            &row.get::<String>(6)
                .map_err(|e| DraftPilotError::Storage(e.to_string()))?,
        )?,
    })
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

struct MemoryRecord {
    article: Article,
    stage_outputs: HashMap<StageId, serde_json::Value>,
    error_log: Vec<ErrorLogEntry>,
    workflow_log: Vec<WorkflowLogEntry>,
}

impl MemoryRecord {
    fn new(article: Article) -> Self {
        Self {
            article,
            stage_outputs: HashMap::new(),
            error_log: Vec::new(),
            workflow_log: Vec::new(),
        }
    }
}

/// In-memory article store for engine tests.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<ArticleId, MemoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert(&self, article: &Article) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        records.insert(article.id, MemoryRecord::new(article.clone()));
        Ok(())
    }

    async fn load(&self, id: ArticleId) -> Result<Option<Article>> {
        let records = self.records.lock().unwrap();
        Ok(records.get(&id).map(|r| r.article.clone()))
    }

    async fn update(&self, id: ArticleId, patch: &ArticlePatch) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| DraftPilotError::Storage(format!("no such article: {id}")))?;
        if let Some(status) = patch.status {
            record.article.status = status;
        }
        if let Some(stage) = patch.current_stage {
            record.article.current_stage = Some(stage);
        }
        if patch.clear_failed_stage {
            record.article.failed_stage = None;
        } else if let Some(stage) = patch.failed_stage {
            record.article.failed_stage = Some(stage);
        }
        if let Some(scores) = &patch.scores {
            record.article.scores = scores.clone();
        }
        record.article.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Article>> {
        let records = self.records.lock().unwrap();
        let mut articles: Vec<_> = records.values().map(|r| r.article.clone()).collect();
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles)
    }

    async fn save_stage_output(
        &self,
        id: ArticleId,
        stage: StageId,
        output: &serde_json::Value,
    ) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| DraftPilotError::Storage(format!("no such article: {id}")))?;
        record.stage_outputs.insert(stage, output.clone());
        Ok(())
    }

    async fn load_stage_output(
        &self,
        id: ArticleId,
        stage: StageId,
    ) -> Result<Option<serde_json::Value>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .get(&id)
            .and_then(|r| r.stage_outputs.get(&stage).cloned()))
    }

    async fn append_error_log(&self, id: ArticleId, entry: &ErrorLogEntry) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| DraftPilotError::Storage(format!("no such article: {id}")))?;
        record.error_log.push(entry.clone());
        Ok(())
    }

    async fn error_log(&self, id: ArticleId) -> Result<Vec<ErrorLogEntry>> {
        let records = self.records.lock().unwrap();
        Ok(records.get(&id).map(|r| r.error_log.clone()).unwrap_or_default())
    }

    async fn append_workflow_entry(&self, id: ArticleId, entry: &WorkflowLogEntry) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| DraftPilotError::Storage(format!("no such article: {id}")))?;
        record.workflow_log.push(entry.clone());
        Ok(())
    }

    async fn workflow_log(&self, id: ArticleId) -> Result<Vec<WorkflowLogEntry>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .get(&id)
            .map(|r| r.workflow_log.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftpilot_shared::{ArticleTemplate, WorkflowLogEntry};
    use serde_json::json;

    /// Create a temp file store for testing.
    async fn test_store() -> LibsqlStore {
        let tmp = std::env::temp_dir().join(format!("dp_test_{}.db", Uuid::now_v7()));
        LibsqlStore::open(&tmp).await.expect("open test db")
    }

    fn sample_article() -> Article {
        Article::queued("rust error handling", ArticleTemplate::HowTo, 1500)
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("dp_test_{}.db", Uuid::now_v7()));
        let s1 = LibsqlStore::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = LibsqlStore::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn article_roundtrip() {
        let store = test_store().await;
        let article = sample_article();
        store.insert(&article).await.expect("insert");

        let loaded = store.load(article.id).await.expect("load").expect("exists");
        assert_eq!(loaded.keyword, "rust error handling");
        assert_eq!(loaded.template, ArticleTemplate::HowTo);
        assert_eq!(loaded.status, ArticleStatus::Queued);
        assert!(loaded.current_stage.is_none());
        assert!(loaded.scores.overall.is_none());
    }

    #[tokio::test]
    async fn load_missing_article() {
        let store = test_store().await;
        let loaded = store.load(ArticleId::new()).await.expect("load");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn patch_updates_only_set_fields() {
        let store = test_store().await;
        let article = sample_article();
        store.insert(&article).await.unwrap();

        let patch = ArticlePatch::status(ArticleStatus::Generating)
            .with_current_stage(StageId::Research);
        store.update(article.id, &patch).await.expect("update");

        let loaded = store.load(article.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ArticleStatus::Generating);
        assert_eq!(loaded.current_stage, Some(StageId::Research));
        assert_eq!(loaded.keyword, "rust error handling");
        assert!(loaded.updated_at >= article.updated_at);
    }

    #[tokio::test]
    async fn failed_stage_set_and_clear() {
        let store = test_store().await;
        let article = sample_article();
        store.insert(&article).await.unwrap();

        let patch =
            ArticlePatch::status(ArticleStatus::Failed).with_failed_stage(StageId::Research);
        store.update(article.id, &patch).await.unwrap();
        let loaded = store.load(article.id).await.unwrap().unwrap();
        assert_eq!(loaded.failed_stage, Some(StageId::Research));

        let patch = ArticlePatch::status(ArticleStatus::Generating).clearing_failed_stage();
        store.update(article.id, &patch).await.unwrap();
        let loaded = store.load(article.id).await.unwrap().unwrap();
        assert!(loaded.failed_stage.is_none());
    }

    #[tokio::test]
    async fn stage_checkpoint_replaces_on_resave() {
        let store = test_store().await;
        let article = sample_article();
        store.insert(&article).await.unwrap();

        store
            .save_stage_output(article.id, StageId::Research, &json!({"notes": "v1"}))
            .await
            .expect("first save");
        store
            .save_stage_output(article.id, StageId::Research, &json!({"notes": "v2"}))
            .await
            .expect("replace");

        let loaded = store
            .load_stage_output(article.id, StageId::Research)
            .await
            .expect("load")
            .expect("exists");
        assert_eq!(loaded["notes"], "v2");

        let missing = store
            .load_stage_output(article.id, StageId::Outline)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn workflow_log_appends_in_order() {
        let store = test_store().await;
        let article = sample_article();
        store.insert(&article).await.unwrap();

        store
            .append_workflow_entry(article.id, &WorkflowLogEntry::started(StageId::Research))
            .await
            .unwrap();
        store
            .append_workflow_entry(
                article.id,
                &WorkflowLogEntry::completed(StageId::Research, 412),
            )
            .await
            .unwrap();
        store
            .append_workflow_entry(
                article.id,
                &WorkflowLogEntry::failed(
                    StageId::Outline,
                    75,
                    StageErrorDetail::from_error("provider", "model unavailable", "trace body"),
                ),
            )
            .await
            .unwrap();

        let log = store.workflow_log(article.id).await.expect("read log");
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].status, WorkflowStatus::Started);
        assert_eq!(log[1].duration_ms, Some(412));
        assert_eq!(log[2].status, WorkflowStatus::Failed);
        let error = log[2].error.as_ref().expect("failure detail");
        assert_eq!(error.kind, "provider");
        assert_eq!(error.detail.as_deref(), Some("trace body"));
    }

    #[tokio::test]
    async fn error_log_roundtrip() {
        let store = test_store().await;
        let article = sample_article();
        store.insert(&article).await.unwrap();

        store
            .append_error_log(
                article.id,
                &ErrorLogEntry {
                    stage: StageId::ContentGeneration,
                    kind: "provider".into(),
                    message: "quota exceeded".into(),
                    detail: None,
                    occurred_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let log = store.error_log(article.id).await.expect("read log");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].stage, StageId::ContentGeneration);
        assert_eq!(log[0].message, "quota exceeded");
    }

    #[tokio::test]
    async fn list_newest_first() {
        let store = test_store().await;
        let first = sample_article();
        store.insert(&first).await.unwrap();
        let second = Article::queued("tokio channels", ArticleTemplate::Evergreen, 2000);
        store.insert(&second).await.unwrap();

        let all = store.list().await.expect("list");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn memory_store_mirrors_libsql_semantics() {
        let store = MemoryStore::new();
        let article = sample_article();
        store.insert(&article).await.unwrap();

        store
            .update(
                article.id,
                &ArticlePatch::status(ArticleStatus::Failed).with_failed_stage(StageId::Outline),
            )
            .await
            .unwrap();
        let loaded = store.load(article.id).await.unwrap().unwrap();
        assert_eq!(loaded.failed_stage, Some(StageId::Outline));

        store
            .update(
                article.id,
                &ArticlePatch::status(ArticleStatus::Generating).clearing_failed_stage(),
            )
            .await
            .unwrap();
        let loaded = store.load(article.id).await.unwrap().unwrap();
        assert!(loaded.failed_stage.is_none());

        store
            .save_stage_output(article.id, StageId::Research, &json!({"notes": "v1"}))
            .await
            .unwrap();
        let out = store
            .load_stage_output(article.id, StageId::Research)
            .await
            .unwrap();
        assert!(out.is_some());
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let a = content_hash("payload");
        let b = content_hash("payload");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash("other"));
    }
}
