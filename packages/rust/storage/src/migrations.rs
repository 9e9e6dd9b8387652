//! SQL migration definitions for the draftpilot database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: articles, stage_outputs, workflow_log, error_log",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Article aggregates
CREATE TABLE IF NOT EXISTS articles (
    id            TEXT PRIMARY KEY,
    keyword       TEXT NOT NULL,
    template      TEXT NOT NULL,
    target_words  INTEGER NOT NULL,
    status        TEXT NOT NULL,
    current_stage TEXT,
    failed_stage  TEXT,
    scores_json   TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);

-- Durable per-stage checkpoints (crash recovery boundary)
CREATE TABLE IF NOT EXISTS stage_outputs (
    id           TEXT PRIMARY KEY,
    article_id   TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    stage        TEXT NOT NULL,
    output_json  TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    saved_at     TEXT NOT NULL,
    UNIQUE(article_id, stage)
);

CREATE INDEX IF NOT EXISTS idx_stage_outputs_article ON stage_outputs(article_id);

-- Append-only workflow log (one row per stage invocation event)
CREATE TABLE IF NOT EXISTS workflow_log (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id    TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    stage         TEXT NOT NULL,
    status        TEXT NOT NULL,
    duration_ms   INTEGER,
    error_kind    TEXT,
    error_message TEXT,
    error_detail  TEXT,
    recorded_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workflow_log_article ON workflow_log(article_id);

-- Append-only article error log
CREATE TABLE IF NOT EXISTS error_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id  TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    stage       TEXT NOT NULL,
    kind        TEXT NOT NULL,
    message     TEXT NOT NULL,
    detail      TEXT,
    occurred_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_error_log_article ON error_log(article_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
