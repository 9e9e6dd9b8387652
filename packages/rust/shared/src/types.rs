//! Core domain types for draftpilot articles and pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ArticleId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for article identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub Uuid);

impl ArticleId {
    /// Generate a new time-sortable article identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ArticleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// StageId
// ---------------------------------------------------------------------------

/// The pipeline stages, in execution order.
///
/// Declaration order is the single source of truth for pipeline order:
/// `Ord` on this enum *is* the pipeline ordering, and [`StageId::ALL`]
/// iterates the stages exactly as the engine runs them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    KeywordAnalysis,
    Research,
    Outline,
    ContentGeneration,
    Humanization,
    AiDetection,
    PlagiarismCheck,
    BiasDetection,
    FactVerification,
    PerspectiveAnalysis,
    SeoOptimization,
    MetaGeneration,
    ReadabilityCheck,
    Finalization,
}

impl StageId {
    /// All stages in pipeline order.
    pub const ALL: [StageId; 14] = [
        StageId::KeywordAnalysis,
        StageId::Research,
        StageId::Outline,
        StageId::ContentGeneration,
        StageId::Humanization,
        StageId::AiDetection,
        StageId::PlagiarismCheck,
        StageId::BiasDetection,
        StageId::FactVerification,
        StageId::PerspectiveAnalysis,
        StageId::SeoOptimization,
        StageId::MetaGeneration,
        StageId::ReadabilityCheck,
        StageId::Finalization,
    ];

    /// Stable snake_case name, used in config, storage, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeywordAnalysis => "keyword_analysis",
            Self::Research => "research",
            Self::Outline => "outline",
            Self::ContentGeneration => "content_generation",
            Self::Humanization => "humanization",
            Self::AiDetection => "ai_detection",
            Self::PlagiarismCheck => "plagiarism_check",
            Self::BiasDetection => "bias_detection",
            Self::FactVerification => "fact_verification",
            Self::PerspectiveAnalysis => "perspective_analysis",
            Self::SeoOptimization => "seo_optimization",
            Self::MetaGeneration => "meta_generation",
            Self::ReadabilityCheck => "readability_check",
            Self::Finalization => "finalization",
        }
    }

    /// Parse a stage name. Returns `None` for unknown names; the engine
    /// treats an unknown start stage as "start from the beginning".
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == name)
    }

    /// Position of this stage in the pipeline.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// Whether this stage's output is durably checkpointed onto the
    /// article record immediately after it completes (crash recovery
    /// boundary).
    pub fn is_durable(&self) -> bool {
        matches!(
            self,
            Self::Research
                | Self::Outline
                | Self::ContentGeneration
                | Self::Humanization
                | Self::AiDetection
                | Self::PlagiarismCheck
                | Self::BiasDetection
                | Self::FactVerification
                | Self::SeoOptimization
        )
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// Lifecycle status of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    /// Created, waiting for a pipeline run.
    Queued,
    /// A pipeline run is in flight.
    Generating,
    /// All stages completed; awaiting the human publish/reject decision.
    Reviewing,
    /// A stage failed fatally; resumable from `failed_stage`.
    Failed,
}

impl ArticleStatus {
    /// Stable snake_case name for storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Generating => "generating",
            Self::Reviewing => "reviewing",
            Self::Failed => "failed",
        }
    }

    /// Parse a status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "generating" => Some(Self::Generating),
            "reviewing" => Some(Self::Reviewing),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Article template type, steering outline and tone prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArticleTemplate {
    HowTo,
    Listicle,
    Comparison,
    News,
    Evergreen,
}

impl ArticleTemplate {
    /// Stable kebab-case name for storage and CLI flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HowTo => "how-to",
            Self::Listicle => "listicle",
            Self::Comparison => "comparison",
            Self::News => "news",
            Self::Evergreen => "evergreen",
        }
    }

    /// Parse a template name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "how-to" => Some(Self::HowTo),
            "listicle" => Some(Self::Listicle),
            "comparison" => Some(Self::Comparison),
            "news" => Some(Self::News),
            "evergreen" => Some(Self::Evergreen),
            _ => None,
        }
    }
}

/// Accumulated quality sub-scores, all on a 0–100 scale.
///
/// `ai_detection`, `plagiarism`, and `bias` are "lower is better" and are
/// inverted during final aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_detection: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plagiarism: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_check: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readability: Option<f64>,
    /// Weighted aggregate, computed by the finalization stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
}

/// One entry in an article's append-only error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    /// Stage that failed.
    pub stage: StageId,
    /// Machine-readable error kind tag.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Truncated trace/detail for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// When the failure occurred.
    pub occurred_at: DateTime<Utc>,
}

/// Status of one stage invocation in the workflow log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Started,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// Stable snake_case name for storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Structured failure detail carried by failed workflow entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageErrorDetail {
    /// Machine-readable error kind tag.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Truncated trace/detail for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Longest detail string persisted with a failure.
const MAX_ERROR_DETAIL: usize = 500;

impl StageErrorDetail {
    /// Capture kind/message from an error, truncating the debug detail.
    pub fn from_error(kind: &str, message: &str, detail: &str) -> Self {
        let truncated = if detail.len() > MAX_ERROR_DETAIL {
            let mut end = MAX_ERROR_DETAIL;
            while !detail.is_char_boundary(end) {
                end -= 1;
            }
            Some(format!("{}…", &detail[..end]))
        } else if detail.is_empty() {
            None
        } else {
            Some(detail.to_string())
        };
        Self {
            kind: kind.to_string(),
            message: message.to_string(),
            detail: truncated,
        }
    }
}

/// One record per stage invocation: started, then completed (with
/// duration) or failed (with structured detail). Append-only; never
/// mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowLogEntry {
    /// Stage that was invoked.
    pub stage: StageId,
    /// Invocation status.
    pub status: WorkflowStatus,
    /// Wall-clock duration in milliseconds, for completed/failed entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Failure detail, for failed entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageErrorDetail>,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl WorkflowLogEntry {
    /// A "started" entry for a stage.
    pub fn started(stage: StageId) -> Self {
        Self {
            stage,
            status: WorkflowStatus::Started,
            duration_ms: None,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    /// A "completed" entry with the stage's duration.
    pub fn completed(stage: StageId, duration_ms: u64) -> Self {
        Self {
            stage,
            status: WorkflowStatus::Completed,
            duration_ms: Some(duration_ms),
            error: None,
            recorded_at: Utc::now(),
        }
    }

    /// A "failed" entry with duration and structured detail.
    pub fn failed(stage: StageId, duration_ms: u64, error: StageErrorDetail) -> Self {
        Self {
            stage,
            status: WorkflowStatus::Failed,
            duration_ms: Some(duration_ms),
            error: Some(error),
            recorded_at: Utc::now(),
        }
    }
}

/// The aggregate being transformed by the pipeline.
///
/// Mutated stage-by-stage by the orchestrator; never deleted by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier (UUID v7).
    pub id: ArticleId,
    /// Source topic keyword the article is generated from.
    pub keyword: String,
    /// Template steering structure and tone.
    pub template: ArticleTemplate,
    /// Target word count.
    pub target_words: u32,
    /// Current lifecycle status.
    pub status: ArticleStatus,
    /// Stage the pipeline last advanced past, or `None` before the first run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageId>,
    /// Stage that failed, when `status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<StageId>,
    /// Accumulated quality sub-scores.
    #[serde(default)]
    pub scores: QualityScores,
    /// When the article was queued.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp — the staleness signal for stalled runs.
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Create a fresh queued article for a keyword.
    pub fn queued(keyword: impl Into<String>, template: ArticleTemplate, target_words: u32) -> Self {
        let now = Utc::now();
        Self {
            id: ArticleId::new(),
            keyword: keyword.into(),
            template,
            target_words,
            status: ArticleStatus::Queued,
            current_stage: None,
            failed_stage: None,
            scores: QualityScores::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
