//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use draftpilot_core::{PipelineEngine, StageDeps, StoreWorkflowLog, WorkflowLog};
use draftpilot_llm::LlmGateway;
use draftpilot_quality::QualityToolset;
use draftpilot_shared::{
    AppConfig, Article, ArticleId, ArticleTemplate, StageId, WorkflowLogEntry, WorkflowStatus,
    config_dir, init_config, load_config, validate_credentials,
};
use draftpilot_storage::{ArticleStore, LibsqlStore};

/// Database file name under the config directory.
const DB_FILE_NAME: &str = "draftpilot.db";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DraftPilot — keyword in, reviewed article draft out.
#[derive(Parser)]
#[command(
    name = "draftpilot",
    version,
    about = "Generate long-form article drafts from keywords through a staged quality pipeline.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress the interactive progress spinner.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Queue a new article for a keyword.
    Queue {
        /// Topic keyword to generate the article from.
        keyword: String,

        /// Article template: how-to, listicle, comparison, news, or evergreen.
        #[arg(short, long, default_value = "evergreen")]
        template: String,

        /// Target word count (defaults to the configured value).
        #[arg(short, long)]
        words: Option<u32>,
    },

    /// Run the pipeline for a queued article.
    Run {
        /// Article ID to process.
        article_id: String,

        /// Stage to start from (snake_case name). Unknown names start
        /// from the beginning.
        #[arg(long)]
        from: Option<String>,
    },

    /// Resume a failed article from its failed stage.
    Retry {
        /// Article ID to resume.
        article_id: String,
    },

    /// Show an article's status, scores, and recent workflow entries.
    Status {
        /// Article ID to inspect.
        article_id: String,
    },

    /// List all articles, newest first.
    List,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "draftpilot=info",
        1 => "draftpilot=debug",
        _ => "draftpilot=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Queue {
            keyword,
            template,
            words,
        } => cmd_queue(&keyword, &template, words).await,
        Command::Run { article_id, from } => cmd_run(&article_id, from.as_deref(), cli.quiet).await,
        Command::Retry { article_id } => cmd_retry(&article_id, cli.quiet).await,
        Command::Status { article_id } => cmd_status(&article_id).await,
        Command::List => cmd_list().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Open the article store at `~/.draftpilot/draftpilot.db`.
async fn open_store() -> Result<Arc<LibsqlStore>> {
    let path = config_dir()?.join(DB_FILE_NAME);
    Ok(Arc::new(LibsqlStore::open(&path).await?))
}

/// Assemble the pipeline engine: store, gateway, quality toolset, and a
/// workflow log that also drives the given progress reporter.
fn build_engine(
    store: Arc<LibsqlStore>,
    config: AppConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PipelineEngine> {
    validate_credentials(&config)?;
    let gateway = Arc::new(LlmGateway::from_config(&config)?);

    let log: Arc<dyn WorkflowLog> = Arc::new(ProgressLog {
        inner: StoreWorkflowLog::new(store.clone()),
        reporter,
    });

    let deps = StageDeps {
        generator: gateway,
        quality: QualityToolset::heuristic(),
        config,
    };
    Ok(PipelineEngine::new(store, log, deps))
}

fn parse_article_id(raw: &str) -> Result<ArticleId> {
    raw.parse()
        .map_err(|e| eyre!("invalid article ID '{raw}': {e}"))
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Stage-level progress sink for interactive runs.
pub(crate) trait ProgressReporter: Send + Sync {
    fn stage_started(&self, stage: StageId);
    fn stage_completed(&self, stage: StageId, duration_ms: u64);
    fn finished(&self);
}

/// Workflow log that persists entries through the store and mirrors them
/// onto a progress reporter.
struct ProgressLog {
    inner: StoreWorkflowLog,
    reporter: Arc<dyn ProgressReporter>,
}

#[async_trait]
impl WorkflowLog for ProgressLog {
    async fn record(&self, article: ArticleId, entry: WorkflowLogEntry) -> draftpilot_shared::Result<()> {
        match entry.status {
            WorkflowStatus::Started => self.reporter.stage_started(entry.stage),
            WorkflowStatus::Completed => self
                .reporter
                .stage_completed(entry.stage, entry.duration_ms.unwrap_or(0)),
            WorkflowStatus::Failed => {}
        }
        self.inner.record(article, entry).await
    }
}

/// Interactive progress reporter backed by an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Arc<Self>> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .map_err(|e| eyre!("bad progress template: {e}"))?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Arc::new(Self { spinner }))
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: StageId) {
        self.spinner.set_message(format!(
            "[{}/{}] {stage}",
            stage.index() + 1,
            StageId::ALL.len()
        ));
    }

    fn stage_completed(&self, _stage: StageId, _duration_ms: u64) {}

    fn finished(&self) {
        self.spinner.finish_and_clear();
    }
}

/// No-op reporter for non-interactive runs.
pub(crate) struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: StageId) {}
    fn stage_completed(&self, _stage: StageId, _duration_ms: u64) {}
    fn finished(&self) {}
}

fn make_reporter(quiet: bool) -> Result<Arc<dyn ProgressReporter>> {
    if quiet {
        Ok(Arc::new(SilentProgress))
    } else {
        Ok(CliProgress::new()?)
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_queue(keyword: &str, template: &str, words: Option<u32>) -> Result<()> {
    if keyword.trim().is_empty() {
        return Err(eyre!("keyword must not be empty"));
    }
    let template = ArticleTemplate::parse(template).ok_or_else(|| {
        eyre!("unknown template '{template}': expected how-to, listicle, comparison, news, or evergreen")
    })?;

    let config = load_config()?;
    let target_words = words.unwrap_or(config.generation.default_target_words);

    let article = Article::queued(keyword.trim(), template, target_words);
    let store = open_store().await?;
    store.insert(&article).await?;

    info!(id = %article.id, keyword, "article queued");

    println!();
    println!("  Article queued.");
    println!("  ID:       {}", article.id);
    println!("  Keyword:  {}", article.keyword);
    println!("  Template: {}", article.template.as_str());
    println!("  Words:    {}", article.target_words);
    println!();
    println!("  Run it with: draftpilot run {}", article.id);
    println!();

    Ok(())
}

async fn cmd_run(article_id: &str, from: Option<&str>, quiet: bool) -> Result<()> {
    let id = parse_article_id(article_id)?;
    let config = load_config()?;
    let store = open_store().await?;

    let reporter = make_reporter(quiet)?;
    let engine = build_engine(store.clone(), config, reporter.clone())?;

    info!(article = %id, from = from.unwrap_or("start"), "running pipeline");
    let report = engine.process(id, from).await;
    reporter.finished();

    if let Some(error) = report.error {
        return Err(eyre!("pipeline failed: {error}"));
    }

    print_run_summary(&store, id, report.total_time).await
}

async fn cmd_retry(article_id: &str, quiet: bool) -> Result<()> {
    let id = parse_article_id(article_id)?;
    let config = load_config()?;
    let store = open_store().await?;

    let reporter = make_reporter(quiet)?;
    let engine = build_engine(store.clone(), config, reporter.clone())?;

    info!(article = %id, "retrying pipeline");
    let started = std::time::Instant::now();
    let result = engine.retry(id).await;
    reporter.finished();
    result?;

    print_run_summary(&store, id, started.elapsed()).await
}

async fn print_run_summary(
    store: &Arc<LibsqlStore>,
    id: ArticleId,
    elapsed: std::time::Duration,
) -> Result<()> {
    let article = store
        .load(id)
        .await?
        .ok_or_else(|| eyre!("article {id} disappeared from the store"))?;

    println!();
    println!("  Pipeline complete.");
    println!("  ID:      {}", article.id);
    println!("  Keyword: {}", article.keyword);
    println!("  Status:  {}", article.status.as_str());
    println!("  Overall: {}", fmt_score(article.scores.overall));
    println!("  Time:    {:.1}s", elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_status(article_id: &str) -> Result<()> {
    let id = parse_article_id(article_id)?;
    let store = open_store().await?;
    let article = store
        .load(id)
        .await?
        .ok_or_else(|| eyre!("no article with ID {id}"))?;

    println!();
    println!("  ID:        {}", article.id);
    println!("  Keyword:   {}", article.keyword);
    println!("  Template:  {}", article.template.as_str());
    println!("  Words:     {}", article.target_words);
    println!("  Status:    {}", article.status.as_str());
    println!(
        "  Stage:     {}",
        article
            .current_stage
            .map_or("-", |s| s.as_str())
    );
    if let Some(failed) = article.failed_stage {
        println!("  Failed at: {failed}");
    }
    println!("  Queued:    {}", article.created_at.to_rfc3339());
    println!("  Updated:   {}", article.updated_at.to_rfc3339());
    println!();
    println!("  Scores");
    println!("    SEO:          {}", fmt_score(article.scores.seo));
    println!("    AI detection: {}", fmt_score(article.scores.ai_detection));
    println!("    Plagiarism:   {}", fmt_score(article.scores.plagiarism));
    println!("    Bias:         {}", fmt_score(article.scores.bias));
    println!("    Fact check:   {}", fmt_score(article.scores.fact_check));
    println!("    Readability:  {}", fmt_score(article.scores.readability));
    println!("    Overall:      {}", fmt_score(article.scores.overall));

    let entries = store.workflow_log(id).await?;
    if !entries.is_empty() {
        println!();
        println!("  Recent workflow entries");
        let skip = entries.len().saturating_sub(10);
        for entry in entries.iter().skip(skip) {
            let duration = entry
                .duration_ms
                .map(|ms| format!(" ({ms} ms)"))
                .unwrap_or_default();
            println!(
                "    {} {:<20} {}{duration}",
                entry.recorded_at.format("%H:%M:%S"),
                entry.stage.as_str(),
                entry.status.as_str(),
            );
            if let Some(error) = &entry.error {
                println!("      {}: {}", error.kind, error.message);
            }
        }
    }

    let errors = store.error_log(id).await?;
    if !errors.is_empty() {
        println!();
        println!("  Error log");
        for entry in &errors {
            println!(
                "    {} {} [{}] {}",
                entry.occurred_at.format("%Y-%m-%d %H:%M:%S"),
                entry.stage.as_str(),
                entry.kind,
                entry.message
            );
        }
    }
    println!();

    Ok(())
}

async fn cmd_list() -> Result<()> {
    let store = open_store().await?;
    let articles = store.list().await?;

    if articles.is_empty() {
        println!("No articles queued yet. Queue one with: draftpilot queue <keyword>");
        return Ok(());
    }

    println!();
    println!(
        "  {:<36}  {:<10}  {:<10}  {:>7}  {}",
        "ID", "STATUS", "TEMPLATE", "OVERALL", "KEYWORD"
    );
    for article in &articles {
        println!(
            "  {:<36}  {:<10}  {:<10}  {:>7}  {}",
            article.id,
            article.status.as_str(),
            article.template.as_str(),
            fmt_score(article.scores.overall),
            article.keyword
        );
    }
    println!();

    Ok(())
}

fn fmt_score(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{value:.1}"),
        None => "-".to_string(),
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
