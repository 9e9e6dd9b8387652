//! DraftPilot CLI — keyword-to-draft article pipeline.
//!
//! Queues articles and drives them through the staged generation and
//! quality-control pipeline.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
