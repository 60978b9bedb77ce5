//! MiniLangFlow CLI: HTTP front end and one-shot runner for a local language model.
//!
//! `serve` exposes summarize, question answering, retrieval-augmented
//! question answering and the summary → bullets → questions workflow over
//! HTTP; the other commands run the same operations once from the shell.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
