//! Quizsmith CLI — coverage-driven question generation for the tutoring
//! platform.
//!
//! Computes catalog coverage deficits, drives the generation backend to fill
//! them, and persists validated questions to the content store.

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
