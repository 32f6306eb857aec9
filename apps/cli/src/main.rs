//! Triage CLI: decide whether saved content is worth reading.
//!
//! Extracts text from files, web pages, and pasted notes, asks a language
//! model for a Read/Discard verdict, and keeps every record in a local store.

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
