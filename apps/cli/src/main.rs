//! hanjadeck CLI: build hanja study decks from plain-text word lists.
//!
//! Extracts entries from the input, looks each one up in a dictionary
//! source, merges what was found and writes the result to the configured
//! sinks.

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
