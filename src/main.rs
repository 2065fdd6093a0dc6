//! # SQL Agent
//!
//! Ask questions of a SQLite database in plain language, with guardrails
//! between the language model and the database.
//!
//! Generated text is untrusted: the first `SELECT` statement is extracted,
//! checked for mutating keywords, given a row limit, and only then executed on
//! a read-only connection with a timeout. The same catalog feeds a
//! relationship graph (declared foreign keys plus naming-convention guesses)
//! that renders as a Graphviz diagram.
//!
//! # Quick Start
//!
//! ```bash
//! # Ask a question (OpenAI, Anthropic or a local Ollama)
//! export LLM_API_KEY="sk-..."
//! sql-agent -d league.db ask "Which team has the most players?" --provider openai
//!
//! # Vet model output without touching a database
//! echo 'Sure! SELECT name FROM players;' | sql-agent check
//!
//! # Relationship diagram
//! sql-agent -d league.db erd --dashed-inferred | dot -Tpng -o erd.png
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from (in order of precedence):
//!
//! 1. Command-line arguments
//! 2. Environment variables (`LLM_API_KEY`, `SQLITE_PATH`, etc.)
//! 3. `.sql-agent.toml` in current directory
//! 4. `~/.config/sql-agent/config.toml`
//!
//! # Exit Codes
//!
//! - `0` - Success
//! - `1` - Error
//! - `2` - Statement rejected by the guardrails
//!
//! Logs go to stderr; `--verbose` enables debug output, otherwise `RUST_LOG`
//! applies (default `warn`).

use std::process;

use clap::Parser;
use sql_agent::{app, cli::Cli, config::Config, error::AppResult};
use tokio::main;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(app::EXIT_FAILURE);
        }
    }
}

async fn run(cli: Cli) -> AppResult<i32> {
    let config = Config::load()?;
    let result = app::run(cli, config).await?;
    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    Ok(result.exit_code)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
