// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::Parser;
use sql_agent::cli::{Cli, Commands, Format, Provider};

#[test]
fn test_provider_default_model_openai() {
    assert_eq!(Provider::OpenAI.default_model(), "gpt-4o-mini");
}

#[test]
fn test_provider_default_model_anthropic() {
    assert_eq!(Provider::Anthropic.default_model(), "claude-sonnet-4-20250514");
}

#[test]
fn test_provider_default_model_ollama() {
    assert_eq!(Provider::Ollama.default_model(), "llama3.2");
}

#[test]
fn test_provider_from_name() {
    assert!(matches!(Provider::from_name("openai"), Some(Provider::OpenAI)));
    assert!(matches!(Provider::from_name("Anthropic"), Some(Provider::Anthropic)));
    assert!(Provider::from_name("gemini").is_none());
}

#[test]
fn test_parse_ask() {
    let cli = Cli::try_parse_from([
        "sql-agent",
        "ask",
        "How many players per team?",
        "--provider",
        "openai",
        "--dry-run"
    ])
    .unwrap();
    match cli.command {
        Commands::Ask {
            question,
            provider,
            dry_run,
            ollama_url,
            ..
        } => {
            assert_eq!(question, "How many players per team?");
            assert!(matches!(provider, Some(Provider::OpenAI)));
            assert!(dry_run);
            assert_eq!(ollama_url, "http://localhost:11434");
        }
        other => panic!("unexpected command {:?}", other)
    }
}

#[test]
fn test_global_args_after_subcommand() {
    let cli = Cli::try_parse_from([
        "sql-agent",
        "counts",
        "--database",
        "league.db",
        "--timeout-ms",
        "100",
        "-f",
        "json",
        "--no-color"
    ])
    .unwrap();
    assert_eq!(cli.global.database, Some(PathBuf::from("league.db")));
    assert_eq!(cli.global.timeout_ms, Some(100));
    assert!(matches!(cli.global.output_format, Format::Json));
    assert!(cli.global.no_color);
    assert!(matches!(cli.command, Commands::Counts));
}

#[test]
fn test_csv_format() {
    let cli = Cli::try_parse_from(["sql-agent", "run", "SELECT 1", "-f", "csv"]).unwrap();
    assert!(matches!(cli.global.output_format, Format::Csv));
}

#[test]
fn test_check_defaults_to_stdin() {
    let cli = Cli::try_parse_from(["sql-agent", "check"]).unwrap();
    match cli.command {
        Commands::Check {
            input,
            limit,
            strict
        } => {
            assert_eq!(input, PathBuf::from("-"));
            assert!(limit.is_none());
            assert!(!strict);
        }
        other => panic!("unexpected command {:?}", other)
    }
}

#[test]
fn test_parse_erd_options() {
    let cli = Cli::try_parse_from([
        "sql-agent",
        "erd",
        "--no-columns",
        "--max-columns",
        "4",
        "--dashed-inferred"
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Erd {
            no_columns: true,
            max_columns: Some(4),
            dashed_inferred: true,
            output: None
        }
    ));
}

#[test]
fn test_preview_default_rows() {
    let cli = Cli::try_parse_from(["sql-agent", "preview", "teams"]).unwrap();
    assert!(matches!(cli.command, Commands::Preview { rows: 10, .. }));
}

#[test]
fn test_unknown_provider_rejected() {
    assert!(Cli::try_parse_from(["sql-agent", "ask", "q", "--provider", "bard"]).is_err());
}

#[test]
fn test_run_requires_sql() {
    assert!(Cli::try_parse_from(["sql-agent", "run"]).is_err());
}
