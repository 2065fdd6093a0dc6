//! Application logic for the `sql-agent` CLI.
//!
//! Each subcommand is a function returning a [`CommandOutput`] so the binary
//! only prints and exits. Keeping the logic here makes it testable without
//! spawning a process.
//!
//! # Exit Codes
//!
//! - `0` - Success
//! - `1` - Error (configuration, I/O, introspection, execution, LLM)
//! - `2` - Statement rejected by the guardrails

mod helpers;

use std::{fs, path::PathBuf, sync::Arc, time::Duration};

pub use helpers::{
    DEFAULT_OLLAMA_URL, apply_global_args, build_llm_provider, convert_format,
    create_output_options, effective_guard, get_effective_model, get_effective_ollama_url,
    get_effective_provider, read_input
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    agent::{Agent, Outcome, PROMPT_MAX_COLUMNS, PROMPT_MAX_TABLES},
    catalog::{self, Catalog, SqliteCatalog},
    cli::{Cli, Commands, Provider},
    config::{Config, DiagramConfig, GuardConfig},
    diagram,
    error::{AppResult, file_write_error},
    guard::{Rejection, prepare, validate_and_prepare_with},
    llm::LlmClient,
    output::{
        OutputFormat, OutputOptions, format_answer, format_counts, format_graph, format_prepared,
        format_query_result, format_rejection
    },
    schema::build_graph
};

/// Exit code for a rejected statement
pub const EXIT_REJECTED: i32 = 2;
/// Exit code for a failed command
pub const EXIT_FAILURE: i32 = 1;

/// Text to print and the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output:    String
}

impl CommandOutput {
    fn success(output: String) -> Self {
        Self {
            exit_code: 0,
            output
        }
    }
}

/// Parameters for the ask command
#[derive(Debug, Clone)]
pub struct AskParams {
    pub question:   String,
    pub provider:   Option<Provider>,
    pub api_key:    Option<String>,
    pub model:      Option<String>,
    pub ollama_url: String,
    pub base_url:   Option<String>,
    pub limit:      Option<u64>,
    pub strict:     bool,
    pub dry_run:    bool
}

/// Parameters for the erd command
#[derive(Debug, Clone, Default)]
pub struct ErdParams {
    pub no_columns:      bool,
    pub max_columns:     Option<usize>,
    pub dashed_inferred: bool,
    pub output:          Option<PathBuf>
}

/// Dispatch a parsed command line.
///
/// # Errors
///
/// Returns an error for everything that is not a guardrail rejection.
pub async fn run(cli: Cli, mut config: Config) -> AppResult<CommandOutput> {
    apply_global_args(&mut config, &cli.global);
    let opts = create_output_options(&cli.global);
    let catalog = SqliteCatalog::new(config.database.clone());

    match cli.command {
        Commands::Ask {
            question,
            provider,
            api_key,
            model,
            ollama_url,
            base_url,
            limit,
            strict,
            dry_run
        } => {
            let params = AskParams {
                question,
                provider,
                api_key,
                model,
                ollama_url,
                base_url,
                limit,
                strict,
                dry_run
            };
            run_ask(params, &config, &catalog, &opts).await
        }
        Commands::Check {
            input,
            limit,
            strict
        } => {
            let raw = read_input(&input)?;
            Ok(run_check(&raw, &effective_guard(&config.guard, limit, strict), &opts))
        }
        Commands::Run {
            sql,
            limit
        } => run_sql(&sql, limit, &config, &catalog, &opts),
        Commands::Schema => run_schema(&config, &catalog, &opts),
        Commands::Erd {
            no_columns,
            max_columns,
            dashed_inferred,
            output
        } => {
            let params = ErdParams {
                no_columns,
                max_columns,
                dashed_inferred,
                output
            };
            run_erd(&params, &config, &catalog)
        }
        Commands::Graph => {
            let graph = build_graph(&catalog, &config.inference)?;
            Ok(CommandOutput::success(format_graph(&graph, &opts)))
        }
        Commands::Preview {
            table,
            rows
        } => {
            let result =
                catalog::preview_table(&catalog, &table, rows, config.database.timeout())?;
            Ok(CommandOutput::success(format_query_result(&result, &opts)))
        }
        Commands::Counts => {
            let counts = catalog::row_counts(&catalog, config.database.timeout())?;
            Ok(CommandOutput::success(format_counts(&counts, &opts)))
        }
    }
}

/// Generate SQL for a question, guard it and (unless dry run) execute it.
///
/// # Errors
///
/// Returns an error when the provider cannot be built, the schema cannot be
/// listed or the model call fails.
pub async fn run_ask(
    params: AskParams,
    config: &Config,
    catalog: &SqliteCatalog,
    opts: &OutputOptions
) -> AppResult<CommandOutput> {
    let provider = get_effective_provider(params.provider, config.llm.provider.as_deref())?;
    let model = get_effective_model(params.model, config.llm.model.clone(), &provider);
    let ollama_url = get_effective_ollama_url(params.ollama_url, config.llm.ollama_url.clone());
    let llm_provider = build_llm_provider(
        provider,
        params.api_key.or(config.llm.api_key.clone()),
        model,
        ollama_url,
        params.base_url.or(config.llm.base_url.clone())
    )?;
    let client = LlmClient::with_retry_config(llm_provider, config.retry.clone());

    let graph = build_graph(catalog, &config.inference)?;
    let guard = effective_guard(&config.guard, params.limit, params.strict);
    let agent = Agent::new(
        &client,
        Arc::new(catalog.clone()),
        guard,
        config.database.timeout()
    );

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Generating SQL...");
    pb.enable_steady_tick(Duration::from_millis(100));
    let answer = agent.ask(&params.question, &graph, !params.dry_run).await;
    pb.finish_and_clear();
    let answer = answer?;

    let exit_code = match answer.outcome {
        Outcome::Rejected {
            ..
        } => EXIT_REJECTED,
        Outcome::Failed {
            ..
        } => EXIT_FAILURE,
        Outcome::Prepared {
            ..
        }
        | Outcome::Executed {
            ..
        } => 0
    };
    Ok(CommandOutput {
        exit_code,
        output: format_answer(&answer, opts)
    })
}

/// Run raw model output through extraction and the guardrails.
pub fn run_check(raw: &str, guard: &GuardConfig, opts: &OutputOptions) -> CommandOutput {
    match validate_and_prepare_with(raw, guard) {
        Ok(statement) => CommandOutput::success(format_prepared(&statement, opts)),
        Err(rejection) => CommandOutput {
            exit_code: EXIT_REJECTED,
            output:    rejection_output(rejection.code(), &rejection.to_string(), opts)
        }
    }
}

/// Guard and execute a hand-written statement.
///
/// The statement is checked as-is; no extraction is applied.
///
/// # Errors
///
/// Returns an error when execution fails or times out.
pub fn run_sql(
    sql: &str,
    limit: Option<u64>,
    config: &Config,
    catalog: &SqliteCatalog,
    opts: &OutputOptions
) -> AppResult<CommandOutput> {
    let guard = effective_guard(&config.guard, limit, false);
    let statement = match prepare(sql, &guard) {
        Ok(statement) => statement,
        Err(rejection) => {
            let rejection = Rejection::from(rejection);
            return Ok(CommandOutput {
                exit_code: EXIT_REJECTED,
                output:    rejection_output(rejection.code(), &rejection.to_string(), opts)
            });
        }
    };
    let result = catalog.execute_read_only(&statement.sql, config.database.timeout())?;
    Ok(CommandOutput::success(format_query_result(&result, opts)))
}

/// Schema overview: the prompt summary in text mode, the tables otherwise.
///
/// # Errors
///
/// Returns an error when the table list cannot be read.
pub fn run_schema(
    config: &Config,
    catalog: &SqliteCatalog,
    opts: &OutputOptions
) -> AppResult<CommandOutput> {
    let graph = build_graph(catalog, &config.inference)?;
    let output = match opts.format {
        OutputFormat::Text | OutputFormat::Csv => {
            graph.to_summary(PROMPT_MAX_TABLES, PROMPT_MAX_COLUMNS)
        }
        OutputFormat::Json => serde_json::to_string_pretty(&graph.tables).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(&graph.tables).unwrap_or_default()
    };
    Ok(CommandOutput::success(output))
}

/// Render the DOT diagram, to stdout or a file.
///
/// # Errors
///
/// Returns an error when the table list cannot be read or the file cannot be
/// written.
pub fn run_erd(
    params: &ErdParams,
    config: &Config,
    catalog: &SqliteCatalog
) -> AppResult<CommandOutput> {
    let graph = build_graph(catalog, &config.inference)?;
    let options = DiagramConfig {
        include_columns: config.diagram.include_columns && !params.no_columns,
        max_columns:     params.max_columns.unwrap_or(config.diagram.max_columns),
        dashed_inferred: config.diagram.dashed_inferred || params.dashed_inferred
    };
    let dot = diagram::render(&graph, &options);
    match &params.output {
        Some(path) => {
            fs::write(path, format!("{}\n", dot))
                .map_err(|e| file_write_error(&path.display().to_string(), e))?;
            tracing::info!(path = %path.display(), tables = graph.tables.len(), "diagram written");
            Ok(CommandOutput::success(format!("Wrote {}", path.display())))
        }
        None => Ok(CommandOutput::success(dot))
    }
}

fn rejection_output(code: &str, reason: &str, opts: &OutputOptions) -> String {
    #[derive(serde::Serialize)]
    struct RejectionReport<'a> {
        code:   &'a str,
        reason: &'a str
    }
    let report = RejectionReport {
        code,
        reason
    };
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(&report).unwrap_or_default(),
        OutputFormat::Text | OutputFormat::Csv => format_rejection(code, reason, opts)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use tempfile::TempDir;

    use super::*;
    use crate::config::DatabaseConfig;

    fn plain() -> OutputOptions {
        OutputOptions {
            colored: false,
            ..OutputOptions::default()
        }
    }

    fn league() -> (TempDir, Config, SqliteCatalog) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("league.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE teams (id INTEGER PRIMARY KEY, name TEXT);
                 CREATE TABLE players (id INTEGER PRIMARY KEY, team_id INTEGER REFERENCES teams(id));
                 INSERT INTO teams VALUES (1, 'Hawks');"
            )
            .unwrap();
        let config = Config {
            database: DatabaseConfig::for_path(&path),
            ..Config::default()
        };
        let catalog = SqliteCatalog::new(config.database.clone());
        (dir, config, catalog)
    }

    #[test]
    fn test_run_check_accepted() {
        let out = run_check("SELECT 1", &GuardConfig::default(), &plain());
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.output, "SELECT 1 LIMIT 50;");
    }

    #[test]
    fn test_run_check_rejected() {
        let out = run_check("SELECT * FROM t WHERE drop = 1", &GuardConfig::default(), &plain());
        assert_eq!(out.exit_code, EXIT_REJECTED);
        assert_eq!(
            out.output,
            "Rejected (FORBIDDEN_KEYWORD): statement contains forbidden keyword DROP"
        );
    }

    #[test]
    fn test_run_sql_executes() {
        let (_dir, config, catalog) = league();
        let out = run_sql("SELECT name FROM teams", None, &config, &catalog, &plain()).unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.output, "name\n-----\nHawks\n(1 row)");
    }

    #[test]
    fn test_run_sql_rejects_without_executing() {
        let (_dir, config, catalog) = league();
        let out =
            run_sql("UPDATE teams SET name = 'x'", None, &config, &catalog, &plain()).unwrap();
        assert_eq!(out.exit_code, EXIT_REJECTED);
        assert!(out.output.starts_with("Rejected (NOT_SELECT_ONLY)"));
    }

    #[test]
    fn test_run_sql_reports_execution_failure() {
        let (_dir, config, catalog) = league();
        assert!(run_sql("SELECT * FROM nowhere", None, &config, &catalog, &plain()).is_err());
    }

    #[test]
    fn test_run_erd_uses_config_and_flags() {
        let (_dir, mut config, catalog) = league();
        config.diagram.dashed_inferred = true;
        let params = ErdParams {
            no_columns: true,
            ..ErdParams::default()
        };
        let out = run_erd(&params, &config, &catalog).unwrap();
        assert!(out.output.contains("  teams [label=\"teams\"];"));
        assert!(out.output.contains("players -> teams [label=\"team_id->id\"];"));
        assert!(out.output.contains("players -> teams [label=\"team_id\", style=dashed];"));
    }

    #[test]
    fn test_run_schema_json() {
        let (_dir, config, catalog) = league();
        let opts = OutputOptions {
            format: OutputFormat::Json,
            ..plain()
        };
        let out = run_schema(&config, &catalog, &opts).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out.output).unwrap();
        assert_eq!(value[0]["name"], "players");
        assert_eq!(value[0]["foreign_keys"][0]["ref_table"], "teams");
    }
}
