// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sql_agent::{
    agent::{Answer, Outcome},
    catalog::{Cell, ExecutionError, QueryResult},
    guard::PreparedStatement,
    output::{OutputFormat, OutputOptions, format_answer, format_graph},
    schema::{
        Column, Edge, EdgeOrigin, IntrospectionError, IntrospectionStage, SchemaGraph, Table
    }
};

fn plain(format: OutputFormat) -> OutputOptions {
    OutputOptions {
        format,
        colored: false,
        verbose: false
    }
}

fn sample_graph() -> SchemaGraph {
    let mut players = Table::new("players");
    players.columns = vec![Column::new("id", "INTEGER"), Column::new("team_id", "INTEGER")];
    let mut teams = Table::new("teams");
    teams.diagnostics.push(IntrospectionError::new(
        Some("teams"),
        IntrospectionStage::Columns,
        "disk I/O error"
    ));
    SchemaGraph {
        tables: vec![players, teams],
        edges:  vec![Edge {
            source:      "players".into(),
            destination: "teams".into(),
            label:       "team_id".into(),
            origin:      EdgeOrigin::Inferred
        }]
    }
}

fn statement() -> PreparedStatement {
    PreparedStatement {
        sql:           "SELECT name FROM players LIMIT 50;".into(),
        limit_applied: true
    }
}

#[test]
fn test_output_options_default() {
    let opts = OutputOptions::default();
    assert!(matches!(opts.format, OutputFormat::Text));
    assert!(opts.colored);
    assert!(!opts.verbose);
}

#[test]
fn test_graph_text() {
    let text = format_graph(&sample_graph(), &plain(OutputFormat::Text));
    assert!(text.contains("Tables (2)"));
    assert!(text.contains("  players (2 columns)"));
    assert!(text.contains("  players -> teams [team_id] inferred"));
    assert!(text.contains("failed to read columns of teams: disk I/O error"));
}

#[test]
fn test_graph_json() {
    let json = format_graph(&sample_graph(), &plain(OutputFormat::Json));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["edges"][0]["origin"], "inferred");
    assert_eq!(value["tables"][1]["diagnostics"][0]["stage"], "columns");
    assert!(value["tables"][0].get("diagnostics").is_none());
}

#[test]
fn test_graph_yaml() {
    let yaml = format_graph(&sample_graph(), &plain(OutputFormat::Yaml));
    assert!(yaml.contains("origin: inferred"));
}

#[test]
fn test_answer_rejected_text() {
    let answer = Answer {
        question:     "wipe it".into(),
        model_output: "DELETE FROM players;".into(),
        outcome:      Outcome::Rejected {
            code:   "EXTRACTION_FAILURE",
            reason: "no SELECT statement found in model output".into()
        }
    };
    assert_eq!(
        format_answer(&answer, &plain(OutputFormat::Text)),
        "Rejected (EXTRACTION_FAILURE): no SELECT statement found in model output"
    );
}

#[test]
fn test_answer_executed_text() {
    let answer = Answer {
        question:     "names".into(),
        model_output: "SELECT name FROM players;".into(),
        outcome:      Outcome::Executed {
            statement: statement(),
            result:    QueryResult {
                columns: vec!["name".into()],
                rows:    vec![vec![Cell::Text("Ada".into())]]
            }
        }
    };
    let text = format_answer(&answer, &plain(OutputFormat::Text));
    assert!(text.starts_with("SELECT name FROM players LIMIT 50;\n\nname\n"));
    assert!(text.ends_with("(1 row)"));
}

#[test]
fn test_answer_executed_csv() {
    let answer = Answer {
        question:     "names".into(),
        model_output: "SELECT name FROM players;".into(),
        outcome:      Outcome::Executed {
            statement: statement(),
            result:    QueryResult {
                columns: vec!["name".into(), "team".into()],
                rows:    vec![vec![Cell::Text("Ada, Jr.".into()), Cell::Null]]
            }
        }
    };
    assert_eq!(
        format_answer(&answer, &plain(OutputFormat::Csv)),
        "name,team\n\"Ada, Jr.\","
    );
}

#[test]
fn test_answer_failed_json() {
    let answer = Answer {
        question:     "names".into(),
        model_output: "SELECT name FROM players;".into(),
        outcome:      Outcome::Failed {
            statement: statement(),
            error:     ExecutionError::Failed("no such table: players".into())
        }
    };
    let json = format_answer(&answer, &plain(OutputFormat::Json));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["outcome"]["status"], "failed");
    assert_eq!(value["outcome"]["statement"]["limit_applied"], true);
}

#[test]
fn test_answer_verbose_shows_model_output() {
    let answer = Answer {
        question:     "names".into(),
        model_output: "```sql\nSELECT name FROM players\n```".into(),
        outcome:      Outcome::Prepared {
            statement: statement()
        }
    };
    let opts = OutputOptions {
        verbose: true,
        ..plain(OutputFormat::Text)
    };
    let text = format_answer(&answer, &opts);
    assert!(text.starts_with("Model output:\n```sql"));
    assert!(text.contains("-- default row limit applied"));
}
