use colored::Colorize;
use serde::Serialize;

use crate::{
    agent::{Answer, Outcome},
    catalog::{Cell, QueryResult, TableCount},
    guard::PreparedStatement,
    schema::{EdgeOrigin, SchemaGraph}
};

/// Output format for results
///
/// `Csv` applies to tabular output (query rows, row counts). Other reports
/// fall back to text.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
    Csv
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

fn serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Option<String> {
    match format {
        OutputFormat::Json => Some(serde_json::to_string_pretty(value).unwrap_or_default()),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value).unwrap_or_default()),
        OutputFormat::Text | OutputFormat::Csv => None
    }
}

/// Format query rows
pub fn format_query_result(result: &QueryResult, opts: &OutputOptions) -> String {
    if matches!(opts.format, OutputFormat::Csv) {
        return format_csv(result);
    }
    serialized(result, opts.format).unwrap_or_else(|| format_table(result, opts.colored))
}

/// Rows as RFC 4180 CSV with a header record; `NULL` becomes an empty field.
pub fn format_csv(result: &QueryResult) -> String {
    write_csv(result)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(|csv| csv.trim_end_matches(['\r', '\n']).to_string())
        .unwrap_or_default()
}

fn write_csv(result: &QueryResult) -> csv::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.iter().map(csv_field))?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

fn csv_field(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        other => other.to_string()
    }
}

/// Format a rejected statement as `Rejected (<code>): <detail>`
pub fn format_rejection(code: &str, reason: &str, opts: &OutputOptions) -> String {
    let line = format!("Rejected ({}): {}", code, reason);
    if opts.colored {
        line.red().bold().to_string()
    } else {
        line
    }
}

/// Format a statement accepted by the guardrails
pub fn format_prepared(statement: &PreparedStatement, opts: &OutputOptions) -> String {
    if let Some(out) = serialized(statement, opts.format) {
        return out;
    }
    let mut output = statement.sql.clone();
    if opts.verbose && statement.limit_applied {
        output.push_str("\n-- default row limit applied");
    }
    output
}

/// Format the outcome of a natural-language question
pub fn format_answer(answer: &Answer, opts: &OutputOptions) -> String {
    if let Some(out) = serialized(answer, opts.format) {
        return out;
    }
    if let OutputFormat::Csv = opts.format
        && let Outcome::Executed {
            result, ..
        } = &answer.outcome
    {
        return format_csv(result);
    }
    let mut output = String::new();
    if opts.verbose {
        output.push_str(&format!("Model output:\n{}\n\n", answer.model_output.trim()));
    }
    match &answer.outcome {
        Outcome::Rejected {
            code,
            reason
        } => output.push_str(&format_rejection(code, reason, opts)),
        Outcome::Prepared {
            statement
        } => output.push_str(&format_prepared(statement, opts)),
        Outcome::Executed {
            statement,
            result
        } => {
            output.push_str(&heading(&statement.sql, opts.colored));
            output.push_str("\n\n");
            output.push_str(&format_table(result, opts.colored));
        }
        Outcome::Failed {
            statement,
            error
        } => {
            output.push_str(&heading(&statement.sql, opts.colored));
            output.push_str(&format!("\n\nQuery failed: {}", error));
        }
    }
    output
}

/// Format the relationship graph
///
/// Text output lists tables, edges with their origin, and diagnostics.
pub fn format_graph(graph: &SchemaGraph, opts: &OutputOptions) -> String {
    if let Some(out) = serialized(graph, opts.format) {
        return out;
    }
    let mut output = String::new();
    output.push_str(&heading(&format!("Tables ({})", graph.tables.len()), opts.colored));
    output.push('\n');
    for table in &graph.tables {
        output.push_str(&format!("  {} ({} columns)\n", table.name, table.columns.len()));
    }
    output.push('\n');
    output.push_str(&heading(&format!("Edges ({})", graph.edges.len()), opts.colored));
    output.push('\n');
    for edge in &graph.edges {
        let origin = if opts.colored {
            match edge.origin {
                EdgeOrigin::Declared => edge.origin.to_string().green().to_string(),
                EdgeOrigin::Inferred => edge.origin.to_string().yellow().to_string()
            }
        } else {
            edge.origin.to_string()
        };
        output.push_str(&format!(
            "  {} -> {} [{}] {}\n",
            edge.source, edge.destination, edge.label, origin
        ));
    }
    let diagnostics: Vec<_> = graph.diagnostics().collect();
    if !diagnostics.is_empty() {
        output.push('\n');
        output.push_str(&heading("Diagnostics", opts.colored));
        output.push('\n');
        for diagnostic in diagnostics {
            output.push_str(&format!("  {}\n", diagnostic));
        }
    }
    output.trim_end().to_string()
}

/// Format row counts by table
pub fn format_counts(counts: &[TableCount], opts: &OutputOptions) -> String {
    if let Some(out) = serialized(counts, opts.format) {
        return out;
    }
    if matches!(opts.format, OutputFormat::Csv) {
        return format_csv(&QueryResult {
            columns: vec!["table".into(), "rows".into()],
            rows:    counts
                .iter()
                .map(|c| vec![Cell::Text(c.table.to_string()), Cell::Integer(c.rows)])
                .collect()
        });
    }
    let width = counts.iter().map(|c| c.table.chars().count()).max().unwrap_or(0);
    counts
        .iter()
        .map(|c| format!("{:<width$}  {}", c.table.as_str(), c.rows, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn heading(text: &str, colored: bool) -> String {
    if colored {
        text.cyan().bold().to_string()
    } else {
        text.to_string()
    }
}

/// Aligned plain-text table with a header rule and a row count footer.
fn format_table(result: &QueryResult, colored: bool) -> String {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect();
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let header = join_padded(&result.columns, &widths);
    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");
    let mut lines = vec![
        if colored {
            header.bold().to_string()
        } else {
            header
        },
        rule,
    ];
    lines.extend(cells.iter().map(|row| join_padded(row, &widths)));
    let noun = if cells.len() == 1 { "row" } else { "rows" };
    lines.push(format!("({} {})", cells.len(), noun));
    lines.join("\n")
}

fn join_padded(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(v, w)| format!("{:<width$}", v, width = *w))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> OutputOptions {
        OutputOptions {
            colored: false,
            ..OutputOptions::default()
        }
    }

    fn result() -> QueryResult {
        QueryResult {
            columns: vec!["id".into(), "name".into()],
            rows:    vec![
                vec![Cell::Integer(1), Cell::Text("Ada".into())],
                vec![Cell::Integer(22), Cell::Null],
            ]
        }
    }

    #[test]
    fn test_text_table_alignment() {
        let table = format_query_result(&result(), &plain());
        assert_eq!(table, "id | name\n---+-----\n1  | Ada\n22 | NULL\n(2 rows)");
    }

    #[test]
    fn test_empty_result() {
        let empty = QueryResult {
            columns: vec!["id".into()],
            rows:    Vec::new()
        };
        assert!(format_query_result(&empty, &plain()).ends_with("(0 rows)"));
    }

    #[test]
    fn test_json_result() {
        let opts = OutputOptions {
            format: OutputFormat::Json,
            ..plain()
        };
        let json: serde_json::Value =
            serde_json::from_str(&format_query_result(&result(), &opts)).unwrap();
        assert_eq!(json["columns"][1], "name");
        assert_eq!(json["rows"][0][1], "Ada");
        assert!(json["rows"][1][1].is_null());
    }

    #[test]
    fn test_csv_result() {
        let opts = OutputOptions {
            format: OutputFormat::Csv,
            ..plain()
        };
        assert_eq!(format_query_result(&result(), &opts), "id,name\n1,Ada\n22,");
    }

    #[test]
    fn test_csv_quotes_fields() {
        let quoted = QueryResult {
            columns: vec!["note".into()],
            rows:    vec![vec![Cell::Text("Hawks, \"the\" best\nteam".into())]]
        };
        assert_eq!(format_csv(&quoted), "note\n\"Hawks, \"\"the\"\" best\nteam\"");
    }

    #[test]
    fn test_rejection_line() {
        assert_eq!(
            format_rejection("NOT_SELECT_ONLY", "statement does not start with SELECT", &plain()),
            "Rejected (NOT_SELECT_ONLY): statement does not start with SELECT"
        );
    }

    #[test]
    fn test_prepared_verbose_notes_limit() {
        let statement = PreparedStatement {
            sql:           "SELECT 1 LIMIT 50;".into(),
            limit_applied: true
        };
        let opts = OutputOptions {
            verbose: true,
            ..plain()
        };
        assert_eq!(format_prepared(&statement, &plain()), "SELECT 1 LIMIT 50;");
        assert!(format_prepared(&statement, &opts).contains("default row limit applied"));
    }

    #[test]
    fn test_counts_alignment() {
        let counts = vec![
            TableCount {
                table: "players".into(),
                rows:  12
            },
            TableCount {
                table: "teams".into(),
                rows:  3
            },
        ];
        assert_eq!(format_counts(&counts, &plain()), "players  12\nteams    3");
    }
}
