pub use masterror::{AppError, AppResult};

use crate::{
    catalog::ExecutionError, extract::ExtractionFailure, guard::Rejection,
    schema::IntrospectionError
};

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create file write error
pub fn file_write_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to write file '{}': {}", path, source))
}

/// Create rejection error for generated SQL that failed the guardrails
pub fn rejection_error(rejection: &Rejection) -> AppError {
    AppError::bad_request(format!("Generated SQL rejected ({}): {}", rejection.code(), rejection))
}

/// Create query execution error
pub fn execution_error(err: &ExecutionError) -> AppError {
    AppError::service(format!("Query execution failed: {}", err))
}

/// Create catalog introspection error
pub fn introspection_error(err: &IntrospectionError) -> AppError {
    AppError::service(format!("Schema introspection failed: {}", err))
}

/// Create LLM API error
pub fn llm_api_error(message: impl Into<String>) -> AppError {
    AppError::service(message.into())
}

/// Create HTTP error
pub fn http_error(err: reqwest::Error) -> AppError {
    let msg = if err.is_timeout() {
        format!("Request timeout: {}", err)
    } else if err.is_connect() {
        format!("Connection failed: {}", err)
    } else if err.is_status() {
        format!("HTTP error {}: {}", err.status().unwrap_or_default(), err)
    } else {
        err.to_string()
    };
    AppError::service(msg)
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        rejection_error(&rejection)
    }
}

impl From<ExtractionFailure> for AppError {
    fn from(failure: ExtractionFailure) -> Self {
        rejection_error(&Rejection::Extraction(failure))
    }
}

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        execution_error(&err)
    }
}

impl From<IntrospectionError> for AppError {
    fn from(err: IntrospectionError) -> Self {
        introspection_error(&err)
    }
}

/// Format a sqlparser message with position highlighting
///
/// sqlparser reports positions as "... at Line: X, Column: Y" (older releases
/// omit the second colon).
pub fn format_sql_error(prefix: &str, message: &str) -> String {
    if let Some(pos) = extract_position(message) {
        format!(
            "{} at line {}, column {}:\n  {}",
            prefix, pos.line, pos.column, message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column";

    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let col_start = message[line_num_start..].find(col_marker)?;
    let line_str = &message[line_num_start..line_num_start + col_start];

    let rest = &message[line_num_start + col_start + col_marker.len()..];
    let rest = rest.trim_start_matches(':').trim_start();
    let col_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());

    match (line_str.parse(), rest[..col_end].parse()) {
        (Ok(line), Ok(column)) => Some(SqlPosition {
            line,
            column
        }),
        _ => None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sql_error_with_position() {
        let msg =
            format_sql_error("Parse error", "Expected end of statement at Line: 2, Column: 7");
        assert!(msg.starts_with("Parse error at line 2, column 7:"));
    }

    #[test]
    fn test_format_sql_error_legacy_position() {
        let msg = format_sql_error("Parse error", "Unexpected token at Line: 3, Column 25");
        assert!(msg.starts_with("Parse error at line 3, column 25:"));
    }

    #[test]
    fn test_format_sql_error_without_position() {
        let msg = format_sql_error("Parse error", "Unexpected EOF");
        assert_eq!(msg, "Parse error:\n  Unexpected EOF");
    }
}
