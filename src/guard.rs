//! Guardrails for model-generated SQL.
//!
//! Generated text is untrusted. A statement reaches the executor only if it
//! starts with `SELECT` and contains none of the mutating keywords in
//! [`FORBIDDEN_KEYWORDS`]; it is then given a row limit. Rejections are final:
//! nothing here rewrites an unsafe statement into a "safe" one.
//!
//! ```text
//! model text ──▶ extract ──▶ is_select_only ──▶ find_forbidden ──▶ ensure_limit ──▶ executor
//!                   │               │                  │
//!                   └───────────────┴──────────────────┴──▶ Rejection
//! ```
//!
//! The checks are lexical. A forbidden keyword inside a string literal
//! (`WHERE note = 'drop'`) is rejected just like a live one. With
//! [`GuardConfig::strict`] enabled, leading comments are skipped and the
//! statement must parse as exactly one query.
//!
//! # Example
//!
//! ```
//! use sql_agent::guard::validate_and_prepare;
//!
//! let prepared = validate_and_prepare("select name from employees", 50).unwrap();
//! assert_eq!(prepared.sql, "select name from employees LIMIT 50;");
//! assert!(prepared.limit_applied);
//!
//! let rejected = validate_and_prepare("DELETE FROM employees;", 50).unwrap_err();
//! assert_eq!(rejected.code(), "EXTRACTION_FAILURE");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use sqlparser::{ast, dialect::SQLiteDialect, parser::Parser};
use thiserror::Error;

use crate::{
    config::GuardConfig,
    error::format_sql_error,
    extract::{ExtractionFailure, extract}
};

/// Keywords that disqualify a statement wherever they appear.
pub const FORBIDDEN_KEYWORDS: [&str; 8] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "ATTACH", "PRAGMA"
];

static SELECT_GATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\b").expect("valid regex"));

static FORBIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|ATTACH|PRAGMA)\b")
        .expect("valid regex")
});

static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+\b").expect("valid regex"));

/// Reason a candidate statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum SafetyRejection {
    /// Statement does not begin with `SELECT`
    #[error("statement does not start with SELECT")]
    NotSelectOnly,
    /// A mutating keyword appears somewhere in the statement
    #[error("statement contains forbidden keyword {0}")]
    ForbiddenKeyword(&'static str),
    /// Strict mode: more than one statement in the input
    #[error("expected a single statement, found {0}")]
    MultipleStatements(usize),
    /// Strict mode: statement could not be parsed
    #[error("{0}")]
    Unparseable(String)
}

/// Terminal outcome of the guardrail pipeline for rejected input.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Rejection {
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),
    #[error(transparent)]
    Safety(#[from] SafetyRejection)
}

impl Rejection {
    /// Stable identifier of the check that failed
    pub fn code(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "EXTRACTION_FAILURE",
            Self::Safety(SafetyRejection::NotSelectOnly) => "NOT_SELECT_ONLY",
            Self::Safety(SafetyRejection::ForbiddenKeyword(_)) => "FORBIDDEN_KEYWORD",
            Self::Safety(SafetyRejection::MultipleStatements(_)) => "MULTIPLE_STATEMENTS",
            Self::Safety(SafetyRejection::Unparseable(_)) => "UNPARSEABLE"
        }
    }
}

/// Statement accepted by the guardrails, ready for the read-only executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedStatement {
    /// Final SQL handed to the executor
    pub sql:           String,
    /// Whether [`ensure_limit`] appended the default limit
    pub limit_applied: bool
}

/// True iff the statement begins with `SELECT`, ignoring leading whitespace.
pub fn is_select_only(sql: &str) -> bool {
    SELECT_GATE.is_match(sql)
}

/// True iff any forbidden keyword appears as a whole word.
pub fn contains_forbidden(sql: &str) -> bool {
    FORBIDDEN.is_match(sql)
}

/// First forbidden keyword in the statement, upper-cased.
pub fn find_forbidden(sql: &str) -> Option<&'static str> {
    let found = FORBIDDEN.find(sql)?;
    FORBIDDEN_KEYWORDS
        .iter()
        .find(|kw| kw.eq_ignore_ascii_case(found.as_str()))
        .copied()
}

/// True iff the statement already carries `LIMIT <digits>`.
pub fn has_limit(sql: &str) -> bool {
    LIMIT_CLAUSE.is_match(sql)
}

/// Append `LIMIT <default_limit>` unless a numeric limit is already present.
///
/// One trailing `;` is replaced; the result always ends with `;`. Applying it
/// twice with the same limit yields the same string.
pub fn ensure_limit(sql: &str, default_limit: u64) -> String {
    if has_limit(sql) {
        return sql.to_string();
    }
    let trimmed = sql.trim_end();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    format!("{} LIMIT {};", body, default_limit)
}

/// Skip leading whitespace, `--` line comments and `/* */` block comments.
pub fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(line) = rest.strip_prefix("--") {
            rest = line.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = block.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else {
            return rest;
        }
    }
}

/// Run the admission checks against an already extracted statement.
///
/// # Errors
///
/// Returns the first failing check.
pub fn validate(sql: &str, config: &GuardConfig) -> Result<(), SafetyRejection> {
    let candidate = if config.strict {
        strip_leading_comments(sql)
    } else {
        sql
    };
    if !is_select_only(candidate) {
        return Err(SafetyRejection::NotSelectOnly);
    }
    if let Some(keyword) = find_forbidden(candidate) {
        return Err(SafetyRejection::ForbiddenKeyword(keyword));
    }
    if config.strict {
        parse_single_query(candidate)?;
    }
    Ok(())
}

/// Validate an extracted statement and apply the row limit.
///
/// # Errors
///
/// Returns the [`SafetyRejection`] produced by [`validate`].
pub fn prepare(sql: &str, config: &GuardConfig) -> Result<PreparedStatement, SafetyRejection> {
    validate(sql, config).inspect_err(|rejection| {
        tracing::warn!(%rejection, "statement rejected by guardrails");
    })?;
    let normalized = if config.strict {
        format!("{};", parse_single_query(strip_leading_comments(sql))?)
    } else {
        sql.to_string()
    };
    let limit_applied = !has_limit(&normalized);
    let sql = ensure_limit(&normalized, config.default_limit);
    if limit_applied {
        tracing::debug!(limit = config.default_limit, "applied default row limit");
    }
    Ok(PreparedStatement {
        sql,
        limit_applied
    })
}

/// Turn raw model output into a statement the executor may run.
///
/// # Errors
///
/// Returns [`Rejection::Extraction`] when no `SELECT` is present and
/// [`Rejection::Safety`] when a guardrail fails.
pub fn validate_and_prepare(raw: &str, default_limit: u64) -> Result<PreparedStatement, Rejection> {
    let config = GuardConfig {
        default_limit,
        ..GuardConfig::default()
    };
    validate_and_prepare_with(raw, &config)
}

/// [`validate_and_prepare`] with full guard configuration.
///
/// # Errors
///
/// See [`validate_and_prepare`].
pub fn validate_and_prepare_with(
    raw: &str,
    config: &GuardConfig
) -> Result<PreparedStatement, Rejection> {
    let statement = extract(raw)?;
    Ok(prepare(&statement.sql, config)?)
}

fn parse_single_query(sql: &str) -> Result<ast::Statement, SafetyRejection> {
    let mut statements = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|e| {
            SafetyRejection::Unparseable(format_sql_error("Parse error", &e.to_string()))
        })?;
    if statements.len() != 1 {
        return Err(SafetyRejection::MultipleStatements(statements.len()));
    }
    let statement = statements.remove(0);
    match statement {
        ast::Statement::Query(_) => Ok(statement),
        _ => Err(SafetyRejection::NotSelectOnly)
    }
}
