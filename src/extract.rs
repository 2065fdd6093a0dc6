//! Statement extraction from free-form model output.
//!
//! Language models rarely return a bare statement. Responses come wrapped in
//! Markdown fences, preceded by prose ("Here is your query:") or followed by
//! an explanation. [`extract`] pulls out the first `SELECT` statement and
//! nothing else; if the text contains no `SELECT` at all, extraction fails
//! instead of handing the prose to later stages.
//!
//! # Example
//!
//! ```
//! use sql_agent::extract::extract;
//!
//! let raw = "Here is your query:\n```sql\nSELECT a FROM t;\n```\nHope it helps.";
//! let statement = extract(raw).unwrap();
//! assert_eq!(statement.sql, "SELECT a FROM t;");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static TERMINATED_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bSELECT\b.*?;").expect("valid regex")
});

static OPEN_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bSELECT\b.*").expect("valid regex")
});

const FENCE: &str = "```";

/// A candidate statement pulled out of model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Model output exactly as received
    pub raw: String,
    /// Extracted statement, always terminated by `;`
    pub sql: String
}

/// Model output did not contain anything that looks like a query.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("no SELECT statement found in model output")]
pub struct ExtractionFailure {
    /// Text that was searched after fence removal
    pub cleaned: String
}

/// Extract the first `SELECT` statement from model output.
///
/// # Errors
///
/// Returns [`ExtractionFailure`] when the text contains no `SELECT` keyword.
pub fn extract(raw: &str) -> Result<Statement, ExtractionFailure> {
    let cleaned = strip_code_fences(raw);
    let Some(found) = TERMINATED_SELECT
        .find(cleaned)
        .or_else(|| OPEN_SELECT.find(cleaned))
    else {
        tracing::debug!("model output contained no SELECT keyword");
        return Err(ExtractionFailure {
            cleaned: cleaned.to_string()
        });
    };
    // A fence marker never belongs to the statement.
    let candidate = found.as_str().split(FENCE).next().unwrap_or_default();
    let mut sql = candidate.trim().to_string();
    if !sql.ends_with(';') {
        sql.push(';');
    }
    tracing::debug!(sql = %sql, "extracted statement");
    Ok(Statement {
        raw: raw.to_string(),
        sql
    })
}

/// Body of the first Markdown code block, or the whole text when there is none.
///
/// The block may be preceded by prose. Its opening fence line is dropped
/// regardless of language tag; the body runs to the next fence line or to the
/// end of the text when the block is never closed.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = fence_line_start(text, 0) else {
        return text;
    };
    let Some(newline) = text[open..].find('\n') else {
        return text;
    };
    let body_start = open + newline + 1;
    let body_end = fence_line_start(text, body_start).unwrap_or(text.len());
    text[body_start..body_end].trim()
}

/// Byte offset of the first line at or after `from` that starts with a fence.
fn fence_line_start(text: &str, from: usize) -> Option<usize> {
    let mut offset = from;
    for line in text[from..].split_inclusive('\n') {
        if line.trim_start().starts_with(FENCE) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}
