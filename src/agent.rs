//! Question answering: prompt, generate, guard, execute.
//!
//! The agent never trusts the generator. Whatever text comes back goes through
//! [`validate_and_prepare_with`] and only an accepted statement reaches
//! [`Catalog::execute_read_only`]. Rejections and execution failures are
//! reported as an [`Outcome`], not as errors; only a failure to reach the
//! model is an `Err`.
//!
//! Execution blocks on SQLite, so it runs on tokio's blocking pool.

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
    catalog::{Catalog, ExecutionError, QueryResult},
    config::GuardConfig,
    error::AppResult,
    guard::{PreparedStatement, validate_and_prepare_with},
    llm::SqlGenerator,
    schema::SchemaGraph
};

/// Tables included in the prompt's schema overview
pub const PROMPT_MAX_TABLES: usize = 20;
/// Columns per table included in the prompt's schema overview
pub const PROMPT_MAX_COLUMNS: usize = 50;

/// What happened to a question after the model answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Guardrails refused the model output
    Rejected {
        code:   &'static str,
        reason: String
    },
    /// Accepted but not executed (dry run)
    Prepared { statement: PreparedStatement },
    Executed {
        statement: PreparedStatement,
        result:    QueryResult
    },
    /// Accepted, but the executor failed or timed out
    Failed {
        statement: PreparedStatement,
        error:     ExecutionError
    }
}

impl Outcome {
    pub fn statement(&self) -> Option<&PreparedStatement> {
        match self {
            Self::Rejected {
                ..
            } => None,
            Self::Prepared {
                statement
            }
            | Self::Executed {
                statement, ..
            }
            | Self::Failed {
                statement, ..
            } => Some(statement)
        }
    }
}

/// Question, raw model output and outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub question:     String,
    pub model_output: String,
    pub outcome:      Outcome
}

/// Ties a generator to a catalog under fixed guardrail settings.
pub struct Agent<'a, G> {
    generator: &'a G,
    catalog:   Arc<dyn Catalog>,
    guard:     GuardConfig,
    timeout:   Duration
}

impl<'a, G: SqlGenerator> Agent<'a, G> {
    pub fn new(
        generator: &'a G,
        catalog: Arc<dyn Catalog>,
        guard: GuardConfig,
        timeout: Duration
    ) -> Self {
        Self {
            generator,
            catalog,
            guard,
            timeout
        }
    }

    /// Answer a question about the database described by `graph`.
    ///
    /// With `execute` unset the accepted statement is returned as
    /// [`Outcome::Prepared`] without touching the database.
    ///
    /// # Errors
    ///
    /// Returns an error only when the generator fails.
    pub async fn ask(
        &self,
        question: &str,
        graph: &SchemaGraph,
        execute: bool
    ) -> AppResult<Answer> {
        let summary = graph.to_summary(PROMPT_MAX_TABLES, PROMPT_MAX_COLUMNS);
        let prompt = build_prompt(question, &summary, self.guard.default_limit);
        let model_output = self.generator.generate(&prompt).await?;
        tracing::debug!(output = %model_output, "model responded");

        let outcome = match validate_and_prepare_with(&model_output, &self.guard) {
            Err(rejection) => {
                tracing::debug!(question = %question, code = rejection.code(), "answer rejected");
                Outcome::Rejected {
                    code:   rejection.code(),
                    reason: rejection.to_string()
                }
            }
            Ok(statement) if !execute => Outcome::Prepared {
                statement
            },
            Ok(statement) => match self.execute(&statement.sql).await {
                Ok(result) => Outcome::Executed {
                    statement,
                    result
                },
                Err(error) => Outcome::Failed {
                    statement,
                    error
                }
            }
        };

        Ok(Answer {
            question: question.to_string(),
            model_output,
            outcome
        })
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, ExecutionError> {
        let catalog = Arc::clone(&self.catalog);
        let sql = sql.to_string();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || catalog.execute_read_only(&sql, timeout))
            .await
            .map_err(|e| ExecutionError::Failed(format!("executor task failed: {}", e)))?
    }
}

/// Prompt asking the model for a single bounded `SELECT`.
pub fn build_prompt(question: &str, schema_summary: &str, default_limit: u64) -> String {
    format!(
        "Return only a valid SQL SELECT statement ending with a semicolon. Avoid DDL/DML. \
         Include a LIMIT {} if not specified.\n\nSchema:\n{}\n\nQuestion: {}\n\nSQL:",
        default_limit, schema_summary, question
    )
}
