//! # SQL Agent Library
//!
//! Guardrails for model-generated SQL, read-only SQLite access, and schema
//! relationship inference with Graphviz rendering.

pub mod agent;
pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod diagram;
pub mod error;
pub mod extract;
pub mod guard;
pub mod llm;
pub mod output;
pub mod schema;

pub use guard::{validate_and_prepare, validate_and_prepare_with};
pub use schema::build_graph;
