//! Database schema representation and relationship graph.
//!
//! A [`SchemaGraph`] is built from catalog metadata by [`build_graph`]: the
//! tables with their columns and declared foreign keys, plus relationship
//! [`Edge`]s between tables. Edges come from two sources that stay
//! distinguishable through [`EdgeOrigin`]:
//!
//! - **Declared** - one per foreign key recorded in the catalog
//! - **Inferred** - hypothesized from naming conventions (`team_id` → `teams`)
//!
//! Inferred edges are guesses. Consumers decide whether to display or trust
//! them.
//!
//! # Example
//!
//! ```
//! use sql_agent::{
//!     config::InferenceConfig,
//!     schema::{Column, EdgeOrigin, Table, infer_edges}
//! };
//!
//! let mut teams = Table::new("teams");
//! teams.columns = vec![Column::new("id", "INTEGER"), Column::new("name", "TEXT")];
//! let mut players = Table::new("players");
//! players.columns = vec![Column::new("id", "INTEGER"), Column::new("team_id", "INTEGER")];
//!
//! let edges = infer_edges(&[players, teams], &InferenceConfig::default());
//! assert_eq!(edges.len(), 1);
//! assert_eq!(edges[0].source, "players");
//! assert_eq!(edges[0].destination, "teams");
//! assert_eq!(edges[0].label, "team_id");
//! assert_eq!(edges[0].origin, EdgeOrigin::Inferred);
//! ```

mod infer;

use std::fmt;

use compact_str::CompactString;
pub use infer::{build_graph, infer_edges};
use serde::Serialize;
use smallvec::SmallVec;
use thiserror::Error;

/// Foreign keys of a single table (rarely more than a handful)
pub type ForeignKeyVec = SmallVec<[ForeignKey; 4]>;

/// Column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name:      CompactString,
    /// Declared type, displayed verbatim
    pub data_type: CompactString
}

impl Column {
    pub fn new(name: impl Into<CompactString>, data_type: impl Into<CompactString>) -> Self {
        Self {
            name:      name.into(),
            data_type: data_type.into()
        }
    }
}

/// Foreign key declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub from_column: CompactString,
    pub ref_table:   CompactString,
    pub ref_column:  CompactString
}

impl ForeignKey {
    pub fn new(
        from_column: impl Into<CompactString>,
        ref_table: impl Into<CompactString>,
        ref_column: impl Into<CompactString>
    ) -> Self {
        Self {
            from_column: from_column.into(),
            ref_table:   ref_table.into(),
            ref_column:  ref_column.into()
        }
    }

    /// Edge label, `from->to`
    pub fn label(&self) -> CompactString {
        compact_str::format_compact!("{}->{}", self.from_column, self.ref_column)
    }
}

/// Catalog read that failed during introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrospectionStage {
    Tables,
    Columns,
    ForeignKeys
}

impl fmt::Display for IntrospectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tables => write!(f, "table list"),
            Self::Columns => write!(f, "columns"),
            Self::ForeignKeys => write!(f, "foreign keys")
        }
    }
}

/// Catalog metadata could not be read.
///
/// Attached to the affected [`Table`] as a diagnostic; only a failure to list
/// tables at all aborts [`build_graph`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("failed to read {stage} of {}: {message}", .table.as_deref().unwrap_or("catalog"))]
pub struct IntrospectionError {
    pub table:   Option<CompactString>,
    pub stage:   IntrospectionStage,
    pub message: String
}

impl IntrospectionError {
    pub fn new(table: Option<&str>, stage: IntrospectionStage, message: impl Into<String>) -> Self {
        Self {
            table: table.map(CompactString::from),
            stage,
            message: message.into()
        }
    }
}

/// Table with its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Name as reported by the catalog (case-sensitive identity)
    pub name:         CompactString,
    pub columns:      Vec<Column>,
    pub foreign_keys: ForeignKeyVec,
    /// Non-fatal introspection failures for this table
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics:  Vec<IntrospectionError>
}

impl Table {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name:         name.into(),
            columns:      Vec::new(),
            foreign_keys: ForeignKeyVec::new(),
            diagnostics:  Vec::new()
        }
    }
}

/// Where an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    /// Backed by a foreign key in the catalog
    Declared,
    /// Guessed from column and table names
    Inferred
}

impl fmt::Display for EdgeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared => write!(f, "declared"),
            Self::Inferred => write!(f, "inferred")
        }
    }
}

/// Directed relationship between two distinct tables.
///
/// Identity is `(source, destination, label)`; the same pair of tables may be
/// joined by several edges with different labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source:      CompactString,
    pub destination: CompactString,
    pub label:       CompactString,
    pub origin:      EdgeOrigin
}

/// Tables and relationship edges of one introspection pass.
///
/// Edges are sorted by `(source, destination, label)` and never loop back to
/// their source table. The graph is a snapshot: rebuild it when the catalog
/// changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaGraph {
    pub tables: Vec<Table>,
    pub edges:  Vec<Edge>
}

impl SchemaGraph {
    /// Look up a table by exact name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn edges_with_origin(&self, origin: EdgeOrigin) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.origin == origin)
    }

    /// All diagnostics, in table order
    pub fn diagnostics(&self) -> impl Iterator<Item = &IntrospectionError> {
        self.tables.iter().flat_map(|t| t.diagnostics.iter())
    }

    /// Schema summary for the SQL generation prompt
    ///
    /// One line per table, `Table name: col type, col type`, bounded to
    /// `max_tables` tables and `max_columns` columns per table.
    pub fn to_summary(&self, max_tables: usize, max_columns: usize) -> String {
        self.tables
            .iter()
            .take(max_tables)
            .map(|table| {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .take(max_columns)
                    .map(|c| format!("{} {}", c.name, c.data_type))
                    .collect();
                format!("Table {}: {}", table.name, columns.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
