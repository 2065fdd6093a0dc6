//! Graphviz DOT rendering of a [`SchemaGraph`].
//!
//! Output layout:
//!
//! ```text
//! digraph ERD {
//!   rankdir=LR;
//!   bgcolor=white;
//!   node [shape=record, ...];
//!   edge [...];
//!   players [label="{players|<f0> id: INTEGER|<f1> team_id: INTEGER}"];
//!   teams [label="{teams|<f0> id: INTEGER}"];
//!   players -> teams [label="team_id"];
//! }
//! ```
//!
//! Rendering depends only on the graph and the options; tables are emitted in
//! graph order and edges in their sorted order, so identical input always
//! produces identical bytes.
//!
//! # Example
//!
//! ```
//! use sql_agent::{config::DiagramConfig, diagram::render, schema::SchemaGraph};
//!
//! let dot = render(&SchemaGraph::default(), &DiagramConfig::default());
//! assert!(dot.starts_with("digraph ERD {"));
//! assert!(dot.ends_with('}'));
//! ```

use crate::{
    config::DiagramConfig,
    schema::{Edge, EdgeOrigin, SchemaGraph, Table}
};

const RECORD_NODE: &str = "  node [shape=record, style=\"rounded,filled\", fillcolor=\"#F6F8FA\", \
                           color=\"#9AA0A6\", fontname=\"Helvetica\", fontsize=10];";
const BOX_NODE: &str = "  node [shape=box, style=\"rounded,filled\", fillcolor=\"#F6F8FA\", \
                        color=\"#9AA0A6\", fontname=\"Helvetica\", fontsize=11];";
const EDGE_STYLE: &str =
    "  edge [color=\"#9AA0A6\", arrowsize=0.7, fontname=\"Helvetica\", fontsize=9];";

/// DOT keywords, reserved in any letter case
const DOT_KEYWORDS: [&str; 6] = ["node", "edge", "graph", "digraph", "subgraph", "strict"];

/// Placeholder field for tables without columns
pub const EMPTY_FIELDS: &str = "(no columns)";

/// Render the graph as a DOT digraph.
pub fn render(graph: &SchemaGraph, options: &DiagramConfig) -> String {
    let mut lines: Vec<String> = vec![
        String::from("digraph ERD {"),
        String::from("  rankdir=LR;"),
        String::from("  bgcolor=white;"),
        String::from(if options.include_columns {
            RECORD_NODE
        } else {
            BOX_NODE
        }),
        String::from(EDGE_STYLE),
    ];
    lines.extend(graph.tables.iter().map(|t| node_statement(t, options)));
    lines.extend(missing_endpoints(graph).into_iter().map(|name| {
        format!(
            "  {} [label=\"{}\", style=dashed];",
            sanitize_identifier(name),
            escape_label(name)
        )
    }));
    lines.extend(graph.edges.iter().map(|e| edge_statement(e, options)));
    lines.push(String::from("}"));
    lines.join("\n")
}

fn node_statement(table: &Table, options: &DiagramConfig) -> String {
    let id = sanitize_identifier(&table.name);
    if !options.include_columns {
        return format!("  {} [label=\"{}\"];", id, escape_label(&table.name));
    }
    let limit = match options.max_columns {
        0 => usize::MAX,
        n => n
    };
    let mut fields: Vec<String> = table
        .columns
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, c)| {
            format!(
                "<f{}> {}: {}",
                i,
                escape_record(&c.name),
                escape_record(&c.data_type)
            )
        })
        .collect();
    if fields.is_empty() {
        fields.push(escape_record(EMPTY_FIELDS));
    }
    format!(
        "  {} [label=\"{{{}|{}}}\"];",
        id,
        escape_record(&table.name),
        fields.join("|")
    )
}

/// Edge destinations the catalog does not list, in edge order without repeats.
fn missing_endpoints(graph: &SchemaGraph) -> Vec<&str> {
    let mut missing: Vec<&str> = Vec::new();
    for edge in &graph.edges {
        let name = edge.destination.as_str();
        if graph.table(name).is_none() && !missing.contains(&name) {
            missing.push(name);
        }
    }
    missing
}

fn edge_statement(edge: &Edge, options: &DiagramConfig) -> String {
    let style = if options.dashed_inferred && edge.origin == EdgeOrigin::Inferred {
        ", style=dashed"
    } else {
        ""
    };
    format!(
        "  {} -> {} [label=\"{}\"{}];",
        sanitize_identifier(&edge.source),
        sanitize_identifier(&edge.destination),
        escape_label(&edge.label),
        style
    )
}

/// Make a name usable as a bare DOT identifier.
///
/// Characters outside `[A-Za-z0-9_]` become `_`; a leading digit gets a `_`
/// prefix and a DOT keyword (`node`, `Graph`, ...) a `_` suffix.
pub fn sanitize_identifier(name: &str) -> String {
    let mut id: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if id.is_empty() || id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert(0, '_');
    }
    if DOT_KEYWORDS.iter().any(|k| id.eq_ignore_ascii_case(k)) {
        id.push('_');
    }
    id
}

fn escape_label(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_record(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '{' | '}' | '|' | '<' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn graph() -> SchemaGraph {
        let mut players = Table::new("players");
        players.columns = vec![
            Column::new("id", "INTEGER"),
            Column::new("name", "TEXT"),
            Column::new("team_id", "INTEGER"),
        ];
        let mut teams = Table::new("team-list");
        teams.columns = vec![Column::new("id", "INTEGER")];
        SchemaGraph {
            tables: vec![players, teams, Table::new("audit")],
            edges:  vec![Edge {
                source:      "players".into(),
                destination: "team-list".into(),
                label:       "team_id".into(),
                origin:      EdgeOrigin::Inferred
            }]
        }
    }

    #[test]
    fn test_render_with_fields() {
        let dot = render(&graph(), &DiagramConfig::default());
        let lines: Vec<&str> = dot.lines().collect();
        assert_eq!(lines[0], "digraph ERD {");
        assert_eq!(lines[3], RECORD_NODE);
        assert_eq!(
            lines[5],
            "  players [label=\"{players|<f0> id: INTEGER|<f1> name: TEXT|<f2> team_id: INTEGER}\"];"
        );
        assert_eq!(lines[6], "  team_list [label=\"{team-list|<f0> id: INTEGER}\"];");
        assert_eq!(lines[7], "  audit [label=\"{audit|(no columns)}\"];");
        assert_eq!(lines[8], "  players -> team_list [label=\"team_id\"];");
        assert_eq!(lines[9], "}");
    }

    #[test]
    fn test_render_names_only() {
        let options = DiagramConfig {
            include_columns: false,
            ..DiagramConfig::default()
        };
        let dot = render(&graph(), &options);
        assert!(dot.contains(BOX_NODE));
        assert!(dot.contains("  team_list [label=\"team-list\"];"));
        assert!(!dot.contains("<f0>"));
    }

    #[test]
    fn test_render_bounds_fields() {
        let options = DiagramConfig {
            max_columns: 2,
            ..DiagramConfig::default()
        };
        let dot = render(&graph(), &options);
        assert!(dot.contains("<f1> name: TEXT}"));
        assert!(!dot.contains("team_id: INTEGER"));
    }

    #[test]
    fn test_render_dashed_inferred() {
        let options = DiagramConfig {
            dashed_inferred: true,
            ..DiagramConfig::default()
        };
        let dot = render(&graph(), &options);
        assert!(dot.contains("  players -> team_list [label=\"team_id\", style=dashed];"));
    }

    #[test]
    fn test_render_missing_destination_as_placeholder() {
        let graph = SchemaGraph {
            tables: vec![Table::new("games")],
            edges:  vec![Edge {
                source:      "games".into(),
                destination: "venues".into(),
                label:       "venue->id".into(),
                origin:      EdgeOrigin::Declared
            }]
        };
        let dot = render(&graph, &DiagramConfig::default());
        let lines: Vec<&str> = dot.lines().collect();
        assert_eq!(lines[6], "  venues [label=\"venues\", style=dashed];");
        assert_eq!(lines[7], "  games -> venues [label=\"venue->id\"];");
    }

    #[test]
    fn test_render_is_deterministic() {
        let options = DiagramConfig::default();
        assert_eq!(render(&graph(), &options), render(&graph(), &options));
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("team-list"), "team_list");
        assert_eq!(sanitize_identifier("2024 stats"), "_2024_stats");
        assert_eq!(sanitize_identifier(""), "_");
        assert_eq!(sanitize_identifier("Node"), "Node_");
        assert_eq!(sanitize_identifier("strict"), "strict_");
        assert_eq!(sanitize_identifier("nodes"), "nodes");
    }

    #[test]
    fn test_render_keyword_table_names() {
        let mut node = Table::new("node");
        node.columns = vec![Column::new("id", "INTEGER")];
        let graph = SchemaGraph {
            tables: vec![Table::new("edge"), node],
            edges:  vec![Edge {
                source:      "edge".into(),
                destination: "node".into(),
                label:       "node_id".into(),
                origin:      EdgeOrigin::Inferred
            }]
        };
        let dot = render(&graph, &DiagramConfig::default());
        assert!(dot.contains("  edge_ [label=\"{edge|(no columns)}\"];"));
        assert!(dot.contains("  node_ [label=\"{node|<f0> id: INTEGER}\"];"));
        assert!(dot.contains("  edge_ -> node_ [label=\"node_id\"];"));
    }

    #[test]
    fn test_escape_record() {
        assert_eq!(escape_record("VARCHAR<10>"), "VARCHAR\\<10\\>");
        assert_eq!(escape_record("a|b"), "a\\|b");
    }
}
