//! Relationship inference over catalog metadata.
//!
//! Edge sources, in order:
//!
//! 1. Declared foreign keys (`owner -> referenced`, label `from->to`)
//! 2. Central entity links: every table carrying `<entity>id` /
//!    `<entity>_id` points at the table named after the entity
//! 3. Generic `<base>_id` / `<base>id` columns pointing at a table named
//!    `<base>` or `<base>s`
//!
//! Edges are keyed by `(source, destination, label)`. A declared edge keeps
//! its origin when a heuristic produces the same key.
//!
//! Table names compare case-insensitively, as in SQLite. A declared reference
//! is rewritten to the catalog's spelling of the table; a reference to a table
//! the catalog does not list keeps its spelling and is reported as a
//! diagnostic on the owning table.

use std::collections::BTreeMap;

use compact_str::CompactString;
use indexmap::IndexMap;
use rayon::prelude::*;

use super::{Edge, EdgeOrigin, IntrospectionError, IntrospectionStage, SchemaGraph, Table};
use crate::{catalog::Catalog, config::InferenceConfig};

type EdgeKey = (CompactString, CompactString, CompactString);

/// Introspect the catalog and build the relationship graph.
///
/// Tables are fetched in parallel and ordered by name. A table whose columns
/// or foreign keys cannot be read is still part of the graph, with the failure
/// recorded in [`Table::diagnostics`].
///
/// # Errors
///
/// Returns [`IntrospectionError`] only when the table list itself cannot be
/// read.
pub fn build_graph(
    catalog: &dyn Catalog,
    config: &InferenceConfig
) -> Result<SchemaGraph, IntrospectionError> {
    let mut names = catalog.list_tables()?;
    names.sort();
    names.dedup();
    let mut tables: Vec<Table> = names
        .into_par_iter()
        .map(|name| introspect_table(catalog, name))
        .collect();
    flag_dangling_references(&mut tables);
    let edges = infer_edges(&tables, config);
    tracing::debug!(
        tables = tables.len(),
        edges = edges.len(),
        "built schema graph"
    );
    Ok(SchemaGraph {
        tables,
        edges
    })
}

fn introspect_table(catalog: &dyn Catalog, name: CompactString) -> Table {
    let mut table = Table::new(name);
    match catalog.columns(&table.name) {
        Ok(columns) => table.columns = columns,
        Err(err) => {
            tracing::warn!(table = %table.name, error = %err, "column introspection failed");
            table.diagnostics.push(err);
        }
    }
    match catalog.foreign_keys(&table.name) {
        Ok(keys) => table.foreign_keys = keys.into_iter().collect(),
        Err(err) => {
            tracing::warn!(table = %table.name, error = %err, "foreign key introspection failed");
            table.diagnostics.push(err);
        }
    }
    table
}

fn flag_dangling_references(tables: &mut [Table]) {
    let known: Vec<String> = tables.iter().map(|t| t.name.as_str().to_lowercase()).collect();
    for table in tables.iter_mut() {
        let missing: Vec<CompactString> = table
            .foreign_keys
            .iter()
            .filter(|fk| !known.contains(&fk.ref_table.as_str().to_lowercase()))
            .map(|fk| fk.ref_table.clone())
            .collect();
        for ref_table in missing {
            tracing::warn!(table = %table.name, references = %ref_table, "dangling foreign key");
            table.diagnostics.push(IntrospectionError::new(
                Some(table.name.as_str()),
                IntrospectionStage::ForeignKeys,
                format!("referenced table {} does not exist", ref_table)
            ));
        }
    }
}

/// Derive the sorted, deduplicated edge set for the given tables.
pub fn infer_edges(tables: &[Table], config: &InferenceConfig) -> Vec<Edge> {
    let mut by_name: IndexMap<String, &Table> = IndexMap::with_capacity(tables.len());
    for table in tables {
        by_name.entry(table.name.as_str().to_lowercase()).or_insert(table);
    }

    let mut edges: BTreeMap<EdgeKey, EdgeOrigin> = BTreeMap::new();
    for table in tables {
        for fk in &table.foreign_keys {
            let destination = by_name
                .get(&fk.ref_table.as_str().to_lowercase())
                .map_or(&fk.ref_table, |target| &target.name);
            if destination.eq_ignore_ascii_case(&table.name) {
                tracing::debug!(
                    table = %table.name,
                    column = %fk.from_column,
                    "skipping self-referencing foreign key"
                );
                continue;
            }
            edges.insert(
                (table.name.clone(), destination.clone(), fk.label()),
                EdgeOrigin::Declared
            );
        }
    }

    let mut add_inferred = |source: &Table, destination: &Table, label: &CompactString| {
        if source.name == destination.name {
            return;
        }
        edges
            .entry((source.name.clone(), destination.name.clone(), label.clone()))
            .or_insert(EdgeOrigin::Inferred);
    };

    let entity = config.central_entity.trim().to_lowercase();
    if let Some(central) = find_central_table(tables, &entity) {
        let keys = [format!("{}id", entity), format!("{}_id", entity)];
        for table in tables {
            for column in &table.columns {
                if keys.contains(&column.name.as_str().to_lowercase()) {
                    add_inferred(table, central, &column.name);
                }
            }
        }
    }

    for table in tables {
        for column in &table.columns {
            let Some(base) = id_base(&column.name) else {
                continue;
            };
            for candidate in [base.clone(), format!("{}s", base)] {
                if let Some(target) = by_name.get(&candidate) {
                    add_inferred(table, *target, &column.name);
                }
            }
        }
    }

    edges
        .into_iter()
        .map(|((source, destination, label), origin)| Edge {
            source,
            destination,
            label,
            origin
        })
        .collect()
}

/// Table the central entity lives in.
///
/// Candidates are the entity name and its plural; for each candidate an exact
/// (case-insensitive) name match wins over a table merely containing it.
fn find_central_table<'a>(tables: &'a [Table], entity: &str) -> Option<&'a Table> {
    if entity.is_empty() {
        return None;
    }
    for candidate in [entity.to_string(), format!("{}s", entity)] {
        if let Some(table) = tables
            .iter()
            .find(|t| t.name.as_str().to_lowercase() == candidate)
            .or_else(|| {
                tables
                    .iter()
                    .find(|t| t.name.as_str().to_lowercase().contains(&candidate))
            })
        {
            return Some(table);
        }
    }
    None
}

/// Lower-cased base of an id column: `team_id` → `team`, `playerID` → `player`.
fn id_base(column: &str) -> Option<String> {
    let lower = column.to_lowercase();
    let base = lower
        .strip_suffix("_id")
        .or_else(|| lower.strip_suffix("id"))?;
    (!base.is_empty()).then(|| base.to_string())
}
