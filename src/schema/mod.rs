//! # Graph Schemas
//!
//! A [`SchemaGraph`] is the label-level shape of a property graph: the node
//! labels it may contain and the `(from_label, label, to_label)` edge types
//! between them. Base graphs get their schema from `CREATE NODE` / `CREATE EDGE`
//! declarations, views derive theirs at compile time. The same structure is
//! used for the type graph of a pattern when checking SSR index coverage.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One edge type of a schema graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeType {
    pub from: String,
    pub label: String,
    pub to: String,
}

impl EdgeType {
    pub fn new(from: &str, label: &str, to: &str) -> Self {
        EdgeType {
            from: from.to_string(),
            label: label.to_string(),
            to: to.to_string(),
        }
    }
}

/// Node labels and edge types of one graph, view or pattern
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaGraph {
    pub node_labels: BTreeSet<String>,
    pub edge_types: BTreeSet<EdgeType>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, label: &str) -> bool {
        self.node_labels.insert(label.to_string())
    }

    /// Add an edge type; its endpoint labels become node labels too
    pub fn add_edge(&mut self, from: &str, label: &str, to: &str) -> bool {
        self.node_labels.insert(from.to_string());
        self.node_labels.insert(to.to_string());
        self.edge_types.insert(EdgeType::new(from, label, to))
    }

    pub fn is_empty(&self) -> bool {
        self.node_labels.is_empty() && self.edge_types.is_empty()
    }

    pub fn has_node_label(&self, label: &str) -> bool {
        self.node_labels.contains(label)
    }

    pub fn has_edge_label(&self, label: &str) -> bool {
        self.edge_types.iter().any(|e| e.label == label)
    }

    /// Edge types whose label is `label`
    pub fn edge_types_labelled<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a EdgeType> + 'a {
        self.edge_types.iter().filter(move |e| e.label == label)
    }

    /// Structural subset test: every node label and edge type of `self` occurs in `other`
    pub fn is_subgraph_of(&self, other: &SchemaGraph) -> bool {
        self.node_labels.is_subset(&other.node_labels) && self.edge_types.is_subset(&other.edge_types)
    }

    pub fn merge(&mut self, other: &SchemaGraph) {
        self.node_labels.extend(other.node_labels.iter().cloned());
        self.edge_types.extend(other.edge_types.iter().cloned());
    }
}

/// Schema graphs of every base graph and view in a workspace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    graphs: BTreeMap<String, SchemaGraph>,
}

impl SchemaCatalog {
    /// Create a new empty schema catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a graph or view name; an existing schema is kept
    pub fn register(&mut self, name: &str) -> &mut SchemaGraph {
        self.graphs.entry(name.to_string()).or_default()
    }

    pub fn insert(&mut self, name: &str, schema: SchemaGraph) {
        self.graphs.insert(name.to_string(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaGraph> {
        self.graphs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.graphs.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<SchemaGraph> {
        self.graphs.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_edge_adds_endpoints() {
        let mut schema = SchemaGraph::new();
        schema.add_edge("Person", "Knows", "Person");
        assert!(schema.has_node_label("Person"));
        assert!(schema.has_edge_label("Knows"));
        assert!(!schema.has_edge_label("WorksFor"));
    }

    #[test]
    fn test_subgraph() {
        let mut big = SchemaGraph::new();
        big.add_edge("Person", "Knows", "Person");
        big.add_edge("Person", "WorksFor", "Company");

        let mut small = SchemaGraph::new();
        small.add_edge("Person", "Knows", "Person");
        assert!(small.is_subgraph_of(&big));
        assert!(!big.is_subgraph_of(&small));
    }

    #[test]
    fn test_catalog_register_keeps_existing() {
        let mut catalog = SchemaCatalog::new();
        catalog.register("g").add_node("Person");
        catalog.register("g");
        assert!(catalog.get("g").unwrap().has_node_label("Person"));
    }
}
