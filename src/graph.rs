//! Scheme Dependency Graph
//!
//! Name-level view of which schemes reference which, built on petgraph.
//! Used to detect cycles between scheme names and to export DOT.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

use crate::scheme::ObjectScheme;

/// Directed graph of scheme names; an edge `a -> b` means some shape in
/// `a` references an object of `b`
#[derive(Debug, Default)]
pub struct SchemeGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl SchemeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Add `from` with an edge to every named target
    pub fn add_edges(&mut self, from: &str, targets: impl IntoIterator<Item = String>) {
        let from_idx = self.node(from);
        for target in targets {
            let to_idx = self.node(&target);
            if self.graph.find_edge(from_idx, to_idx).is_none() {
                self.graph.add_edge(from_idx, to_idx, ());
            }
        }
    }

    /// Add a scheme and its external references
    pub fn add_scheme(&mut self, scheme: &ObjectScheme) {
        let targets: Vec<String> = scheme
            .refs()
            .filter_map(|r| r.scheme.clone())
            .collect();
        self.add_edges(&scheme.name, targets);
    }

    /// Add every scheme and edge of `other`
    pub fn merge(&mut self, other: &SchemeGraph) {
        for idx in other.graph.node_indices() {
            self.node(&other.graph[idx]);
        }
        for edge in other.graph.edge_references() {
            let from = other.graph[edge.source()].clone();
            self.add_edges(&from, [other.graph[edge.target()].clone()]);
        }
    }

    pub fn scheme_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Names of the schemes `name` references directly
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        let Some(idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut targets: Vec<NodeIndex> = self.graph.edges(*idx).map(|e| e.target()).collect();
        targets.sort();
        targets.iter().map(|t| self.graph[*t].as_str()).collect()
    }

    /// Groups of two or more schemes that reach each other by name.
    ///
    /// Members are listed in insertion order; groups are ordered by their
    /// first member.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut groups: Vec<Vec<NodeIndex>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .collect();
        groups.sort_by_key(|scc| scc[0]);
        groups
            .into_iter()
            .map(|scc| scc.into_iter().map(|idx| self.graph[idx].clone()).collect())
            .collect()
    }

    /// Render the graph in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph SchemeGraph {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str(
            "  node [shape=box, style=rounded, fontname=\"Helvetica\", fontsize=10];\n",
        );

        let cyclic: Vec<String> = self.cycles().into_iter().flatten().collect();
        for idx in self.graph.node_indices() {
            let name = &self.graph[idx];
            let color = if cyclic.contains(name) { "#F44336" } else { "#607D8B" };
            output.push_str(&format!("  \"{}\" [color=\"{}\"];\n", name, color));
        }
        for edge in self.graph.edge_references() {
            output.push_str(&format!(
                "  \"{}\" -> \"{}\";\n",
                self.graph[edge.source()],
                self.graph[edge.target()]
            ));
        }
        output.push_str("}\n");
        output
    }
}
