//! Module graph construction over resolved import edges.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::models::{CodeModel, ImportEdge, ImportTarget};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ModuleNode {
    Module { path: String },
    External { package: String },
}

impl ModuleNode {
    pub fn key(&self) -> String {
        match self {
            ModuleNode::Module { path } => path.clone(),
            ModuleNode::External { package } => format!("external:{package}"),
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, ModuleNode::Module { .. })
    }
}

/// One deduplicated `(from, to)` dependency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModuleEdge {
    /// First import line in the importing file.
    pub line: u32,
    pub symbols: Vec<String>,
    pub imports: usize,
}

/// Directed module graph keyed by resolved path.
#[derive(Clone, Debug, Default)]
pub struct ModuleGraph {
    pub graph: DiGraph<ModuleNode, ModuleEdge>,
    index: HashMap<String, NodeIndex>,
    /// Edges whose in-project target failed to parse.
    pub dangling: Vec<ImportEdge>,
    pub unresolved: Vec<ImportEdge>,
}

impl ModuleGraph {
    /// Build the graph from a code model. External pseudo-nodes are only
    /// added when `include_external` is set.
    pub fn build(model: &CodeModel, include_external: bool) -> Self {
        let mut graph = DiGraph::<ModuleNode, ModuleEdge>::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();

        for file in &model.files {
            let key = file.path().to_string();
            let idx = graph.add_node(ModuleNode::Module { path: key.clone() });
            index.insert(key, idx);
        }

        if include_external {
            let packages: BTreeSet<&str> = model
                .edges
                .iter()
                .filter_map(|e| match &e.to {
                    ImportTarget::External { package } => Some(package.as_str()),
                    _ => None,
                })
                .collect();
            for package in packages {
                let node = ModuleNode::External {
                    package: package.to_string(),
                };
                let idx = graph.add_node(node.clone());
                index.insert(node.key(), idx);
            }
        }

        let failed: HashSet<&str> = model.failures.iter().map(|f| f.path.as_str()).collect();
        let mut dangling = Vec::new();
        let mut unresolved = Vec::new();

        for edge in &model.edges {
            let Some(&from) = index.get(&edge.from) else {
                continue;
            };
            let target_key = match &edge.to {
                ImportTarget::InProject { path } => {
                    if failed.contains(path.as_str()) {
                        dangling.push(edge.clone());
                        continue;
                    }
                    path.clone()
                }
                ImportTarget::External { package } => format!("external:{package}"),
                ImportTarget::Unresolved { .. } => {
                    unresolved.push(edge.clone());
                    continue;
                }
            };
            let Some(&to) = index.get(&target_key) else {
                continue;
            };
            match graph.find_edge(from, to) {
                Some(existing) => {
                    let weight = &mut graph[existing];
                    weight.imports += 1;
                    weight.line = weight.line.min(edge.line);
                    for symbol in &edge.symbols {
                        if !weight.symbols.contains(symbol) {
                            weight.symbols.push(symbol.clone());
                        }
                    }
                }
                None => {
                    graph.add_edge(
                        from,
                        to,
                        ModuleEdge {
                            line: edge.line,
                            symbols: edge.symbols.clone(),
                            imports: 1,
                        },
                    );
                }
            }
        }

        ModuleGraph {
            graph,
            index,
            dangling,
            unresolved,
        }
    }

    pub fn node(&self, key: &str) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    pub fn key(&self, idx: NodeIndex) -> String {
        self.graph[idx].key()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// In-project module nodes in discovery order.
    pub fn modules(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_module())
    }

    pub fn module_count(&self) -> usize {
        self.modules().count()
    }

    pub fn fan_in(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    pub fn fan_out(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
    }

    /// Targets of `idx` in ascending node order.
    pub fn dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Outgoing)
    }

    pub fn dependents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Incoming)
    }

    fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Induced subgraph over the nodes whose key is in `keep`. Node and edge
    /// order is preserved.
    pub fn restricted(&self, keep: &HashSet<String>) -> ModuleGraph {
        let graph = self.graph.filter_map(
            |_, node| keep.contains(&node.key()).then(|| node.clone()),
            |_, edge| Some(edge.clone()),
        );
        let index = graph
            .node_indices()
            .map(|idx| (graph[idx].key(), idx))
            .collect();
        let from_kept = |edges: &[ImportEdge]| -> Vec<ImportEdge> {
            edges
                .iter()
                .filter(|e| keep.contains(&e.from))
                .cloned()
                .collect()
        };
        ModuleGraph {
            graph,
            index,
            dangling: from_kept(&self.dangling),
            unresolved: from_kept(&self.unresolved),
        }
    }

    /// Dependency edges as `(from, to)` key pairs, in edge insertion order.
    pub fn edge_pairs(&self) -> Vec<(String, String)> {
        self.graph
            .edge_references()
            .map(|e| (self.key(e.source()), self.key(e.target())))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::indexer::pipeline::build_code_model_from_sources;

    pub(crate) fn model(sources: &[(&str, &str)]) -> CodeModel {
        let owned: Vec<(String, Vec<u8>)> = sources
            .iter()
            .map(|(p, s)| (p.to_string(), s.as_bytes().to_vec()))
            .collect();
        build_code_model_from_sources("proj", owned, 2)
    }

    #[test]
    fn test_edges_are_deduplicated() {
        let model = model(&[
            ("a.py", "import b\nfrom b import x\nfrom b import y, x\n"),
            ("b.py", "x = 1\ny = 2\n"),
        ]);
        let graph = ModuleGraph::build(&model, false);
        assert_eq!(graph.graph.edge_count(), 1);
        let edge = graph.graph.edge_weights().next().unwrap();
        assert_eq!(edge.imports, 3);
        assert_eq!(edge.line, 1);
        assert_eq!(edge.symbols, vec!["x", "y"]);
    }

    #[test]
    fn test_external_nodes_only_when_requested() {
        let model = model(&[("a.py", "import requests\nimport os.path\n")]);
        assert_eq!(ModuleGraph::build(&model, false).node_count(), 1);
        let graph = ModuleGraph::build(&model, true);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.module_count(), 1);
        assert!(graph.node("external:os").is_some());
        assert_eq!(graph.fan_out(graph.node("a.py").unwrap()), 2);
    }

    #[test]
    fn test_edges_to_failed_files_are_dangling() {
        let model = model(&[("a.py", "import broken\n"), ("broken.py", "def (:\n")]);
        let graph = ModuleGraph::build(&model, false);
        assert_eq!(graph.graph.edge_count(), 0);
        assert_eq!(graph.dangling.len(), 1);
        assert!(graph.node("broken.py").is_none());
    }

    #[test]
    fn test_restricted_keeps_induced_edges() {
        let model = model(&[
            ("a.py", "import b\n"),
            ("b.py", "import c\n"),
            ("c.py", "import a\n"),
        ]);
        let graph = ModuleGraph::build(&model, false);
        let keep: HashSet<String> = ["a.py", "b.py"].iter().map(|s| s.to_string()).collect();
        let sub = graph.restricted(&keep);
        assert_eq!(sub.node_count(), 2);
        assert_eq!(sub.edge_pairs(), vec![("a.py".to_string(), "b.py".to_string())]);
        let b = sub.node("b.py").unwrap();
        assert_eq!((sub.fan_in(b), sub.fan_out(b)), (1, 0));
        assert!(sub.node("c.py").is_none());
    }

    #[test]
    fn test_self_import_is_a_self_loop() {
        let model = model(&[("pkg/__init__.py", ""), ("pkg/a.py", "import pkg.a\n")]);
        let graph = ModuleGraph::build(&model, false);
        let a = graph.node("pkg/a.py").unwrap();
        assert_eq!(graph.dependencies(a), vec![a]);
        assert_eq!(graph.fan_in(a), 1);
    }
}
