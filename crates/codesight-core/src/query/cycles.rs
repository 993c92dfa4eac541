//! Enumeration of every simple import cycle between project modules.
//!
//! Cycles are found with Johnson's circuit search inside each strongly
//! connected component. Each cycle is reported once, rotated so that its
//! smallest path comes first.

use std::collections::BTreeSet;

use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tracing::{debug, warn};

use crate::indexer::graph::ModuleGraph;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleSeverity {
    Critical,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub path: Vec<String>,
    pub length: usize,
    pub severity: CycleSeverity,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub cycles: Vec<Cycle>,
    pub critical: usize,
    pub warnings: usize,
    /// Enumeration stopped at the cycle cap.
    pub truncated: bool,
}

pub fn severity_for(length: usize, critical_length: usize) -> CycleSeverity {
    if length <= critical_length {
        CycleSeverity::Critical
    } else {
        CycleSeverity::Warning
    }
}

/// Rotate so the smallest element leads.
pub fn canonical_rotation(path: &[String]) -> Vec<String> {
    let Some((start, _)) = path.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)) else {
        return Vec::new();
    };
    path[start..].iter().chain(path[..start].iter()).cloned().collect()
}

struct CircuitSearch<'a> {
    adjacency: &'a [Vec<usize>],
    blocked: Vec<bool>,
    blocked_by: Vec<Vec<usize>>,
    stack: Vec<usize>,
    start: usize,
    found: Vec<Vec<usize>>,
    budget: usize,
}

impl<'a> CircuitSearch<'a> {
    fn new(adjacency: &'a [Vec<usize>], budget: usize) -> Self {
        let n = adjacency.len();
        Self {
            adjacency,
            blocked: vec![false; n],
            blocked_by: vec![Vec::new(); n],
            stack: Vec::new(),
            start: 0,
            found: Vec::new(),
            budget,
        }
    }

    fn exhausted(&self) -> bool {
        self.found.len() >= self.budget
    }

    fn unblock(&mut self, node: usize) {
        self.blocked[node] = false;
        while let Some(waiting) = self.blocked_by[node].pop() {
            if self.blocked[waiting] {
                self.unblock(waiting);
            }
        }
    }

    fn circuit(&mut self, node: usize) -> bool {
        let adjacency = self.adjacency;
        let mut closed = false;
        self.stack.push(node);
        self.blocked[node] = true;

        for &next in &adjacency[node] {
            if next < self.start || self.exhausted() {
                continue;
            }
            if next == self.start {
                self.found.push(self.stack.clone());
                closed = true;
            } else if !self.blocked[next] && self.circuit(next) {
                closed = true;
            }
        }

        if closed {
            self.unblock(node);
        } else {
            for &next in &adjacency[node] {
                if next >= self.start && !self.blocked_by[next].contains(&node) {
                    self.blocked_by[next].push(node);
                }
            }
        }
        self.stack.pop();
        closed
    }

    /// Circuits of the component, each starting at its least local index.
    fn run(mut self) -> Vec<Vec<usize>> {
        for start in 0..self.adjacency.len() {
            if self.exhausted() {
                break;
            }
            self.start = start;
            for flag in self.blocked.iter_mut().skip(start) {
                *flag = false;
            }
            for waiting in self.blocked_by.iter_mut().skip(start) {
                waiting.clear();
            }
            self.circuit(start);
        }
        self.found
    }
}

/// Enumerate all simple cycles over in-project modules.
pub fn find_cycles(graph: &ModuleGraph, critical_length: usize, max_cycles: usize) -> CycleReport {
    let g = &graph.graph;
    let mut raw: Vec<Vec<NodeIndex>> = Vec::new();

    for idx in graph.modules() {
        if g.find_edge(idx, idx).is_some() {
            raw.push(vec![idx]);
        }
    }

    // A skipped multi-node component always holds at least one circuit.
    let mut skipped_component = false;
    for mut component in tarjan_scc(g) {
        if component.len() < 2 || !component.iter().all(|&idx| g[idx].is_module()) {
            continue;
        }
        if raw.len() >= max_cycles {
            skipped_component = true;
            continue;
        }
        component.sort();
        let local = |idx: NodeIndex| component.binary_search(&idx).ok();
        let adjacency: Vec<Vec<usize>> = component
            .iter()
            .map(|&idx| {
                let mut next: Vec<usize> = g
                    .edges(idx)
                    .filter(|e| e.target() != idx)
                    .filter_map(|e| local(e.target()))
                    .collect();
                next.sort_unstable();
                next.dedup();
                next
            })
            .collect();
        // One past the cap so a completed search is told apart from a cut one.
        let budget = max_cycles - raw.len() + 1;
        let circuits = CircuitSearch::new(&adjacency, budget).run();
        debug!(component = component.len(), circuits = circuits.len(), "component searched");
        raw.extend(
            circuits
                .into_iter()
                .map(|c| c.into_iter().map(|i| component[i]).collect()),
        );
    }

    let truncated = skipped_component || raw.len() > max_cycles;
    if truncated {
        warn!(max_cycles, "cycle enumeration truncated");
    }
    raw.truncate(max_cycles);

    let unique: BTreeSet<(usize, Vec<String>)> = raw
        .into_iter()
        .map(|nodes| {
            let keys: Vec<String> = nodes.iter().map(|&idx| graph.key(idx)).collect();
            let path = canonical_rotation(&keys);
            (path.len(), path)
        })
        .collect();

    let cycles: Vec<Cycle> = unique
        .into_iter()
        .map(|(length, path)| {
            let mut closed = path.clone();
            if let Some(first) = path.first() {
                closed.push(first.clone());
            }
            Cycle {
                description: format!("Circular dependency: {}", closed.join(" -> ")),
                severity: severity_for(length, critical_length),
                length,
                path,
            }
        })
        .collect();

    let critical = cycles
        .iter()
        .filter(|c| c.severity == CycleSeverity::Critical)
        .count();
    CycleReport {
        warnings: cycles.len() - critical,
        critical,
        cycles,
        truncated,
    }
}
