//! Coupling metrics, hotspots and depth-limited views of the module graph.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::debug;

use crate::config::{DependencyOptions, TraversalDirection};
use crate::errors::{CodesightError, CodesightResult};
use crate::indexer::graph::ModuleGraph;
use crate::models::CodeModel;
use crate::query::cycles::{find_cycles, CycleReport};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCoupling {
    pub path: String,
    pub module_type: String,
    pub fan_in: usize,
    pub fan_out: usize,
    pub instability: f64,
    pub centrality: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetrics {
    pub total_modules: usize,
    pub avg_dependencies: f64,
    pub max_dependencies: usize,
    pub coupling: f64,
    pub cohesion: f64,
    pub stability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub path: String,
    pub fan_in: usize,
    pub fan_out: usize,
    pub centrality: f64,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GraphEdgeView {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusView {
    pub focus: String,
    pub depth: usize,
    /// Reachable keys with their hop distance, in BFS order.
    pub nodes: Vec<(String, usize)>,
    pub edges: Vec<GraphEdgeView>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySummary {
    pub total_modules: usize,
    pub total_dependencies: usize,
    pub average_dependencies: f64,
    pub circular_count: usize,
    pub unresolved_imports: usize,
    pub dangling_imports: usize,
    pub skipped_files: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReport {
    pub project: String,
    pub nodes: Vec<ModuleCoupling>,
    /// Edge list for diagram renderers; only filled when requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<GraphEdgeView>,
    pub circular: Option<CycleReport>,
    pub metrics: Option<GraphMetrics>,
    pub hotspots: Vec<Hotspot>,
    pub focus: Option<FocusView>,
    pub summary: DependencySummary,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Coupling
// ---------------------------------------------------------------------------

/// Share of outgoing edges; 0 for an isolated module.
pub fn instability(fan_in: usize, fan_out: usize) -> f64 {
    let total = fan_in + fan_out;
    if total == 0 {
        0.0
    } else {
        fan_out as f64 / total as f64
    }
}

/// Coarse module role from its path.
pub fn classify_module(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    if lower.contains("test") {
        "test"
    } else if lower.contains("util") || lower.contains("helper") {
        "utility"
    } else if lower.contains("model") {
        "model"
    } else if lower.contains("view") || lower.contains("api") {
        "api"
    } else if lower.contains("service") {
        "service"
    } else if lower.contains("__init__") {
        "package"
    } else {
        "module"
    }
}

pub fn module_coupling(graph: &ModuleGraph) -> Vec<ModuleCoupling> {
    let node_count = graph.node_count().max(1) as f64;
    graph
        .graph
        .node_indices()
        .map(|idx| {
            let key = graph.key(idx);
            let (fan_in, fan_out) = (graph.fan_in(idx), graph.fan_out(idx));
            let module_type = if graph.graph[idx].is_module() {
                classify_module(&key)
            } else {
                "external"
            };
            ModuleCoupling {
                module_type: module_type.to_string(),
                fan_in,
                fan_out,
                instability: instability(fan_in, fan_out),
                centrality: (fan_in + fan_out) as f64 / node_count,
                path: key,
            }
        })
        .collect()
}

pub fn graph_metrics(graph: &ModuleGraph) -> GraphMetrics {
    let n = graph.node_count();
    if n == 0 {
        return GraphMetrics::default();
    }
    let indices: Vec<NodeIndex> = graph.graph.node_indices().collect();
    let ins: Vec<usize> = indices.iter().map(|&i| graph.fan_in(i)).collect();
    let outs: Vec<usize> = indices.iter().map(|&i| graph.fan_out(i)).collect();
    let avg_in = ins.iter().sum::<usize>() as f64 / n as f64;
    let avg_out = outs.iter().sum::<usize>() as f64 / n as f64;
    GraphMetrics {
        total_modules: n,
        avg_dependencies: (avg_in + avg_out) / 2.0,
        max_dependencies: ins.iter().chain(outs.iter()).copied().max().unwrap_or(0),
        coupling: avg_in + avg_out,
        cohesion: 1.0 / (avg_out + 1.0),
        stability: avg_out / (avg_in + avg_out + 1.0),
    }
}

/// Linear-interpolated percentile of `values`; `p` in [0, 1].
pub fn percentile(values: &[usize], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let position = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] as f64 + (sorted[upper] as f64 - sorted[lower] as f64) * fraction
}

/// Modules whose fan-in and fan-out both strictly exceed the given
/// percentile of their distribution across project modules.
pub fn find_hotspots(graph: &ModuleGraph, percentile_rank: f64) -> Vec<Hotspot> {
    let modules: Vec<NodeIndex> = graph.modules().collect();
    let ins: Vec<usize> = modules.iter().map(|&i| graph.fan_in(i)).collect();
    let outs: Vec<usize> = modules.iter().map(|&i| graph.fan_out(i)).collect();
    let in_threshold = percentile(&ins, percentile_rank);
    let out_threshold = percentile(&outs, percentile_rank);
    let node_count = graph.node_count().max(1) as f64;

    let mut hotspots: Vec<Hotspot> = modules
        .iter()
        .zip(ins.iter().zip(outs.iter()))
        .filter(|&(_, (&fan_in, &fan_out))| {
            fan_in as f64 > in_threshold && fan_out as f64 > out_threshold
        })
        .map(|(&idx, (&fan_in, &fan_out))| Hotspot {
            path: graph.key(idx),
            fan_in,
            fan_out,
            centrality: (fan_in + fan_out) as f64 / node_count,
            description: format!(
                "Hub and bottleneck: {fan_in} modules depend on it and it depends on {fan_out}"
            ),
        })
        .collect();
    hotspots.sort_by(|a, b| b.centrality.total_cmp(&a.centrality));
    debug!(
        in_threshold,
        out_threshold,
        hotspots = hotspots.len(),
        "hotspot thresholds"
    );
    hotspots
}

// ---------------------------------------------------------------------------
// Focus view
// ---------------------------------------------------------------------------

/// Breadth-first neighbourhood of `focus` within `max_depth` hops.
pub fn focus_view(
    graph: &ModuleGraph,
    focus: &str,
    max_depth: usize,
    direction: TraversalDirection,
) -> CodesightResult<FocusView> {
    let start = graph
        .node(focus)
        .ok_or_else(|| CodesightError::config(format!("focus module not in graph: {focus}")))?;

    let mut distance: HashMap<NodeIndex, usize> = HashMap::new();
    let mut order: Vec<NodeIndex> = Vec::new();
    let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
    distance.insert(start, 0);
    order.push(start);
    queue.push_back((start, 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let mut next = Vec::new();
        if matches!(
            direction,
            TraversalDirection::Dependencies | TraversalDirection::Both
        ) {
            next.extend(graph.dependencies(node));
        }
        if matches!(
            direction,
            TraversalDirection::Dependents | TraversalDirection::Both
        ) {
            next.extend(graph.dependents(node));
        }
        for neighbor in next {
            if distance.contains_key(&neighbor) {
                continue;
            }
            distance.insert(neighbor, depth + 1);
            order.push(neighbor);
            queue.push_back((neighbor, depth + 1));
        }
    }

    let kept: HashSet<String> = order.iter().map(|&i| graph.key(i)).collect();
    let edges = graph
        .edge_pairs()
        .into_iter()
        .filter(|(from, to)| kept.contains(from) && kept.contains(to))
        .map(|(from, to)| GraphEdgeView { from, to })
        .collect();

    Ok(FocusView {
        focus: focus.to_string(),
        depth: max_depth,
        nodes: order
            .into_iter()
            .map(|idx| (graph.key(idx), distance[&idx]))
            .collect(),
        edges,
    })
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

fn recommendations(
    cycles: Option<&CycleReport>,
    metrics: Option<&GraphMetrics>,
    hotspots: &[Hotspot],
) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(report) = cycles.filter(|r| !r.cycles.is_empty()) {
        out.push(format!(
            "CRITICAL: Found {} circular dependencies ({} critical). These can cause import-time errors and make code hard to maintain.",
            report.cycles.len(),
            report.critical
        ));
    }
    if let Some(metrics) = metrics.filter(|m| m.coupling > 10.0) {
        out.push(format!(
            "High coupling detected ({:.2}). Consider applying dependency inversion and interface segregation principles.",
            metrics.coupling
        ));
    }
    if !hotspots.is_empty() {
        out.push(format!(
            "Found {} hotspot modules that are both hubs and bottlenecks. Consider splitting them to reduce coupling.",
            hotspots.len()
        ));
    }
    if out.is_empty() {
        out.push("Dependency structure looks healthy.".to_string());
    }
    out
}

/// Full dependency analysis of a model. When a focus is set, coupling,
/// cycles, metrics and hotspots are computed over the focus subgraph.
pub fn analyze_dependencies(
    model: &CodeModel,
    options: &DependencyOptions,
) -> CodesightResult<DependencyReport> {
    options.validate()?;
    let full = ModuleGraph::build(model, options.include_external);

    let focus = match &options.focus {
        Some(focus) => Some(focus_view(
            &full,
            focus,
            options.focus_depth(),
            options.direction,
        )?),
        None => None,
    };
    let scoped = focus.as_ref().map(|view| {
        let keep: HashSet<String> = view.nodes.iter().map(|(k, _)| k.clone()).collect();
        full.restricted(&keep)
    });
    let graph = scoped.as_ref().unwrap_or(&full);

    let nodes = module_coupling(graph);
    let mut edges: Vec<GraphEdgeView> = graph
        .edge_pairs()
        .into_iter()
        .map(|(from, to)| GraphEdgeView { from, to })
        .collect();
    let edge_count = edges.len();
    if !options.diagram {
        edges.clear();
    }

    let circular = options
        .circular
        .then(|| find_cycles(graph, options.critical_cycle_length, options.cycle_cap()));
    let metrics = options.metrics.then(|| graph_metrics(graph));
    let hotspots = find_hotspots(graph, options.hotspot_percentile);

    let summary = DependencySummary {
        total_modules: nodes.len(),
        total_dependencies: edge_count,
        average_dependencies: edge_count as f64 / nodes.len().max(1) as f64,
        circular_count: circular.as_ref().map_or(0, |c| c.cycles.len()),
        unresolved_imports: graph.unresolved.len(),
        dangling_imports: graph.dangling.len(),
        skipped_files: model.failure_count(),
    };
    let recommendations = recommendations(circular.as_ref(), metrics.as_ref(), &hotspots);

    Ok(DependencyReport {
        project: model.project_name(),
        nodes,
        edges,
        circular,
        metrics,
        hotspots,
        focus,
        summary,
        recommendations,
    })
}
