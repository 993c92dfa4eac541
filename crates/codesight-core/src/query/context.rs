//! Task-oriented context assembly.
//!
//! Files are scored against the task text, adjusted by the chosen strategy,
//! then packed greedily under a token budget. A candidate that does not fit
//! is skipped rather than ending the scan, so a smaller, lower-ranked file
//! can still be admitted.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::config::{ContentKind, ContextOptions, Strategy};
use crate::errors::CodesightResult;
use crate::indexer::graph::ModuleGraph;
use crate::indexer::tags::{domains_for_keywords, project_type};
use crate::models::{
    CodeModel, ContextPack, ContextSection, Declaration, FileModel, FileTags, InclusionMode,
    PackEntry, Parameter, ParameterKind, RelevanceScore, SkippedEntry, TaskAnalysis,
};
use crate::query::guards::{clamp_budget, truncate_task, DEPTH_STRATEGY_HOPS, MAX_RELATED_TESTS};
use crate::query::tokenizer::{estimate_tokens, path_segments, task_keywords};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const FOCUS_WEIGHT: f64 = 1.0;
const KEYWORD_WEIGHT: f64 = 0.5;
const DOMAIN_WEIGHT: f64 = 0.3;
/// Depth seeds score at least this share of the top raw score.
const DEPTH_SEED_RATIO: f64 = 0.5;
const DEPTH_DECAY: f64 = 0.5;

const SMALL_PACK: usize = 5;
const LARGE_PACK: usize = 15;

const BUGFIX_WORDS: &[&str] = &["fix", "bug", "error", "issue"];
const REFACTOR_WORDS: &[&str] = &["refactor", "improve", "optimize"];
const TESTING_WORDS: &[&str] = &["test", "coverage"];
const WEB_FRAMEWORKS: &[&str] = &["fastapi", "django", "flask"];

// ---------------------------------------------------------------------------
// Task analysis and scoring
// ---------------------------------------------------------------------------

pub fn task_type(task: &str) -> &'static str {
    let lower = task.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if mentions(BUGFIX_WORDS) {
        "bugfix"
    } else if mentions(REFACTOR_WORDS) {
        "refactoring"
    } else if mentions(TESTING_WORDS) {
        "testing"
    } else {
        "feature"
    }
}

/// Keywords, task type and the project domains the task touches.
pub fn analyze_task(task: &str, model: &CodeModel) -> TaskAnalysis {
    let keywords = task_keywords(task);
    let project_domains = model.domains();
    let hinted: Vec<String> = domains_for_keywords(&keywords)
        .into_iter()
        .filter(|d| project_domains.contains(d))
        .collect();
    TaskAnalysis {
        task_type: task_type(task).to_string(),
        keywords,
        domain_concepts: hinted,
        frameworks: model.frameworks(),
    }
}

/// Raw relevance of one file before strategy adjustment.
pub fn relevance_of(
    path: &str,
    tags: &FileTags,
    analysis: &TaskAnalysis,
    focus: &[String],
) -> RelevanceScore {
    let mut score = RelevanceScore::default();
    let focused = focus.iter().map(|f| f.trim_start_matches("./")).find(|f| {
        !f.is_empty() && path.contains(f)
    });
    if let Some(area) = focused {
        score.add(format!("focus:{area}"), FOCUS_WEIGHT);
    }
    let segments = path_segments(path);
    for keyword in &analysis.keywords {
        if segments.iter().any(|s| s.contains(keyword.as_str())) {
            score.add(format!("keyword:{keyword}"), KEYWORD_WEIGHT);
        }
    }
    for domain in &tags.domains {
        if analysis.domain_concepts.contains(domain) {
            score.add(format!("domain:{domain}"), DOMAIN_WEIGHT);
        }
    }
    score
}

struct Candidate<'a> {
    file: &'a FileModel,
    score: RelevanceScore,
}

fn directory_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Indices ordered by descending score; equal scores keep discovery order.
fn ranked_order(candidates: &[Candidate<'_>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].score.value.total_cmp(&candidates[a].score.value));
    order
}

/// Divide the k-th file of each directory (in raw order) by `1 + k`.
fn apply_breadth(candidates: &mut [Candidate<'_>]) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for idx in ranked_order(candidates) {
        let file = candidates[idx].file;
        if candidates[idx].score.value <= 0.0 {
            continue;
        }
        let k = seen.entry(directory_of(file.path())).or_insert(0);
        candidates[idx].score.value /= (1 + *k) as f64;
        *k += 1;
    }
}

/// Boost files reachable from strong seeds along outgoing import edges.
fn apply_depth(candidates: &mut [Candidate<'_>], graph: &ModuleGraph) {
    let top = candidates
        .iter()
        .map(|c| c.score.value)
        .fold(0.0f64, f64::max);
    if top <= 0.0 {
        return;
    }
    let by_path: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.file.path(), i))
        .collect();
    let raw: Vec<f64> = candidates.iter().map(|c| c.score.value).collect();

    let mut boosts: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for (seed, &seed_score) in raw.iter().enumerate() {
        if seed_score < top * DEPTH_SEED_RATIO {
            continue;
        }
        let Some(start) = graph.node(candidates[seed].file.path()) else {
            continue;
        };
        let mut visited = HashSet::from([start]);
        let mut frontier = vec![start];
        for hop in 1..=DEPTH_STRATEGY_HOPS {
            let gain = seed_score * DEPTH_DECAY.powi(hop as i32);
            let mut next = Vec::new();
            for node in frontier {
                for dep in graph.dependencies(node) {
                    if !visited.insert(dep) {
                        continue;
                    }
                    next.push(dep);
                    let Some(&target) = by_path.get(graph.key(dep).as_str()) else {
                        continue;
                    };
                    let entry = boosts.entry(target).or_insert((0.0, seed));
                    if gain > entry.0 {
                        *entry = (gain, seed);
                    }
                }
            }
            frontier = next;
        }
    }

    for (target, (gain, seed)) in boosts {
        let label = format!("depends:{}", candidates[seed].file.path());
        candidates[target].score.add(label, gain);
    }
}

// ---------------------------------------------------------------------------
// Content rendering
// ---------------------------------------------------------------------------

fn numbered(text: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{:4} | {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn full_content(file: &FileModel, line_numbers: bool) -> String {
    if line_numbers {
        numbered(&file.file.text)
    } else {
        file.file.text.clone()
    }
}

fn format_param(param: &Parameter) -> String {
    let mut out = match param.kind {
        ParameterKind::Regular => param.name.clone(),
        ParameterKind::VarPositional => format!("*{}", param.name),
        ParameterKind::VarKeyword => format!("**{}", param.name),
    };
    if let Some(annotation) = &param.annotation {
        out.push_str(&format!(": {annotation}"));
    }
    if param.has_default {
        out.push_str("=...");
    }
    out
}

/// Declaration skeleton of a file: docstring summary plus one line per class
/// and function, indented by nesting.
pub fn outline(file: &FileModel) -> String {
    let mut lines = vec![format!("# {} ({} lines)", file.path(), file.metrics.lines)];
    if let Some(summary) = file.docstring().and_then(|d| d.lines().next()) {
        lines.push(format!("\"\"\"{summary}\"\"\""));
    }
    for decl in &file.declarations {
        match decl {
            Declaration::Module { .. } => {}
            Declaration::Class(class) => {
                let indent = "    ".repeat(class.qualified_name.matches('.').count());
                let bases = if class.bases.is_empty() {
                    String::new()
                } else {
                    format!("({})", class.bases.join(", "))
                };
                lines.push(format!("{:4} | {indent}class {}{bases}: ...", class.start_line, class.name));
            }
            Declaration::Function(function) => {
                let indent = "    ".repeat(function.qualified_name.matches('.').count());
                let prefix = if function.is_async { "async def" } else { "def" };
                let params: Vec<String> = function.params.iter().map(format_param).collect();
                let returns = function
                    .return_annotation
                    .as_ref()
                    .map(|r| format!(" -> {r}"))
                    .unwrap_or_default();
                lines.push(format!(
                    "{:4} | {indent}{prefix} {}({}){returns}: ...",
                    function.start_line,
                    function.name,
                    params.join(", ")
                ));
            }
        }
    }
    lines.join("\n")
}

fn architecture_summary(model: &CodeModel, entries: &[PackEntry]) -> String {
    let frameworks = model.frameworks();
    let mut layers: Vec<&str> = entries
        .iter()
        .filter_map(|e| e.path.split_once('/').map(|(top, _)| top))
        .collect();
    layers.sort();
    layers.dedup();
    let none = |items: &[String]| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join(", ")
        }
    };
    let layers: Vec<String> = layers.into_iter().map(str::to_string).collect();
    format!(
        "Type: {}\nFrameworks: {}\nLayers: {}\nModules: {} ({} skipped)",
        project_type(&frameworks),
        none(&frameworks),
        none(&layers),
        model.modeled_count(),
        model.failure_count()
    )
}

fn dependency_summary(graph: &ModuleGraph, entries: &[PackEntry]) -> String {
    let mut lines = Vec::new();
    for entry in entries {
        let Some(idx) = graph.node(&entry.path) else {
            continue;
        };
        let deps: Vec<String> = graph
            .dependencies(idx)
            .into_iter()
            .map(|d| graph.key(d))
            .collect();
        let targets = if deps.is_empty() {
            "(none)".to_string()
        } else {
            deps.join(", ")
        };
        lines.push(format!(
            "{} -> {targets} [in {}, out {}]",
            entry.path,
            graph.fan_in(idx),
            graph.fan_out(idx)
        ));
    }
    lines.join("\n")
}

pub fn is_test_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.starts_with("test_")
        || name.ends_with("_test.py")
        || name == "conftest.py"
        || path.split('/').any(|part| part == "tests" || part == "test")
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".py").unwrap_or(name)
}

/// Test files that import an admitted file or are named after one.
fn related_tests(model: &CodeModel, graph: &ModuleGraph, entries: &[PackEntry]) -> Vec<String> {
    let admitted: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    let stems: HashSet<&str> = entries.iter().map(|e| file_stem(&e.path)).collect();
    model
        .files
        .iter()
        .map(FileModel::path)
        .filter(|path| is_test_path(path) && !admitted.contains(path))
        .filter(|path| {
            let stem = file_stem(path);
            let named = stem
                .strip_prefix("test_")
                .or_else(|| stem.strip_suffix("_test"))
                .is_some_and(|target| stems.contains(target));
            let imports = graph.node(path).is_some_and(|idx| {
                graph
                    .dependencies(idx)
                    .into_iter()
                    .any(|dep| admitted.contains(graph.key(dep).as_str()))
            });
            named || imports
        })
        .take(MAX_RELATED_TESTS)
        .map(str::to_string)
        .collect()
}

fn suggestions(analysis: &TaskAnalysis, admitted: usize) -> Vec<String> {
    let mut out = Vec::new();
    match analysis.task_type.as_str() {
        "feature" => out.push("Consider following existing code patterns in similar features".to_string()),
        "bugfix" => out.push("Review related test files and look for edge cases".to_string()),
        "refactoring" => {
            out.push("Ensure backward compatibility and update related tests".to_string())
        }
        _ => {}
    }
    let uses = |name: &str| analysis.frameworks.iter().any(|f| f == name);
    if uses("pandas") && analysis.keywords.iter().any(|k| k.contains("dataframe")) {
        out.push("Use vectorized operations instead of loops for better performance".to_string());
    }
    if uses("sklearn") {
        out.push("Consider using sklearn Pipeline for reproducible workflows".to_string());
    }
    if WEB_FRAMEWORKS.iter().any(|f| uses(f)) {
        out.push("Follow RESTful API best practices and proper error handling".to_string());
    }
    if admitted < SMALL_PACK {
        out.push("Limited context available - consider broader search terms".to_string());
    } else if admitted > LARGE_PACK {
        out.push("Large context - focus on most relevant files first".to_string());
    }
    out
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Assemble a context pack for `options.task` from an already built model.
pub fn assemble_context(model: &CodeModel, options: &ContextOptions) -> CodesightResult<ContextPack> {
    options.validate()?;
    let task = truncate_task(&options.task);
    let budget = clamp_budget(options.tokens);
    let analysis = analyze_task(&task, model);
    let graph = ModuleGraph::build(model, false);

    let mut candidates: Vec<Candidate<'_>> = model
        .files
        .iter()
        .map(|file| Candidate {
            score: relevance_of(file.path(), &file.tags, &analysis, &options.focus),
            file,
        })
        .collect();
    match options.strategy {
        Strategy::Relevance => {}
        Strategy::Breadth => apply_breadth(&mut candidates),
        Strategy::Depth => apply_depth(&mut candidates, &graph),
    }

    let mut pack = ContextPack {
        task,
        strategy: options.strategy.as_str().to_string(),
        format: options.format.as_str().to_string(),
        budget,
        candidates: candidates.len(),
        skipped_files: model.failure_count(),
        ..ContextPack::default()
    };

    let with_source = options.includes(ContentKind::Files);
    let mut relevant = 0usize;
    for idx in ranked_order(&candidates) {
        let Candidate { file, score } = &candidates[idx];
        if score.value <= 0.0 {
            break;
        }
        relevant += 1;
        let remaining = pack.remaining();

        let mut admitted = None;
        let mut smallest = usize::MAX;
        if with_source {
            let content = full_content(file, options.line_numbers);
            let size = estimate_tokens(&content);
            smallest = smallest.min(size);
            if size <= remaining {
                admitted = Some((content, size, InclusionMode::FullSource));
            }
        }
        if admitted.is_none() {
            let content = outline(file);
            let size = estimate_tokens(&content);
            smallest = smallest.min(size);
            if size <= remaining {
                admitted = Some((content, size, InclusionMode::Outline));
            }
        }

        match admitted {
            Some((content, size, mode)) => {
                pack.used += size;
                pack.entries.push(PackEntry {
                    path: file.path().to_string(),
                    rank: pack.entries.len() + 1,
                    score: score.value,
                    reason: score.top_reason().unwrap_or("none").to_string(),
                    factors: score.ordered_labels(),
                    lines: file.metrics.lines,
                    size,
                    included_as: mode,
                    content,
                });
            }
            None => {
                debug!(path = %file.path(), size = smallest, remaining, "candidate skipped");
                pack.skipped.push(SkippedEntry {
                    path: file.path().to_string(),
                    score: score.value,
                    size: smallest,
                    remaining,
                });
            }
        }
    }

    let mut summaries = Vec::new();
    if options.includes(ContentKind::Arch) {
        summaries.push(("Architecture", architecture_summary(model, &pack.entries)));
    }
    if options.includes(ContentKind::Deps) {
        summaries.push(("Dependencies", dependency_summary(&graph, &pack.entries)));
    }
    for (title, body) in summaries {
        let size = estimate_tokens(&body);
        if size <= pack.remaining() {
            pack.used += size;
            pack.sections.push(ContextSection {
                title: title.to_string(),
                size,
                body,
            });
        } else {
            pack.notes.push(format!(
                "{title} summary omitted: needs {size} tokens, {} remaining",
                pack.remaining()
            ));
        }
    }

    if options.includes(ContentKind::Tests) {
        pack.related_tests = related_tests(model, &graph, &pack.entries);
    }
    if pack.entries.is_empty() {
        if relevant == 0 {
            pack.notes.push("No relevant files found for the task".to_string());
        } else {
            pack.notes.push(format!(
                "CapacityExceeded: a budget of {budget} tokens cannot hold any of {relevant} relevant files"
            ));
        }
    }
    if pack.skipped_files > 0 {
        pack.notes.push(format!(
            "{} files could not be parsed and were not considered",
            pack.skipped_files
        ));
    }
    pack.suggestions = suggestions(&analysis, pack.entries.len());
    pack.task_analysis = analysis;

    info!(
        strategy = %pack.strategy,
        budget,
        used = pack.used,
        admitted = pack.entries.len(),
        skipped = pack.skipped.len(),
        "context assembled"
    );
    Ok(pack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::graph::tests::model;

    fn options(task: &str, tokens: i64) -> ContextOptions {
        ContextOptions {
            tokens,
            ..ContextOptions::new(task)
        }
    }

    fn big_source(n: usize) -> String {
        let mut source = String::from("def handler():\n    pass\n");
        source.push_str(&format!("PAYLOAD = \"{}\"\n", "x".repeat(n)));
        source
    }

    #[test]
    fn test_task_type() {
        assert_eq!(task_type("Fix the login bug"), "bugfix");
        assert_eq!(task_type("optimize the query layer"), "refactoring");
        assert_eq!(task_type("raise coverage of billing"), "testing");
        assert_eq!(task_type("add invoice export"), "feature");
    }

    #[test]
    fn test_relevance_factors() {
        let analysis = TaskAnalysis {
            keywords: vec!["auth".to_string(), "user".to_string()],
            domain_concepts: vec!["web-api".to_string()],
            ..TaskAnalysis::default()
        };
        let tags = FileTags {
            frameworks: vec![],
            domains: vec!["web-api".to_string()],
        };
        let score = relevance_of("api/user_auth.py", &tags, &analysis, &["api".to_string()]);
        assert!((score.value - 2.3).abs() < 1e-9);
        assert_eq!(score.top_reason(), Some("focus:api"));
        let none = relevance_of("misc.py", &FileTags::default(), &analysis, &[]);
        assert_eq!(none.value, 0.0);
    }

    #[test]
    fn test_budget_is_never_exceeded() {
        let sources: Vec<(String, String)> = (0..10)
            .map(|i| (format!("auth/auth_{i}.py"), big_source(600 + i * 50)))
            .collect();
        let refs: Vec<(&str, &str)> = sources.iter().map(|(p, s)| (p.as_str(), s.as_str())).collect();
        let model = model(&refs);
        for budget in [0, 1, 10, 100, 500, 2000, 8000] {
            let pack = assemble_context(&model, &options("auth flow", budget)).unwrap();
            assert!(pack.used <= budget as usize);
            let total: usize = pack.entries.iter().map(|e| e.size).sum::<usize>()
                + pack.sections.iter().map(|s| s.size).sum::<usize>();
            assert_eq!(total, pack.used);
        }
    }

    #[test]
    fn test_tight_budget_against_large_candidates() {
        let sources: Vec<(String, String)> = (0..10)
            .map(|i| (format!("auth_{i}.py"), big_source(2000)))
            .collect();
        let refs: Vec<(&str, &str)> = sources.iter().map(|(p, s)| (p.as_str(), s.as_str())).collect();
        let pack = assemble_context(&model(&refs), &options("auth", 100)).unwrap();
        assert!(pack.used <= 100);
        assert!(pack.entries.iter().all(|e| e.included_as == InclusionMode::Outline));
        assert!(pack
            .entries
            .windows(2)
            .all(|w| w[0].score >= w[1].score));
        let ranks: Vec<usize> = pack.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, (1..=pack.entries.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_skipped_higher_scores_did_not_fit() {
        let wide: String = (0..200)
            .map(|i| format!("def function_number_{i}_with_a_long_name():\n    pass\n"))
            .collect();
        let model = model(&[
            ("billing/invoice_export.py", wide.as_str()),
            ("billing/invoice.py", big_source(400).as_str()),
            ("export.py", "def run():\n    pass\n"),
            ("misc.py", "x = 1\n"),
        ]);
        let opts = ContextOptions {
            include: vec![ContentKind::Files],
            ..options("invoice export for billing", 300)
        };
        let pack = assemble_context(&model, &opts).unwrap();
        assert!(pack.used <= 300);
        assert_eq!(pack.skipped.len(), 1);
        assert_eq!(pack.skipped[0].path, "billing/invoice_export.py");
        for admitted in &pack.entries {
            for skipped in &pack.skipped {
                if skipped.score > admitted.score {
                    assert!(skipped.size > skipped.remaining);
                }
            }
        }
        let order: Vec<&str> = pack.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(order, vec!["billing/invoice.py", "export.py"]);
    }

    #[test]
    fn test_zero_budget_reports_capacity_exceeded() {
        let model = model(&[("auth.py", "def login():\n    pass\n")]);
        let pack = assemble_context(&model, &options("auth", 0)).unwrap();
        assert!(pack.entries.is_empty());
        assert!(pack.notes.iter().any(|n| n.starts_with("CapacityExceeded")));
    }

    #[test]
    fn test_no_relevant_files_note() {
        let model = model(&[("misc.py", "x = 1\n")]);
        let pack = assemble_context(&model, &options("quantum teleportation", 1000)).unwrap();
        assert!(pack.entries.is_empty());
        assert_eq!(pack.notes, vec!["No relevant files found for the task"]);
    }

    #[test]
    fn test_domain_bonus_follows_the_task() {
        let model = model(&[("srv/app.py", "import flask\n")]);

        let unrelated = assemble_context(&model, &options("rename invoice totals", 1000)).unwrap();
        assert!(unrelated.task_analysis.domain_concepts.is_empty());
        assert!(unrelated.entries.is_empty());

        let related = assemble_context(&model, &options("new endpoint for invoices", 1000)).unwrap();
        assert_eq!(related.task_analysis.domain_concepts, vec!["web-api"]);
        assert_eq!(related.entries.len(), 1);
        assert_eq!(related.entries[0].reason, "domain:web-api");
    }

    #[test]
    fn test_negative_budget_is_configuration_error() {
        let model = model(&[("a.py", "")]);
        let err = assemble_context(&model, &options("anything", -5)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_breadth_spreads_across_directories() {
        let model = model(&[
            ("auth/auth_a.py", "x = 1\n"),
            ("auth/auth_b.py", "x = 1\n"),
            ("other/auth_c.py", "x = 1\n"),
        ]);
        let opts = ContextOptions {
            strategy: Strategy::Breadth,
            ..options("auth", 1000)
        };
        let pack = assemble_context(&model, &opts).unwrap();
        let order: Vec<&str> = pack.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(order, vec!["auth/auth_a.py", "other/auth_c.py", "auth/auth_b.py"]);
        assert!((pack.entries[2].score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_depth_boosts_dependencies_of_seeds() {
        let model = model(&[
            ("auth.py", "import session\n"),
            ("session.py", "import storage\n"),
            ("storage.py", "x = 1\n"),
            ("unrelated.py", "x = 1\n"),
        ]);
        let opts = ContextOptions {
            strategy: Strategy::Depth,
            ..options("auth", 1000)
        };
        let pack = assemble_context(&model, &opts).unwrap();
        let order: Vec<&str> = pack.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(order, vec!["auth.py", "session.py", "storage.py"]);
        assert!((pack.entries[1].score - 0.25).abs() < 1e-9);
        assert!((pack.entries[2].score - 0.125).abs() < 1e-9);
        assert_eq!(pack.entries[1].reason, "depends:auth.py");
    }

    #[test]
    fn test_summaries_and_related_tests() {
        let model = model(&[
            ("app/auth.py", "import app.db\n"),
            ("app/__init__.py", ""),
            ("app/db.py", "x = 1\n"),
            ("tests/test_auth.py", "x = 1\n"),
            ("tests/check_db.py", "import app.auth\n"),
        ]);
        let opts = ContextOptions {
            include: vec![ContentKind::Files, ContentKind::Arch, ContentKind::Deps, ContentKind::Tests],
            ..options("auth", 4000)
        };
        let pack = assemble_context(&model, &opts).unwrap();
        let titles: Vec<&str> = pack.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Architecture", "Dependencies"]);
        assert!(pack.sections[1].body.contains("app/auth.py -> app/db.py"));
        assert!(pack.related_tests.contains(&"tests/check_db.py".to_string()));
    }

    #[test]
    fn test_summary_omitted_when_it_does_not_fit() {
        let model = model(&[("auth.py", "def login():\n    pass\n")]);
        let opts = ContextOptions {
            include: vec![ContentKind::Files, ContentKind::Arch],
            ..options("auth", 7)
        };
        let pack = assemble_context(&model, &opts).unwrap();
        assert_eq!(pack.entries.len(), 1);
        assert!(pack.sections.is_empty());
        assert!(pack.notes.iter().any(|n| n.starts_with("Architecture summary omitted")));
    }

    #[test]
    fn test_line_numbers_and_outline() {
        assert_eq!(numbered("a\nb"), "   1 | a\n   2 | b");
        let model = model(&[(
            "svc.py",
            "\"\"\"Service layer.\"\"\"\nclass Svc(Base):\n    async def run(self, *args, limit: int = 3) -> bool:\n        return True\n",
        )]);
        let text = outline(&model.files[0]);
        assert!(text.contains("\"\"\"Service layer.\"\"\""));
        assert!(text.contains("   2 | class Svc(Base): ..."));
        assert!(text.contains("   3 |     async def run(self, *args, limit: int=...) -> bool: ..."));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let model = model(&[
            ("api/auth.py", "import api.users\n"),
            ("api/__init__.py", ""),
            ("api/users.py", "def get():\n    pass\n"),
            ("auth_utils.py", "x = 1\n"),
        ]);
        let opts = options("fix auth for users", 2000);
        let first = serde_json::to_string(&assemble_context(&model, &opts).unwrap()).unwrap();
        let second = serde_json::to_string(&assemble_context(&model, &opts).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
