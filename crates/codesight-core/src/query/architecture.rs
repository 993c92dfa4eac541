//! Structural overview of a code model: layers, aggregate complexity and the
//! most significant declarations.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::config::{AnalysisDepth, ArchitectureOptions};
use crate::indexer::tags::project_type;
use crate::models::{CodeModel, DeclarationCategory, FileModel, FunctionComplexity, ParseFailure};
use crate::query::guards::{MAX_LAYER_SAMPLE, MAX_TOP_DECLARATIONS};

const MAX_COMPLEXITY_WARNING: u32 = 50;
const AVERAGE_COMPLEXITY_WARNING: f64 = 15.0;
const LARGE_PROJECT_MODULES: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureCounts {
    pub files: usize,
    pub modules: usize,
    pub classes: usize,
    pub functions: usize,
    pub methods: usize,
    pub lines: u64,
    pub source_lines: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Layer {
    pub name: String,
    pub modules: usize,
    pub files: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_complexity: u64,
    pub average_complexity: f64,
    pub max_complexity: u32,
    pub average_maintainability: f64,
    pub halstead_volume: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetrics {
    pub path: String,
    pub lines: u32,
    pub complexity: u32,
    pub average_complexity: f64,
    pub max_complexity: u32,
    pub maintainability_index: f64,
    pub maintainability_rank: String,
    pub halstead_volume: f64,
    pub halstead_difficulty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<FunctionComplexity>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationSummary {
    pub name: String,
    pub qualified_name: String,
    pub category: DeclarationCategory,
    pub path: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureReport {
    pub project: String,
    pub project_type: String,
    pub frameworks: Vec<String>,
    pub domains: Vec<String>,
    pub structure: StructureCounts,
    pub layers: Vec<Layer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AggregateMetrics>,
    pub files: Vec<FileMetrics>,
    pub classes: Vec<DeclarationSummary>,
    pub functions: Vec<DeclarationSummary>,
    pub skipped_files: usize,
    pub failures: Vec<ParseFailure>,
    pub recommendations: Vec<String>,
}

/// Top-level directory of a path, or `root` for files at the scan root.
pub fn layer_of(path: &str) -> &str {
    match path.split_once('/') {
        Some((top, _)) => top,
        None => "root",
    }
}

/// Layers ordered by descending module count; ties keep first-seen order.
pub fn layers(model: &CodeModel) -> Vec<Layer> {
    let mut grouped: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for file in &model.files {
        grouped.entry(layer_of(file.path())).or_default().push(file.path());
    }
    let mut out: Vec<Layer> = grouped
        .into_iter()
        .map(|(name, files)| Layer {
            name: name.to_string(),
            modules: files.len(),
            files: files
                .into_iter()
                .take(MAX_LAYER_SAMPLE)
                .map(str::to_string)
                .collect(),
        })
        .collect();
    out.sort_by(|a, b| b.modules.cmp(&a.modules));
    out
}

fn structure(model: &CodeModel) -> StructureCounts {
    let mut counts = StructureCounts {
        files: model.total_scanned,
        modules: model.modeled_count(),
        ..StructureCounts::default()
    };
    for file in &model.files {
        counts.classes += file.classes().count();
        for function in file.functions() {
            if function.is_method {
                counts.methods += 1;
            } else {
                counts.functions += 1;
            }
        }
        counts.lines += file.metrics.lines as u64;
        counts.source_lines += file.metrics.sloc as u64;
    }
    counts
}

/// Aggregates over every function and method in the model.
pub fn aggregate_metrics(model: &CodeModel) -> AggregateMetrics {
    let scores: Vec<u32> = model
        .files
        .iter()
        .flat_map(|f| f.complexity.functions.iter().map(|c| c.cyclomatic))
        .collect();
    let total: u64 = scores.iter().map(|&c| c as u64).sum();
    let files = model.files.len();
    AggregateMetrics {
        total_complexity: total,
        average_complexity: if scores.is_empty() {
            0.0
        } else {
            total as f64 / scores.len() as f64
        },
        max_complexity: scores.iter().copied().max().unwrap_or(0),
        average_maintainability: if files == 0 {
            0.0
        } else {
            model
                .files
                .iter()
                .map(|f| f.complexity.maintainability_index)
                .sum::<f64>()
                / files as f64
        },
        halstead_volume: model.files.iter().map(|f| f.complexity.halstead_volume).sum(),
    }
}

fn file_metrics(file: &FileModel, with_functions: bool) -> FileMetrics {
    let c = &file.complexity;
    FileMetrics {
        path: file.path().to_string(),
        lines: file.metrics.lines,
        complexity: c.total,
        average_complexity: c.average,
        max_complexity: c.max,
        maintainability_index: c.maintainability_index,
        maintainability_rank: c.maintainability_rank.clone(),
        halstead_volume: c.halstead_volume,
        halstead_difficulty: c.halstead_difficulty,
        functions: with_functions.then(|| c.functions.clone()),
    }
}

fn top_classes(model: &CodeModel, limit: usize) -> Vec<DeclarationSummary> {
    let mut classes: Vec<DeclarationSummary> = model
        .files
        .iter()
        .flat_map(|file| {
            file.classes().map(move |class| DeclarationSummary {
                name: class.name.clone(),
                qualified_name: class.qualified_name.clone(),
                category: DeclarationCategory::Class,
                path: file.path().to_string(),
                line: class.start_line,
                complexity: None,
                methods: Some(class.methods.len()),
                bases: class.bases.clone(),
                docstring: class.docstring.clone(),
            })
        })
        .collect();
    classes.sort_by(|a, b| b.methods.cmp(&a.methods));
    classes.truncate(limit);
    classes
}

fn top_functions(model: &CodeModel, options: &ArchitectureOptions, limit: usize) -> Vec<DeclarationSummary> {
    let mut functions: Vec<DeclarationSummary> = Vec::new();
    for file in &model.files {
        for function in file.functions() {
            let category = if function.is_method {
                DeclarationCategory::Method
            } else {
                DeclarationCategory::Function
            };
            if !options.wants(category) {
                continue;
            }
            let complexity = file
                .complexity
                .functions
                .iter()
                .find(|c| c.qualified_name == function.qualified_name && c.line == function.start_line)
                .map(|c| c.cyclomatic);
            functions.push(DeclarationSummary {
                name: function.name.clone(),
                qualified_name: function.qualified_name.clone(),
                category,
                path: file.path().to_string(),
                line: function.start_line,
                complexity,
                methods: None,
                bases: Vec::new(),
                docstring: function.docstring.clone(),
            });
        }
    }
    functions.sort_by(|a, b| b.complexity.cmp(&a.complexity));
    functions.truncate(limit);
    functions
}

fn recommendations(report: &ArchitectureReport, aggregate: &AggregateMetrics) -> Vec<String> {
    let mut out = Vec::new();
    if aggregate.max_complexity > MAX_COMPLEXITY_WARNING {
        out.push(format!(
            "Highest function complexity is {}; split functions above {MAX_COMPLEXITY_WARNING} into smaller units.",
            aggregate.max_complexity
        ));
    }
    if aggregate.average_complexity > AVERAGE_COMPLEXITY_WARNING {
        out.push(format!(
            "Average function complexity {:.1} exceeds {AVERAGE_COMPLEXITY_WARNING}; simplify control flow in the busiest modules.",
            aggregate.average_complexity
        ));
    }
    if report.structure.modules > LARGE_PROJECT_MODULES && report.layers.len() <= 1 {
        out.push(format!(
            "{} modules without distinct layers; group related modules into packages.",
            report.structure.modules
        ));
    }
    if report.skipped_files > 0 {
        out.push(format!(
            "{} files could not be parsed and are missing from this report.",
            report.skipped_files
        ));
    }
    if out.is_empty() {
        out.push("Architecture looks well organized.".to_string());
    }
    out
}

/// Build the architecture report for `model`.
pub fn analyze_architecture(model: &CodeModel, options: &ArchitectureOptions) -> ArchitectureReport {
    let frameworks = model.frameworks();
    let aggregate = aggregate_metrics(model);
    let mut report = ArchitectureReport {
        project: model.project_name(),
        project_type: project_type(&frameworks).to_string(),
        frameworks,
        domains: model.domains(),
        structure: structure(model),
        layers: layers(model),
        skipped_files: model.failure_count(),
        failures: model.failures.clone(),
        ..ArchitectureReport::default()
    };

    let detailed = options.depth != AnalysisDepth::Overview;
    if options.include_metrics {
        report.metrics = Some(aggregate.clone());
    }
    if detailed && options.include_metrics && options.wants(DeclarationCategory::Module) {
        let with_functions = options.include_detailed_metrics || options.depth == AnalysisDepth::Deep;
        let mut files: Vec<FileMetrics> = model
            .files
            .iter()
            .filter(|f| f.complexity.total >= options.min_complexity)
            .map(|f| file_metrics(f, with_functions))
            .collect();
        files.sort_by(|a, b| b.complexity.cmp(&a.complexity));
        files.truncate(options.max_files);
        report.files = files;
    }
    if detailed {
        let limit = match options.depth {
            AnalysisDepth::Deep => usize::MAX,
            _ => MAX_TOP_DECLARATIONS,
        };
        if options.wants(DeclarationCategory::Class) {
            report.classes = top_classes(model, limit);
        }
        report.functions = top_functions(model, options, limit);
    }

    report.recommendations = recommendations(&report, &aggregate);
    debug!(
        modules = report.structure.modules,
        layers = report.layers.len(),
        files = report.files.len(),
        "architecture analyzed"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::graph::tests::model;

    fn sample() -> CodeModel {
        model(&[
            ("api/routes.py", "import fastapi\n\ndef index(x):\n    if x:\n        return 1\n    return 2\n"),
            ("api/schemas.py", "class User:\n    def name(self):\n        return 'u'\n"),
            ("core/engine.py", "class Engine:\n    \"\"\"Runs jobs.\"\"\"\n    def run(self):\n        pass\n    def stop(self):\n        pass\n"),
            ("main.py", "def main():\n    for i in range(3):\n        if i and i > 1:\n            print(i)\n"),
            ("broken.py", "class (:\n"),
        ])
    }

    #[test]
    fn test_layers_group_by_top_directory() {
        let layers = layers(&sample());
        assert_eq!(layers[0].name, "api");
        assert_eq!(layers[0].modules, 2);
        assert_eq!(layers[0].files, vec!["api/routes.py", "api/schemas.py"]);
        let names: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["api", "core", "root"]);
    }

    #[test]
    fn test_detailed_report() {
        let report = analyze_architecture(&sample(), &ArchitectureOptions::default());
        assert_eq!(report.project_type, "fastapi");
        assert_eq!(report.structure.files, 5);
        assert_eq!(report.structure.modules, 4);
        assert_eq!(report.structure.classes, 2);
        assert_eq!(report.structure.methods, 3);
        assert_eq!(report.structure.functions, 2);
        assert_eq!(report.skipped_files, 1);
        assert_eq!(report.classes[0].name, "Engine");
        assert_eq!(report.classes[0].methods, Some(2));
        assert_eq!(report.functions[0].name, "main");
        assert_eq!(report.functions[0].complexity, Some(4));
        assert_eq!(report.files[0].path, "main.py");
        assert!(report.files[0].functions.is_none());
        let metrics = report.metrics.unwrap();
        assert_eq!(metrics.max_complexity, 4);
        assert_eq!(metrics.total_complexity, 4 + 2 + 1 + 1 + 1);
    }

    #[test]
    fn test_overview_omits_declarations() {
        let options = ArchitectureOptions {
            depth: AnalysisDepth::Overview,
            ..ArchitectureOptions::default()
        };
        let report = analyze_architecture(&sample(), &options);
        assert!(report.files.is_empty());
        assert!(report.classes.is_empty());
        assert!(report.functions.is_empty());
        assert!(report.metrics.is_some());
    }

    #[test]
    fn test_type_filter_and_min_complexity() {
        let options = ArchitectureOptions {
            depth: AnalysisDepth::Deep,
            types: vec![DeclarationCategory::Method, DeclarationCategory::Module],
            min_complexity: 2,
            ..ArchitectureOptions::default()
        };
        let report = analyze_architecture(&sample(), &options);
        assert!(report.classes.is_empty());
        assert!(report
            .functions
            .iter()
            .all(|f| f.category == DeclarationCategory::Method));
        assert_eq!(report.functions.len(), 3);
        let paths: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["main.py", "api/routes.py", "core/engine.py"]);
        assert!(report.files[0].functions.is_some());
    }

    #[test]
    fn test_recommendations_report_skipped_files() {
        let report = analyze_architecture(&sample(), &ArchitectureOptions::default());
        assert!(report.recommendations.iter().any(|r| r.contains("could not be parsed")));
        let clean = analyze_architecture(&model(&[("a.py", "x = 1\n")]), &ArchitectureOptions::default());
        assert_eq!(clean.recommendations, vec!["Architecture looks well organized."]);
    }
}
