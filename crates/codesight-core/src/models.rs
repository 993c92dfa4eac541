//! Shared typed models used across indexing and query layers.
//!
//! Everything here is produced once per invocation by the indexer and then
//! read, never mutated, by the query engines.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source files and parse status
// ---------------------------------------------------------------------------

/// Outcome of parsing one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ParseStatus {
    Ok,
    Failed(String),
}

impl ParseStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ParseStatus::Ok)
    }
}

/// A single scanned file.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Path relative to the scan root, `/`-separated.
    pub path: String,
    pub id: i64,
    pub size_bytes: u64,
    pub content_hash: String,
    pub status: ParseStatus,
    #[serde(skip)]
    pub text: String,
}

/// A file excluded from the model, with the reason it was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub path: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Index of a declaration inside its owning file's declaration list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclarationId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterKind {
    Regular,
    VarPositional,
    VarKeyword,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub annotation: Option<String>,
    pub has_default: bool,
    pub kind: ParameterKind,
}

/// Decision points found in one function body, excluding nested functions
/// and classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFlowShape {
    /// `if`, `elif`, `case` arms and conditional expressions.
    pub branches: u32,
    pub loops: u32,
    pub loop_else: u32,
    pub handlers: u32,
    pub try_else: u32,
    /// Boolean operands beyond the first of each `and`/`or` chain.
    pub bool_terms: u32,
    pub comprehensions: u32,
    pub comprehension_ifs: u32,
}

impl ControlFlowShape {
    pub fn decision_points(&self) -> u32 {
        self.branches
            + self.loops
            + self.loop_else
            + self.handlers
            + self.try_else
            + self.bool_terms
            + self.comprehensions
            + self.comprehension_ifs
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDecl {
    pub name: String,
    pub qualified_name: String,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub methods: Vec<DeclarationId>,
    pub docstring: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDecl {
    pub name: String,
    pub qualified_name: String,
    pub is_async: bool,
    pub is_method: bool,
    pub decorators: Vec<String>,
    pub params: Vec<Parameter>,
    pub return_annotation: Option<String>,
    pub docstring: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub shape: ControlFlowShape,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Declaration {
    Module {
        name: String,
        docstring: Option<String>,
    },
    Class(ClassDecl),
    Function(FunctionDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Module { name, .. } => name,
            Declaration::Class(class) => &class.name,
            Declaration::Function(function) => &function.name,
        }
    }

    pub fn category(&self) -> DeclarationCategory {
        match self {
            Declaration::Module { .. } => DeclarationCategory::Module,
            Declaration::Class(_) => DeclarationCategory::Class,
            Declaration::Function(f) if f.is_method => DeclarationCategory::Method,
            Declaration::Function(_) => DeclarationCategory::Function,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match self {
            Declaration::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassDecl> {
        match self {
            Declaration::Class(c) => Some(c),
            _ => None,
        }
    }

    /// `(start, end)` lines for classes and functions.
    pub fn line_span(&self) -> Option<(u32, u32)> {
        match self {
            Declaration::Module { .. } => None,
            Declaration::Class(c) => Some((c.start_line, c.end_line)),
            Declaration::Function(f) => Some((f.start_line, f.end_line)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationCategory {
    #[serde(alias = "mod")]
    Module,
    Class,
    #[serde(alias = "func")]
    Function,
    Method,
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

/// An import statement as written, before resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    /// Dotted module path without the leading dots of a relative import.
    pub module: String,
    /// Number of leading dots; `0` for absolute imports.
    pub level: u32,
    pub names: Vec<String>,
    pub is_from: bool,
    pub line: u32,
}

impl ImportRecord {
    /// The module reference as it appears in source, e.g. `..pkg.mod`.
    pub fn written_form(&self) -> String {
        format!("{}{}", ".".repeat(self.level as usize), self.module)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImportTarget {
    InProject { path: String },
    External { package: String },
    Unresolved { reason: String },
}

impl ImportTarget {
    pub fn in_project_path(&self) -> Option<&str> {
        match self {
            ImportTarget::InProject { path } => Some(path),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEdge {
    pub from: String,
    pub to: ImportTarget,
    pub module: String,
    pub symbols: Vec<String>,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConstantBinding {
    pub name: String,
    pub line: u32,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Raw metrics and tags
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetrics {
    pub lines: u32,
    pub blank: u32,
    pub comments: u32,
    /// Lines occupied by docstrings and other bare string statements.
    pub multi: u32,
    pub sloc: u32,
    pub lloc: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HalsteadCounts {
    pub distinct_operators: u32,
    pub distinct_operands: u32,
    pub total_operators: u32,
    pub total_operands: u32,
}

impl HalsteadCounts {
    pub fn vocabulary(&self) -> u32 {
        self.distinct_operators + self.distinct_operands
    }

    pub fn length(&self) -> u32 {
        self.total_operators + self.total_operands
    }

    pub fn volume(&self) -> f64 {
        let vocabulary = self.vocabulary();
        if vocabulary == 0 {
            return 0.0;
        }
        self.length() as f64 * (vocabulary as f64).log2()
    }

    pub fn difficulty(&self) -> f64 {
        if self.distinct_operands == 0 {
            return 0.0;
        }
        (self.distinct_operators as f64 / 2.0)
            * (self.total_operands as f64 / self.distinct_operands as f64)
    }
}

/// Framework and domain-concept tags derived from a file's imports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FileTags {
    pub frameworks: Vec<String>,
    pub domains: Vec<String>,
}

// ---------------------------------------------------------------------------
// Complexity
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ComplexityRank {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for ComplexityRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            ComplexityRank::A => "A",
            ComplexityRank::B => "B",
            ComplexityRank::C => "C",
            ComplexityRank::D => "D",
            ComplexityRank::F => "F",
        };
        f.write_str(letter)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionComplexity {
    pub name: String,
    pub qualified_name: String,
    pub line: u32,
    pub cyclomatic: u32,
    pub rank: ComplexityRank,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileComplexity {
    pub functions: Vec<FunctionComplexity>,
    pub total: u32,
    pub average: f64,
    pub max: u32,
    pub maintainability_index: f64,
    pub maintainability_rank: String,
    pub halstead_volume: f64,
    pub halstead_difficulty: f64,
}

// ---------------------------------------------------------------------------
// File model and snapshot
// ---------------------------------------------------------------------------

/// Everything known about one successfully parsed file.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileModel {
    pub file: SourceFile,
    pub module_name: String,
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportRecord>,
    pub constants: Vec<ConstantBinding>,
    pub metrics: RawMetrics,
    pub halstead: HalsteadCounts,
    /// Decision points in module-level code outside any function.
    pub module_decisions: u32,
    pub tags: FileTags,
    pub complexity: FileComplexity,
}

impl FileModel {
    pub fn path(&self) -> &str {
        &self.file.path
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.declarations.iter().filter_map(Declaration::as_function)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.declarations.iter().filter_map(Declaration::as_class)
    }

    pub fn docstring(&self) -> Option<&str> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::Module { docstring, .. } => docstring.as_deref(),
            _ => None,
        })
    }
}

/// Immutable per-invocation snapshot of the scanned tree.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeModel {
    pub root: String,
    /// Successfully modeled files, in discovery order.
    pub files: Vec<FileModel>,
    pub failures: Vec<ParseFailure>,
    pub edges: Vec<ImportEdge>,
    pub total_scanned: usize,
    /// Files discovered beyond the scan cap and never read.
    pub truncated: usize,
}

impl CodeModel {
    pub fn project_name(&self) -> String {
        std::path::Path::new(&self.root)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.clone())
    }

    pub fn modeled_count(&self) -> usize {
        self.files.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Sorted union of frameworks seen anywhere in the project.
    pub fn frameworks(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .files
            .iter()
            .flat_map(|f| f.tags.frameworks.iter().cloned())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    pub fn domains(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .files
            .iter()
            .flat_map(|f| f.tags.domains.iter().cloned())
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

// ---------------------------------------------------------------------------
// Coverage input
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

/// Externally parsed coverage data for one file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageRecord {
    pub lines_covered: u32,
    pub total_lines: u32,
    pub uncovered_ranges: Vec<LineRange>,
    pub branches_covered: Option<u32>,
    pub branches_total: Option<u32>,
}

impl CoverageRecord {
    pub fn line_percent(&self) -> f64 {
        if self.total_lines == 0 {
            return 0.0;
        }
        self.lines_covered as f64 * 100.0 / self.total_lines as f64
    }

    pub fn branch_percent(&self) -> Option<f64> {
        match (self.branches_covered, self.branches_total) {
            (Some(_), Some(0)) => None,
            (Some(covered), Some(total)) => Some(covered as f64 * 100.0 / total as f64),
            _ => None,
        }
    }

    /// True when no line of `start..=end` was exercised.
    pub fn span_unexercised(&self, start: u32, end: u32) -> bool {
        if self.lines_covered == 0 {
            return true;
        }
        let mut cursor = start;
        let mut ranges = self.uncovered_ranges.clone();
        ranges.sort_by_key(|r| r.start);
        for range in ranges {
            if range.start > cursor {
                break;
            }
            if range.end >= cursor {
                cursor = range.end.saturating_add(1);
            }
            if cursor > end {
                return true;
            }
        }
        cursor > end
    }
}

// ---------------------------------------------------------------------------
// Relevance and context packs
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreFactor {
    pub label: String,
    pub weight: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RelevanceScore {
    pub value: f64,
    pub factors: Vec<ScoreFactor>,
}

impl RelevanceScore {
    pub fn add(&mut self, label: impl Into<String>, weight: f64) {
        self.value += weight;
        self.factors.push(ScoreFactor {
            label: label.into(),
            weight,
        });
    }

    /// Label of the largest contribution; earliest wins on ties.
    pub fn top_reason(&self) -> Option<&str> {
        let mut best: Option<&ScoreFactor> = None;
        for factor in &self.factors {
            match best {
                Some(b) if b.weight >= factor.weight => {}
                _ => best = Some(factor),
            }
        }
        best.map(|f| f.label.as_str())
    }

    /// Labels ordered by descending contribution, stable on ties.
    pub fn ordered_labels(&self) -> Vec<String> {
        let mut factors: Vec<&ScoreFactor> = self.factors.iter().collect();
        factors.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        factors.into_iter().map(|f| f.label.clone()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionMode {
    FullSource,
    Outline,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackEntry {
    pub path: String,
    pub rank: usize,
    pub score: f64,
    pub reason: String,
    pub factors: Vec<String>,
    pub lines: u32,
    pub size: usize,
    pub included_as: InclusionMode,
    pub content: String,
}

/// A candidate passed over because it did not fit.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    pub path: String,
    pub score: f64,
    /// Smallest representation that was tried.
    pub size: usize,
    /// Budget left when the candidate was evaluated.
    pub remaining: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSection {
    pub title: String,
    pub size: usize,
    pub body: String,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysis {
    pub task_type: String,
    pub keywords: Vec<String>,
    pub domain_concepts: Vec<String>,
    pub frameworks: Vec<String>,
}

/// Budget-constrained, relevance-ranked bundle of excerpts.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPack {
    pub task: String,
    pub task_analysis: TaskAnalysis,
    pub strategy: String,
    pub format: String,
    pub budget: usize,
    pub used: usize,
    pub entries: Vec<PackEntry>,
    pub skipped: Vec<SkippedEntry>,
    pub sections: Vec<ContextSection>,
    pub related_tests: Vec<String>,
    pub suggestions: Vec<String>,
    pub notes: Vec<String>,
    pub candidates: usize,
    pub skipped_files: usize,
}

impl ContextPack {
    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.used)
    }
}
