//! Test-risk prioritisation from externally parsed coverage data.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::config::{CoverageOptions, CoverageThreshold, PriorityFilter, TestFramework};
use crate::errors::CodesightResult;
use crate::models::{CodeModel, CoverageRecord, Declaration, FileModel};

const CRITICAL_COMPLEXITY: u32 = 30;
const HIGH_COMPLEXITY: u32 = 50;
const HIGH_COVERAGE_CEILING: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// True when this priority is at or above the filter level.
    pub fn passes(&self, filter: PriorityFilter) -> bool {
        let floor = match filter {
            PriorityFilter::All => return true,
            PriorityFilter::Critical => Priority::Critical,
            PriorityFilter::High => Priority::High,
            PriorityFilter::Medium => Priority::Medium,
            PriorityFilter::Low => Priority::Low,
        };
        *self <= floor
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityRule {
    CoreUntestedComplex,
    InterfaceUnderTested,
    BelowThreshold,
    None,
}

impl PriorityRule {
    pub fn describe(&self) -> &'static str {
        match self {
            PriorityRule::CoreUntestedComplex => "core module with no coverage and complexity above 30",
            PriorityRule::InterfaceUnderTested => {
                "interface module below 50% coverage or complexity above 50"
            }
            PriorityRule::BelowThreshold => "below the configured coverage threshold",
            PriorityRule::None => "meets the configured thresholds",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UntestedDeclaration {
    pub name: String,
    pub kind: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageGap {
    pub path: String,
    pub line_coverage: f64,
    pub function_coverage: f64,
    pub branch_coverage: Option<f64>,
    pub complexity: u32,
    pub priority: Priority,
    pub rule: PriorityRule,
    pub reason: String,
    pub has_coverage_data: bool,
    pub untested: Vec<UntestedDeclaration>,
    pub scaffold: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallCoverage {
    pub lines: f64,
    pub functions: f64,
    pub branches: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub overall: OverallCoverage,
    pub tested_files: usize,
    pub untested_files: usize,
    pub by_priority: PriorityCounts,
    pub skipped_files: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub project: String,
    pub framework: String,
    pub threshold: CoverageThreshold,
    pub summary: CoverageSummary,
    pub gaps: Vec<CoverageGap>,
    pub recommendations: Vec<String>,
}

fn matches_location(path: &str, patterns: &[String]) -> bool {
    let lower = path.to_lowercase();
    patterns
        .iter()
        .any(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
}

/// Highest matching priority rule for one file.
pub fn classify(
    path: &str,
    record: &CoverageRecord,
    function_coverage: f64,
    complexity: u32,
    options: &CoverageOptions,
) -> (Priority, PriorityRule) {
    let line_coverage = record.line_percent();
    if matches_location(path, &options.core_patterns)
        && record.lines_covered == 0
        && complexity > CRITICAL_COMPLEXITY
    {
        return (Priority::Critical, PriorityRule::CoreUntestedComplex);
    }
    if matches_location(path, &options.interface_patterns)
        && (line_coverage < HIGH_COVERAGE_CEILING || complexity > HIGH_COMPLEXITY)
    {
        return (Priority::High, PriorityRule::InterfaceUnderTested);
    }
    let t = &options.threshold;
    let below = line_coverage < t.lines
        || function_coverage < t.functions
        || record.branch_percent().is_some_and(|b| b < t.branches);
    if below {
        return (Priority::Medium, PriorityRule::BelowThreshold);
    }
    (Priority::Low, PriorityRule::None)
}

fn untested_declarations(file: &FileModel, record: &CoverageRecord) -> Vec<UntestedDeclaration> {
    file.declarations
        .iter()
        .filter_map(|decl| {
            let (start, end) = decl.line_span()?;
            if !record.span_unexercised(start, end) {
                return None;
            }
            let (name, kind) = match decl {
                Declaration::Class(c) => (c.qualified_name.clone(), "class"),
                Declaration::Function(f) if f.is_method => (f.qualified_name.clone(), "method"),
                Declaration::Function(f) => (f.qualified_name.clone(), "function"),
                Declaration::Module { .. } => return None,
            };
            Some(UntestedDeclaration {
                name,
                kind: kind.to_string(),
                start_line: start,
                end_line: end,
            })
        })
        .collect()
}

fn function_coverage(file: &FileModel, record: &CoverageRecord) -> f64 {
    let spans: Vec<(u32, u32)> = file.functions().map(|f| (f.start_line, f.end_line)).collect();
    if spans.is_empty() {
        return 100.0;
    }
    let exercised = spans
        .iter()
        .filter(|(start, end)| !record.span_unexercised(*start, *end))
        .count();
    exercised as f64 * 100.0 / spans.len() as f64
}

fn test_name(qualified: &str) -> String {
    format!("test_{}", qualified.replace('.', "_").to_lowercase())
}

fn class_name_for(module: &str) -> String {
    let last = module.rsplit('.').next().unwrap_or(module);
    let camel: String = last
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    format!("Test{camel}")
}

/// Test skeleton naming every untested function and method.
pub fn test_scaffold(module: &str, untested: &[UntestedDeclaration], framework: TestFramework) -> Option<String> {
    let targets: Vec<&UntestedDeclaration> = untested.iter().filter(|d| d.kind != "class").collect();
    if targets.is_empty() {
        return None;
    }
    let mut imports: Vec<&str> = targets
        .iter()
        .map(|d| d.name.split('.').next().unwrap_or(&d.name))
        .collect();
    imports.sort();
    imports.dedup();

    let mut out = String::new();
    match framework {
        TestFramework::Pytest => out.push_str("import pytest\n"),
        TestFramework::Unittest => out.push_str("import unittest\n"),
    }
    if !module.is_empty() {
        out.push_str(&format!("\nfrom {module} import {}\n", imports.join(", ")));
    }
    out.push('\n');

    match framework {
        TestFramework::Pytest => {
            for decl in targets {
                out.push_str(&format!(
                    "\ndef {}():\n    pytest.skip(\"cover {} (lines {}-{})\")\n\n",
                    test_name(&decl.name),
                    decl.name,
                    decl.start_line,
                    decl.end_line
                ));
            }
        }
        TestFramework::Unittest => {
            out.push_str(&format!("\nclass {}(unittest.TestCase):\n", class_name_for(module)));
            for decl in targets {
                out.push_str(&format!(
                    "    def {}(self):\n        self.skipTest(\"cover {} (lines {}-{})\")\n\n",
                    test_name(&decl.name),
                    decl.name,
                    decl.start_line,
                    decl.end_line
                ));
            }
            out.push_str("\nif __name__ == \"__main__\":\n    unittest.main()\n");
        }
    }
    Some(out)
}

fn recommendations(summary: &CoverageSummary, threshold: &CoverageThreshold) -> Vec<String> {
    let mut out = Vec::new();
    let counts = &summary.by_priority;
    if counts.critical > 0 {
        out.push(format!(
            "Add tests for {} core modules that have no coverage and high complexity.",
            counts.critical
        ));
    }
    if counts.high > 0 {
        out.push(format!(
            "Raise coverage of {} interface modules below 50% or with complexity above 50.",
            counts.high
        ));
    }
    if summary.overall.lines < threshold.lines {
        out.push(format!(
            "Overall line coverage {:.1}% is below the {:.0}% threshold.",
            summary.overall.lines, threshold.lines
        ));
    }
    if summary.skipped_files > 0 {
        out.push(format!(
            "{} files could not be parsed and were left out of coverage analysis.",
            summary.skipped_files
        ));
    }
    if out.is_empty() {
        out.push("Coverage meets the configured thresholds.".to_string());
    }
    out
}

/// Rank every modeled file by test risk. Files without a coverage record
/// count as entirely unexercised.
pub fn analyze_coverage(
    model: &CodeModel,
    records: &HashMap<String, CoverageRecord>,
    options: &CoverageOptions,
) -> CodesightResult<CoverageReport> {
    options.validate()?;

    let mut gaps = Vec::new();
    let mut summary = CoverageSummary {
        skipped_files: model.failure_count(),
        ..CoverageSummary::default()
    };
    let (mut covered_lines, mut total_lines) = (0u64, 0u64);
    let (mut exercised_functions, mut total_functions) = (0.0f64, 0usize);
    let (mut covered_branches, mut total_branches) = (0u64, 0u64);

    for file in &model.files {
        let path = file.path();
        let has_coverage_data = records.contains_key(path);
        let record = records.get(path).cloned().unwrap_or_else(|| CoverageRecord {
            total_lines: file.metrics.sloc,
            ..CoverageRecord::default()
        });

        let functions = function_coverage(file, &record);
        let complexity = file.complexity.total;
        let (priority, rule) = classify(path, &record, functions, complexity, options);

        covered_lines += record.lines_covered as u64;
        total_lines += record.total_lines as u64;
        let function_count = file.functions().count();
        exercised_functions += functions * function_count as f64 / 100.0;
        total_functions += function_count;
        if let (Some(covered), Some(total)) = (record.branches_covered, record.branches_total) {
            covered_branches += covered as u64;
            total_branches += total as u64;
        }
        if record.lines_covered > 0 {
            summary.tested_files += 1;
        } else {
            summary.untested_files += 1;
        }
        match priority {
            Priority::Critical => summary.by_priority.critical += 1,
            Priority::High => summary.by_priority.high += 1,
            Priority::Medium => summary.by_priority.medium += 1,
            Priority::Low => summary.by_priority.low += 1,
        }

        if !priority.passes(options.priority) {
            continue;
        }
        let untested = untested_declarations(file, &record);
        let scaffold = if priority == Priority::Low {
            None
        } else {
            test_scaffold(&file.module_name, &untested, options.framework)
        };
        gaps.push(CoverageGap {
            path: path.to_string(),
            line_coverage: record.line_percent(),
            function_coverage: functions,
            branch_coverage: record.branch_percent(),
            complexity,
            priority,
            rule,
            reason: rule.describe().to_string(),
            has_coverage_data,
            untested,
            scaffold,
        });
    }

    gaps.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.complexity.cmp(&a.complexity))
    });

    summary.overall = OverallCoverage {
        lines: if total_lines == 0 {
            0.0
        } else {
            covered_lines as f64 * 100.0 / total_lines as f64
        },
        functions: if total_functions == 0 {
            100.0
        } else {
            exercised_functions * 100.0 / total_functions as f64
        },
        branches: (total_branches > 0)
            .then(|| covered_branches as f64 * 100.0 / total_branches as f64),
    };
    debug!(
        files = model.files.len(),
        gaps = gaps.len(),
        critical = summary.by_priority.critical,
        "coverage prioritised"
    );

    Ok(CoverageReport {
        project: model.project_name(),
        framework: match options.framework {
            TestFramework::Pytest => "pytest".to_string(),
            TestFramework::Unittest => "unittest".to_string(),
        },
        threshold: options.threshold,
        recommendations: recommendations(&summary, &options.threshold),
        summary,
        gaps,
    })
}
