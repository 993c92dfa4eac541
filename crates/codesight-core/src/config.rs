//! Invocation configuration bundle.
//!
//! Each consumer gets its own option struct. All of them deserialize from
//! camelCase JSON with every field optional, and all of them are validated
//! before any file is touched.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{CodesightError, CodesightResult};
use crate::models::DeclarationCategory;
use crate::query::guards::{
    clamp_depth, DEFAULT_CONTEXT_TOKEN_BUDGET, DEFAULT_CRITICAL_CYCLE_LENGTH,
    DEFAULT_FOCUS_DEPTH, DEFAULT_HOTSPOT_PERCENTILE, DEFAULT_MAX_SCAN_FILES, MAX_CYCLES,
    MAX_FOCUS_DEPTH,
};

const DEFAULT_WORKERS: usize = 4;

fn env_workers() -> Option<usize> {
    std::env::var("CODESIGHT_WORKERS")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
}

pub fn default_include_patterns() -> Vec<String> {
    vec!["**/*.py".to_string()]
}

pub fn default_exclude_patterns() -> Vec<String> {
    [
        "**/venv/**",
        "**/.venv/**",
        "**/env/**",
        "**/site-packages/**",
        "**/__pycache__/**",
        "**/build/**",
        "**/dist/**",
        "**/.git/**",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanOptions {
    pub path: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_scan_files: usize,
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            include: default_include_patterns(),
            exclude: default_exclude_patterns(),
            max_scan_files: DEFAULT_MAX_SCAN_FILES,
            workers: env_workers().unwrap_or(DEFAULT_WORKERS),
        }
    }
}

impl ScanOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CodesightResult<()> {
        if self.workers == 0 {
            return Err(CodesightError::config("workers must be at least 1"));
        }
        if self.max_scan_files == 0 {
            return Err(CodesightError::config("maxScanFiles must be at least 1"));
        }
        if !self.path.is_dir() {
            return Err(CodesightError::config(format!(
                "path is not a directory: {}",
                self.path.display()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Architecture
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    #[serde(alias = "o")]
    Overview,
    #[default]
    #[serde(alias = "d")]
    Detailed,
    #[serde(alias = "x")]
    Deep,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchitectureOptions {
    pub depth: AnalysisDepth,
    pub types: Vec<DeclarationCategory>,
    pub include_metrics: bool,
    pub include_detailed_metrics: bool,
    pub min_complexity: u32,
    pub max_files: usize,
}

impl Default for ArchitectureOptions {
    fn default() -> Self {
        Self {
            depth: AnalysisDepth::Detailed,
            types: Vec::new(),
            include_metrics: true,
            include_detailed_metrics: false,
            min_complexity: 0,
            max_files: 50,
        }
    }
}

impl ArchitectureOptions {
    pub fn wants(&self, category: DeclarationCategory) -> bool {
        self.types.is_empty() || self.types.contains(&category)
    }
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    Dependencies,
    Dependents,
    #[default]
    Both,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyOptions {
    pub circular: bool,
    pub metrics: bool,
    pub diagram: bool,
    pub focus: Option<String>,
    pub depth: i64,
    pub direction: TraversalDirection,
    pub include_external: bool,
    pub critical_cycle_length: usize,
    pub hotspot_percentile: f64,
    pub max_cycles: usize,
}

impl Default for DependencyOptions {
    fn default() -> Self {
        Self {
            circular: true,
            metrics: true,
            diagram: false,
            focus: None,
            depth: DEFAULT_FOCUS_DEPTH,
            direction: TraversalDirection::Both,
            include_external: false,
            critical_cycle_length: DEFAULT_CRITICAL_CYCLE_LENGTH,
            hotspot_percentile: DEFAULT_HOTSPOT_PERCENTILE,
            max_cycles: MAX_CYCLES,
        }
    }
}

impl DependencyOptions {
    pub fn validate(&self) -> CodesightResult<()> {
        if self.depth < 0 {
            return Err(CodesightError::config("depth must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.hotspot_percentile) {
            return Err(CodesightError::config(
                "hotspotPercentile must lie in [0, 1]",
            ));
        }
        if self.critical_cycle_length == 0 {
            return Err(CodesightError::config(
                "criticalCycleLength must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn focus_depth(&self) -> usize {
        clamp_depth(self.depth, MAX_FOCUS_DEPTH) as usize
    }

    pub fn cycle_cap(&self) -> usize {
        self.max_cycles.clamp(1, MAX_CYCLES)
    }
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageThreshold {
    pub lines: f64,
    pub functions: f64,
    pub branches: f64,
}

impl Default for CoverageThreshold {
    fn default() -> Self {
        Self {
            lines: 80.0,
            functions: 80.0,
            branches: 70.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityFilter {
    #[default]
    All,
    #[serde(alias = "crit")]
    Critical,
    High,
    #[serde(alias = "med")]
    Medium,
    Low,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    #[default]
    Pytest,
    Unittest,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageOptions {
    pub threshold: CoverageThreshold,
    pub priority: PriorityFilter,
    pub core_patterns: Vec<String>,
    pub interface_patterns: Vec<String>,
    pub framework: TestFramework,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            threshold: CoverageThreshold::default(),
            priority: PriorityFilter::All,
            core_patterns: ["core", "engine", "service", "domain"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            interface_patterns: [
                "api",
                "handler",
                "view",
                "route",
                "endpoint",
                "controller",
                "cli",
                "interface",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            framework: TestFramework::Pytest,
        }
    }
}

impl CoverageOptions {
    pub fn validate(&self) -> CodesightResult<()> {
        let t = &self.threshold;
        for (name, value) in [
            ("lines", t.lines),
            ("functions", t.functions),
            ("branches", t.branches),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(CodesightError::config(format!(
                    "threshold.{name} must lie in [0, 100], got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "md")]
    Markdown,
    #[serde(alias = "structured-data")]
    Json,
    #[serde(alias = "markup")]
    Xml,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    #[serde(alias = "rel")]
    Relevance,
    #[serde(alias = "wide")]
    Breadth,
    #[serde(alias = "deep")]
    Depth,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Relevance => "relevance",
            Strategy::Breadth => "breadth",
            Strategy::Depth => "depth",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Files,
    Arch,
    Deps,
    Tests,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextOptions {
    pub task: String,
    pub tokens: i64,
    pub include: Vec<ContentKind>,
    pub focus: Vec<String>,
    pub format: OutputFormat,
    pub line_numbers: bool,
    pub strategy: Strategy,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            task: String::new(),
            tokens: DEFAULT_CONTEXT_TOKEN_BUDGET,
            include: vec![ContentKind::Files, ContentKind::Arch],
            focus: Vec::new(),
            format: OutputFormat::Markdown,
            line_numbers: false,
            strategy: Strategy::Relevance,
        }
    }
}

impl ContextOptions {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CodesightResult<()> {
        if self.task.trim().is_empty() {
            return Err(CodesightError::config("task must not be empty"));
        }
        if self.tokens < 0 {
            return Err(CodesightError::config(format!(
                "token budget must not be negative, got {}",
                self.tokens
            )));
        }
        Ok(())
    }

    pub fn includes(&self, kind: ContentKind) -> bool {
        self.include.contains(&kind)
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The full option bundle for one invocation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub scan: ScanOptions,
    pub architecture: ArchitectureOptions,
    pub dependencies: DependencyOptions,
    pub coverage: CoverageOptions,
    pub context: Option<ContextOptions>,
}

impl AnalysisConfig {
    /// Parse a JSON bundle. Malformed input is a configuration error.
    pub fn from_json(json: &str) -> CodesightResult<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)
            .map_err(|e| CodesightError::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates everything except the scan path, which is checked when the
    /// scan actually starts.
    pub fn validate(&self) -> CodesightResult<()> {
        if self.scan.workers == 0 {
            return Err(CodesightError::config("workers must be at least 1"));
        }
        self.dependencies.validate()?;
        self.coverage.validate()?;
        if let Some(context) = &self.context {
            context.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let deps = DependencyOptions::default();
        assert_eq!(deps.critical_cycle_length, 3);
        assert!((deps.hotspot_percentile - 0.9).abs() < 1e-12);
        assert_eq!(deps.focus_depth(), 5);

        let ctx = ContextOptions::default();
        assert_eq!(ctx.tokens, 8000);
        assert!(ctx.includes(ContentKind::Files));
        assert!(!ctx.includes(ContentKind::Deps));
    }

    #[test]
    fn test_from_json_with_aliases() {
        let json = r#"{
            "architecture": {"depth": "x", "types": ["class", "func"], "minComplexity": 5},
            "dependencies": {"focus": "pkg/a.py", "depth": 2, "direction": "dependents"},
            "coverage": {"priority": "crit", "threshold": {"lines": 60}},
            "context": {"task": "fix login bug", "tokens": 500, "format": "structured-data",
                        "strategy": "wide", "include": ["files", "deps"], "lineNumbers": true}
        }"#;
        let config = AnalysisConfig::from_json(json).unwrap();
        assert_eq!(config.architecture.depth, AnalysisDepth::Deep);
        assert!(config.architecture.wants(DeclarationCategory::Function));
        assert!(!config.architecture.wants(DeclarationCategory::Method));
        assert_eq!(config.dependencies.direction, TraversalDirection::Dependents);
        assert_eq!(config.dependencies.focus_depth(), 2);
        assert_eq!(config.coverage.priority, PriorityFilter::Critical);
        assert_eq!(config.coverage.threshold.lines, 60.0);
        assert_eq!(config.coverage.threshold.functions, 80.0);
        let ctx = config.context.unwrap();
        assert_eq!(ctx.format, OutputFormat::Json);
        assert_eq!(ctx.strategy, Strategy::Breadth);
        assert!(ctx.line_numbers);
    }

    #[test]
    fn test_negative_budget_rejected() {
        let json = r#"{"context": {"task": "anything", "tokens": -1}}"#;
        let err = AnalysisConfig::from_json(json).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_content_kind_rejected() {
        let json = r#"{"context": {"task": "t", "include": ["files", "history"]}}"#;
        assert!(AnalysisConfig::from_json(json).unwrap_err().is_configuration());
    }

    #[test]
    fn test_percentile_out_of_range_rejected() {
        let json = r#"{"dependencies": {"hotspotPercentile": 1.5}}"#;
        assert!(AnalysisConfig::from_json(json).unwrap_err().is_configuration());
    }

    #[test]
    fn test_depth_is_clamped() {
        let opts = DependencyOptions {
            depth: 99,
            ..Default::default()
        };
        assert_eq!(opts.focus_depth(), MAX_FOCUS_DEPTH as usize);
        let opts = DependencyOptions {
            depth: 0,
            ..Default::default()
        };
        assert_eq!(opts.focus_depth(), 1);
    }

    #[test]
    fn test_scan_rejects_missing_directory() {
        let opts = ScanOptions::new("/definitely/not/here");
        assert!(opts.validate().unwrap_err().is_configuration());
    }
}
