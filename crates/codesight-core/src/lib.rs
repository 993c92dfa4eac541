//! Codesight core library: static analysis of Python source trees.
//!
//! The indexer turns a directory into an immutable [`models::CodeModel`]
//! (declarations, imports, complexity, tags). The query layer reads that
//! snapshot to report architecture, dependency structure, test risk and
//! task-specific context packs. Every entry point below validates its
//! configuration before the first file is read.

pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod query;

use std::collections::HashMap;

use config::AnalysisConfig;
use errors::{CodesightError, CodesightResult};
use models::{CodeModel, ContextPack, CoverageRecord};
use query::architecture::{analyze_architecture, ArchitectureReport};
use query::coverage::{analyze_coverage, CoverageReport};
use query::dependencies::{analyze_dependencies, DependencyReport};

pub use indexer::pipeline::{build_code_model, build_code_model_from_sources};

fn scan(config: &AnalysisConfig) -> CodesightResult<CodeModel> {
    config.validate()?;
    build_code_model(&config.scan)
}

/// Parse externally produced coverage data keyed by relative path.
pub fn load_coverage(json: &str) -> CodesightResult<HashMap<String, CoverageRecord>> {
    serde_json::from_str(json).map_err(|e| CodesightError::Parse(format!("coverage data: {e}")))
}

pub fn run_architecture(config: &AnalysisConfig) -> CodesightResult<ArchitectureReport> {
    let model = scan(config)?;
    Ok(analyze_architecture(&model, &config.architecture))
}

pub fn run_dependencies(config: &AnalysisConfig) -> CodesightResult<DependencyReport> {
    let model = scan(config)?;
    analyze_dependencies(&model, &config.dependencies)
}

pub fn run_coverage(
    config: &AnalysisConfig,
    records: &HashMap<String, CoverageRecord>,
) -> CodesightResult<CoverageReport> {
    let model = scan(config)?;
    analyze_coverage(&model, records, &config.coverage)
}

/// Assemble a context pack and render it in the configured format.
pub fn run_context(config: &AnalysisConfig) -> CodesightResult<(ContextPack, String)> {
    let options = config
        .context
        .as_ref()
        .ok_or_else(|| CodesightError::config("context options are required"))?;
    let model = scan(config)?;
    let pack = query::context::assemble_context(&model, options)?;
    let rendered = query::render::render_context(&pack, options.format)?;
    Ok((pack, rendered))
}
