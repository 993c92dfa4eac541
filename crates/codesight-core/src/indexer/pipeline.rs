//! Code model construction with Rayon-based per-file parallelism.
//!
//! Files are read, parsed and scored independently on a worker pool. The
//! `collect` at the end of [`parallel_extract`] is the barrier: import
//! resolution needs every scanned path and only runs afterwards.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ScanOptions;
use crate::errors::CodesightResult;
use crate::indexer::complexity::score_file;
use crate::indexer::filesystem::{content_hash, discover_files, file_id};
use crate::indexer::imports::{module_name_for, resolve_imports, ProjectFiles};
use crate::indexer::parser::{decode_source, parse_python};
use crate::indexer::symbols::extract_file;
use crate::indexer::tags::tag_imports;
use crate::models::{CodeModel, FileModel, ParseFailure, ParseStatus, SourceFile};
use crate::query::guards::clamp_scan_files;

enum SourceInput {
    Disk(std::path::PathBuf),
    Memory(Vec<u8>),
}

struct ExtractJob {
    path: String,
    input: SourceInput,
}

type ExtractOutcome = Result<FileModel, ParseFailure>;

fn model_file(path: &str, bytes: Vec<u8>) -> Result<FileModel, String> {
    let size_bytes = bytes.len() as u64;
    let hash = content_hash(&bytes);
    let source = decode_source(bytes)?;
    let unit = parse_python(source)?;
    let module_name = module_name_for(path);
    let extracted = extract_file(&unit, &module_name);
    let complexity = score_file(
        &extracted.declarations,
        &extracted.metrics,
        &extracted.halstead,
        extracted.module_decisions,
    );
    let tags = tag_imports(&extracted.imports);

    Ok(FileModel {
        file: SourceFile {
            path: path.to_string(),
            id: file_id(path),
            size_bytes,
            content_hash: hash,
            status: ParseStatus::Ok,
            text: unit.source,
        },
        module_name,
        declarations: extracted.declarations,
        imports: extracted.imports,
        constants: extracted.constants,
        metrics: extracted.metrics,
        halstead: extracted.halstead,
        module_decisions: extracted.module_decisions,
        tags,
        complexity,
    })
}

fn extract_file_worker(job: &ExtractJob) -> ExtractOutcome {
    let bytes = match &job.input {
        SourceInput::Disk(absolute) => std::fs::read(absolute),
        SourceInput::Memory(bytes) => Ok(bytes.clone()),
    };
    let result = match bytes {
        Ok(bytes) => model_file(&job.path, bytes),
        Err(e) => Err(format!("read error: {e}")),
    };
    result.map_err(|reason| {
        warn!(path = %job.path, %reason, "file skipped");
        ParseFailure {
            path: job.path.clone(),
            reason,
        }
    })
}

fn parallel_extract(jobs: &[ExtractJob], workers: usize) -> Vec<ExtractOutcome> {
    if jobs.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| jobs.par_iter().map(extract_file_worker).collect()),
        Err(err) => {
            debug!(error = %err, "thread pool unavailable, extracting sequentially");
            jobs.iter().map(extract_file_worker).collect()
        }
    }
}

/// Join per-file outcomes into the snapshot and resolve imports.
fn assemble(root: String, outcomes: Vec<ExtractOutcome>, truncated: usize) -> CodeModel {
    let total_scanned = outcomes.len();
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(file) => files.push(file),
            Err(failure) => failures.push(failure),
        }
    }

    let project = ProjectFiles::new(
        files
            .iter()
            .map(|f: &FileModel| f.path())
            .chain(failures.iter().map(|f| f.path.as_str())),
    );
    let edges = files
        .iter()
        .flat_map(|f| resolve_imports(f.path(), &f.imports, &project))
        .collect();

    CodeModel {
        root,
        files,
        failures,
        edges,
        total_scanned,
        truncated,
    }
}

/// Discover, parse and model every file under `options.path`.
pub fn build_code_model(options: &ScanOptions) -> CodesightResult<CodeModel> {
    options.validate()?;
    let started = Instant::now();
    let root = options.path.as_path();
    let discovery = discover_files(
        root,
        &options.include,
        &options.exclude,
        clamp_scan_files(options.max_scan_files),
    )?;

    let jobs: Vec<ExtractJob> = discovery
        .files
        .iter()
        .map(|rel| ExtractJob {
            path: rel.clone(),
            input: SourceInput::Disk(root.join(rel)),
        })
        .collect();
    let outcomes = parallel_extract(&jobs, options.workers);
    let model = assemble(root_label(root)?, outcomes, discovery.truncated);

    info!(
        root = %root.display(),
        scanned = model.total_scanned,
        modeled = model.modeled_count(),
        failed = model.failure_count(),
        truncated = model.truncated,
        edges = model.edges.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "code model built"
    );
    Ok(model)
}

/// Build a model from in-memory `(relative path, bytes)` pairs, in the order
/// given.
pub fn build_code_model_from_sources(
    root: &str,
    sources: Vec<(String, Vec<u8>)>,
    workers: usize,
) -> CodeModel {
    let jobs: Vec<ExtractJob> = sources
        .into_iter()
        .map(|(path, bytes)| ExtractJob {
            path: path.replace('\\', "/"),
            input: SourceInput::Memory(bytes),
        })
        .collect();
    let outcomes = parallel_extract(&jobs, workers);
    assemble(root.to_string(), outcomes, 0)
}

fn root_label(root: &Path) -> CodesightResult<String> {
    Ok(root.canonicalize()?.to_string_lossy().to_string())
}
