//! Criterion benchmarks for codesight-core.
//!
//! ## Benchmark groups
//!
//! 1. **guards**: bound clamping and task truncation.
//! 2. **token_estimation**: token counting at various text sizes.
//! 3. **parsing**: tree-sitter parse plus declaration extraction of one file.
//! 4. **model_build**: whole-tree modeling, sequential vs. parallel.
//! 5. **graph**: cycle enumeration and dependency analysis on synthetic graphs.
//! 6. **context**: context assembly per strategy.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/codesight-core/Cargo.toml
//! # Run only the graph group:
//! cargo bench --manifest-path crates/codesight-core/Cargo.toml -- graph
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use codesight_core::build_code_model_from_sources;
use codesight_core::config::{ContextOptions, DependencyOptions, Strategy};
use codesight_core::indexer::filesystem::glob_match;
use codesight_core::indexer::graph::ModuleGraph;
use codesight_core::indexer::parser::parse_python;
use codesight_core::indexer::symbols::extract_file;
use codesight_core::models::CodeModel;
use codesight_core::query::context::assemble_context;
use codesight_core::query::cycles::find_cycles;
use codesight_core::query::dependencies::analyze_dependencies;
use codesight_core::query::guards::{clamp_budget, clamp_int, truncate_task};
use codesight_core::query::tokenizer::{estimate_tokens, task_keywords};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const SERVICE_SOURCE: &str = r#""""User service layer."""
import logging
from typing import Optional

from .models import User
from .repository import UserRepository

MAX_RETRIES = 3
log = logging.getLogger(__name__)


class UserService:
    """Coordinates user lookups and updates."""

    def __init__(self, repo: UserRepository, *, strict: bool = False):
        self.repo = repo
        self.strict = strict

    def find(self, user_id: int) -> Optional[User]:
        for attempt in range(MAX_RETRIES):
            try:
                user = self.repo.get(user_id)
            except KeyError:
                log.warning("missing user %s", user_id)
                continue
            else:
                return user if user and user.active else None
        return None

    async def rename(self, user_id: int, name: str) -> bool:
        user = self.find(user_id)
        if user is None or not name:
            return False
        elif self.strict and len(name) > 64:
            raise ValueError("name too long")
        user.name = name
        return True

    def active_names(self):
        return [u.name for u in self.repo.all() if u.active and u.name]
"#;

/// `n` modules in packages of four; each imports the next and every fifth
/// imports back three steps, giving a mix of chains and cycles.
fn synthetic_sources(n: usize) -> Vec<(String, Vec<u8>)> {
    (0..n)
        .map(|i| {
            let mut body = format!("import pkg{}.mod{}\n", ((i + 1) % n) / 4, (i + 1) % n);
            if i % 5 == 0 && i >= 3 {
                body.push_str(&format!("import pkg{}.mod{}\n", (i - 3) / 4, i - 3));
            }
            let class_start = SERVICE_SOURCE.find("class UserService").unwrap_or(0);
            body.push_str("\nMAX_RETRIES = 3\n\n");
            body.push_str(&SERVICE_SOURCE[class_start..]);
            (format!("pkg{}/mod{i}.py", i / 4), body.into_bytes())
        })
        .collect()
}

fn synthetic_model(n: usize) -> CodeModel {
    build_code_model_from_sources("bench", synthetic_sources(n), 4)
}

// ---------------------------------------------------------------------------
// Benchmark: guards
// ---------------------------------------------------------------------------

fn bench_guards(c: &mut Criterion) {
    let mut group = c.benchmark_group("guards");

    group.bench_function("clamp_int", |b| {
        b.iter(|| clamp_int(black_box(150), black_box(1), black_box(100)));
    });

    group.bench_function("clamp_budget", |b| {
        b.iter(|| clamp_budget(black_box(500_000)));
    });

    let long_task = "refactor the billing export ".repeat(40);
    group.bench_function("truncate_task_long", |b| {
        b.iter(|| truncate_task(black_box(&long_task)));
    });

    group.bench_function("glob_match_double_star", |b| {
        b.iter(|| glob_match(black_box("src/app/api/v1/users/views.py"), black_box("**/api/**/*.py")));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: token estimation
// ---------------------------------------------------------------------------

fn bench_token_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_estimation");
    for &size in &[100usize, 10_000, 1_000_000] {
        let text = "x".repeat(size);
        group.bench_with_input(BenchmarkId::new("estimate_tokens", size), &text, |b, text| {
            b.iter(|| estimate_tokens(black_box(text)));
        });
    }
    group.bench_function("task_keywords", |b| {
        b.iter(|| task_keywords(black_box("Fix the user authentication flow in the API handlers")));
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: parsing
// ---------------------------------------------------------------------------

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    group.bench_function("parse_python", |b| {
        b.iter(|| parse_python(black_box(SERVICE_SOURCE.to_string())).unwrap());
    });

    group.bench_function("extract_file", |b| {
        let unit = parse_python(SERVICE_SOURCE.to_string()).unwrap();
        b.iter(|| extract_file(black_box(&unit), "app.services.user"));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: model build
// ---------------------------------------------------------------------------

fn bench_model_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_build");
    group.sample_size(20);

    for &n_files in &[50usize, 200] {
        let sources = synthetic_sources(n_files);
        for &workers in &[1usize, 4] {
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{workers}"), n_files),
                &sources,
                |b, sources| {
                    b.iter_with_setup(
                        || sources.clone(),
                        |sources| black_box(build_code_model_from_sources("bench", sources, workers)),
                    );
                },
            );
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: graph
// ---------------------------------------------------------------------------

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph");

    for &n in &[100usize, 400] {
        let model = synthetic_model(n);
        group.bench_with_input(BenchmarkId::new("build", n), &model, |b, model| {
            b.iter(|| ModuleGraph::build(black_box(model), false));
        });

        let graph = ModuleGraph::build(&model, false);
        group.bench_with_input(BenchmarkId::new("find_cycles", n), &graph, |b, graph| {
            b.iter(|| find_cycles(black_box(graph), 3, 1000));
        });

        group.bench_with_input(BenchmarkId::new("analyze_dependencies", n), &model, |b, model| {
            let options = DependencyOptions::default();
            b.iter(|| analyze_dependencies(black_box(model), &options).unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: context assembly
// ---------------------------------------------------------------------------

fn bench_context(c: &mut Criterion) {
    let mut group = c.benchmark_group("context");
    let model = synthetic_model(200);

    for strategy in [Strategy::Relevance, Strategy::Breadth, Strategy::Depth] {
        let options = ContextOptions {
            strategy,
            focus: vec!["pkg3/".to_string()],
            ..ContextOptions::new("rename user in the service module")
        };
        group.bench_function(BenchmarkId::new("assemble", strategy.as_str()), |b| {
            b.iter(|| assemble_context(black_box(&model), &options).unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_guards,
    bench_token_estimation,
    bench_parsing,
    bench_model_build,
    bench_graph,
    bench_context,
);
criterion_main!(benches);
