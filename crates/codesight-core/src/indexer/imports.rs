//! Import resolution from import records to project files.

use std::collections::HashSet;

use crate::models::{ImportEdge, ImportRecord, ImportTarget};

/// Lookup set over every scanned path, modeled or not.
#[derive(Clone, Debug, Default)]
pub struct ProjectFiles {
    paths: HashSet<String>,
    top_levels: HashSet<String>,
}

impl ProjectFiles {
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut files = ProjectFiles::default();
        for path in paths {
            let top = path.split('/').next().unwrap_or(path);
            files
                .top_levels
                .insert(top.strip_suffix(".py").unwrap_or(top).to_string());
            files.paths.insert(path.to_string());
        }
        files
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    fn module_file(&self, base: &str) -> Option<String> {
        let candidates = if base.is_empty() {
            vec!["__init__.py".to_string()]
        } else {
            vec![format!("{base}.py"), format!("{base}/__init__.py")]
        };
        candidates.into_iter().find(|c| self.paths.contains(c))
    }
}

/// Dotted module name for a relative path: `pkg/__init__.py` → `pkg`.
pub fn module_name_for(path: &str) -> String {
    let without_ext = path.strip_suffix(".py").unwrap_or(path);
    let without_init = without_ext
        .strip_suffix("/__init__")
        .unwrap_or(without_ext);
    if without_init == "__init__" {
        return String::new();
    }
    without_init.replace('/', ".")
}

pub fn normalize_posix_path(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(part),
        }
    }
    stack.join("/")
}

/// Directory a relative import of `level` dots starts from, or `None` when
/// it climbs above the scan root.
fn relative_base_dir(source_path: &str, level: u32) -> Option<String> {
    let mut parts: Vec<&str> = source_path.split('/').collect();
    parts.pop();
    for _ in 0..level.saturating_sub(1) {
        parts.pop()?;
    }
    Some(parts.join("/"))
}

fn join(dir: &str, dotted: &str) -> String {
    let rel = dotted.replace('.', "/");
    match (dir.is_empty(), rel.is_empty()) {
        (true, _) => rel,
        (false, true) => dir.to_string(),
        (false, false) => normalize_posix_path(&format!("{dir}/{rel}")),
    }
}

fn edge(source_path: &str, import: &ImportRecord, to: ImportTarget, symbols: Vec<String>) -> ImportEdge {
    ImportEdge {
        from: source_path.to_string(),
        to,
        module: import.written_form(),
        symbols,
        line: import.line,
    }
}

/// Resolve one import statement into edges.
///
/// `from pkg import a, b` yields an edge per submodule file that exists plus
/// one edge to `pkg` itself carrying the remaining names, unresolved when
/// `pkg` has no module file. Every record yields at least one edge.
pub fn resolve_import(source_path: &str, import: &ImportRecord, files: &ProjectFiles) -> Vec<ImportEdge> {
    let base = if import.level > 0 {
        match relative_base_dir(source_path, import.level) {
            Some(dir) => join(&dir, &import.module),
            None => {
                return vec![edge(
                    source_path,
                    import,
                    ImportTarget::Unresolved {
                        reason: format!("relative import {} climbs above the project root", import.written_form()),
                    },
                    import.names.clone(),
                )];
            }
        }
    } else {
        import.module.replace('.', "/")
    };

    let mut edges: Vec<ImportEdge> = Vec::new();
    let mut leftover: Vec<String> = Vec::new();
    if import.is_from {
        for name in &import.names {
            let submodule = files.module_file(&join(&base, name)).filter(|_| name != "*");
            match submodule {
                Some(path) if path != source_path => {
                    match edges.iter_mut().find(|e| e.to.in_project_path() == Some(path.as_str())) {
                        Some(existing) => existing.symbols.push(name.clone()),
                        None => edges.push(edge(
                            source_path,
                            import,
                            ImportTarget::InProject { path },
                            vec![name.clone()],
                        )),
                    }
                }
                _ => leftover.push(name.clone()),
            }
        }
    } else {
        leftover = import.names.clone();
    }

    // The package itself is only required when some name was not a submodule.
    if !edges.is_empty() && leftover.is_empty() {
        return edges;
    }
    let module_file = if import.level > 0 || !import.module.is_empty() {
        files.module_file(&base)
    } else {
        None
    };
    let target = match module_file {
        Some(path) => ImportTarget::InProject { path },
        None if import.level > 0 => ImportTarget::Unresolved {
            reason: format!("no module file for {}", import.written_form()),
        },
        None => {
            let top = import.module.split('.').next().unwrap_or_default().to_string();
            if files.top_levels.contains(&top) {
                ImportTarget::Unresolved {
                    reason: format!("module {} not found in project", import.module),
                }
            } else {
                ImportTarget::External { package: top }
            }
        }
    };
    edges.push(edge(source_path, import, target, leftover));
    edges
}

pub fn resolve_imports(source_path: &str, imports: &[ImportRecord], files: &ProjectFiles) -> Vec<ImportEdge> {
    imports
        .iter()
        .flat_map(|import| resolve_import(source_path, import, files))
        .collect()
}
