//! Static import-name tables for framework and domain-concept tags.

use crate::models::{FileTags, ImportRecord};

/// Framework name and the top-level import names that identify it.
const FRAMEWORK_PATTERNS: &[(&str, &[&str])] = &[
    ("pandas", &["pandas"]),
    ("numpy", &["numpy"]),
    ("sklearn", &["sklearn", "scikit_learn"]),
    ("matplotlib", &["matplotlib"]),
    ("seaborn", &["seaborn"]),
    ("fastapi", &["fastapi"]),
    ("django", &["django"]),
    ("flask", &["flask"]),
    ("jupyter", &["jupyter", "ipython", "IPython", "ipywidgets"]),
    ("tensorflow", &["tensorflow", "keras"]),
    ("pytorch", &["torch", "pytorch"]),
    ("scipy", &["scipy"]),
    ("plotly", &["plotly"]),
    ("streamlit", &["streamlit"]),
    ("sqlalchemy", &["sqlalchemy"]),
    ("pytest", &["pytest"]),
    ("aiohttp", &["aiohttp"]),
    ("click", &["click"]),
    ("typer", &["typer"]),
];

const DOMAIN_BY_FRAMEWORK: &[(&str, &str)] = &[
    ("pandas", "data-analysis"),
    ("numpy", "data-analysis"),
    ("scipy", "data-analysis"),
    ("sklearn", "machine-learning"),
    ("tensorflow", "machine-learning"),
    ("pytorch", "machine-learning"),
    ("fastapi", "web-api"),
    ("django", "web-api"),
    ("flask", "web-api"),
    ("aiohttp", "web-api"),
    ("matplotlib", "visualization"),
    ("seaborn", "visualization"),
    ("plotly", "visualization"),
    ("streamlit", "visualization"),
    ("sqlalchemy", "database"),
    ("pytest", "testing"),
    ("click", "cli"),
    ("typer", "cli"),
];

/// Library modules that imply a domain without being a tracked framework.
const DOMAIN_BY_MODULE: &[(&str, &str)] = &[
    ("sqlite3", "database"),
    ("psycopg2", "database"),
    ("pymongo", "database"),
    ("redis", "database"),
    ("unittest", "testing"),
    ("asyncio", "async-io"),
    ("aiohttp", "async-io"),
    ("argparse", "cli"),
];

/// Words in a task description that point at a domain concept.
const DOMAIN_VOCABULARY: &[(&str, &[&str])] = &[
    (
        "data-analysis",
        &["data", "dataframe", "pandas", "numpy", "csv", "excel", "analysis", "preprocessing", "etl", "cleaning"],
    ),
    (
        "machine-learning",
        &["model", "train", "training", "predict", "prediction", "sklearn", "feature", "pipeline", "ml", "learning"],
    ),
    (
        "web-api",
        &["api", "endpoint", "route", "request", "response", "view", "handler", "http", "rest"],
    ),
    ("visualization", &["plot", "chart", "graph", "visualize", "dashboard", "figure"]),
    ("database", &["database", "sql", "query", "table", "migration", "orm", "schema"]),
    ("testing", &["test", "tests", "testing", "coverage", "fixture", "mock"]),
    ("async-io", &["async", "await", "concurrent", "asyncio"]),
    ("cli", &["cli", "command", "argument", "flag", "option"]),
];

fn import_matches(import_name: &str, pattern: &str) -> bool {
    import_name == pattern
        || import_name
            .strip_prefix(pattern)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Tag a file from the modules it imports. Relative imports never tag.
pub fn tag_imports(imports: &[ImportRecord]) -> FileTags {
    let names: Vec<&str> = imports
        .iter()
        .filter(|i| i.level == 0 && !i.module.is_empty())
        .map(|i| i.module.as_str())
        .collect();

    let mut frameworks: Vec<String> = FRAMEWORK_PATTERNS
        .iter()
        .filter(|(_, patterns)| {
            patterns
                .iter()
                .any(|p| names.iter().any(|name| import_matches(name, p)))
        })
        .map(|(framework, _)| framework.to_string())
        .collect();
    frameworks.sort();

    let mut domains: Vec<String> = DOMAIN_BY_FRAMEWORK
        .iter()
        .filter(|(framework, _)| frameworks.iter().any(|f| f == framework))
        .map(|(_, domain)| domain.to_string())
        .chain(
            DOMAIN_BY_MODULE
                .iter()
                .filter(|(module, _)| names.iter().any(|name| import_matches(name, module)))
                .map(|(_, domain)| domain.to_string()),
        )
        .collect();
    domains.sort();
    domains.dedup();

    FileTags {
        frameworks,
        domains,
    }
}

/// Primary project type from the project-wide framework set.
pub fn project_type(frameworks: &[String]) -> &'static str {
    let has = |name: &str| frameworks.iter().any(|f| f == name);
    if has("fastapi") {
        "fastapi"
    } else if has("django") {
        "django"
    } else if has("flask") {
        "flask"
    } else if has("pandas") || has("numpy") {
        "data-analysis"
    } else if has("tensorflow") || has("pytorch") {
        "machine-learning"
    } else if has("jupyter") {
        "jupyter"
    } else {
        "python"
    }
}

/// Domain concepts hinted at by task keywords, in table order.
pub fn domains_for_keywords(keywords: &[String]) -> Vec<String> {
    DOMAIN_VOCABULARY
        .iter()
        .filter(|(_, words)| keywords.iter().any(|k| words.contains(&k.as_str())))
        .map(|(domain, _)| domain.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(module: &str) -> ImportRecord {
        ImportRecord {
            module: module.to_string(),
            level: 0,
            names: vec![],
            is_from: false,
            line: 1,
        }
    }

    #[test]
    fn test_tag_imports_frameworks_and_domains() {
        let tags = tag_imports(&[
            import("pandas"),
            import("matplotlib.pyplot"),
            import("sqlite3"),
            import("os"),
        ]);
        assert_eq!(tags.frameworks, vec!["matplotlib", "pandas"]);
        assert_eq!(tags.domains, vec!["data-analysis", "database", "visualization"]);
    }

    #[test]
    fn test_prefix_must_end_on_segment() {
        let tags = tag_imports(&[import("pandas_extra"), import("flaskish")]);
        assert!(tags.frameworks.is_empty());
    }

    #[test]
    fn test_relative_imports_never_tag() {
        let mut record = import("flask");
        record.level = 1;
        assert!(tag_imports(&[record]).frameworks.is_empty());
    }

    #[test]
    fn test_project_type_precedence() {
        let fw = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(project_type(&fw(&["flask", "fastapi"])), "fastapi");
        assert_eq!(project_type(&fw(&["numpy", "pytorch"])), "data-analysis");
        assert_eq!(project_type(&fw(&["pytorch"])), "machine-learning");
        assert_eq!(project_type(&fw(&[])), "python");
    }

    #[test]
    fn test_domains_for_keywords() {
        let keywords = vec!["add".to_string(), "endpoint".to_string(), "csv".to_string()];
        assert_eq!(
            domains_for_keywords(&keywords),
            vec!["data-analysis", "web-api"]
        );
    }
}
