//! Filesystem discovery helpers for a scan pass.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{CodesightError, CodesightResult};

const DEFAULT_SENSITIVE_EXCLUDE_PATTERNS: &[&str] = &[
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "*.p12",
    "*secret*",
    "*secrets*",
    "*credential*",
    "id_rsa",
    "id_dsa",
];

/// Relative POSIX paths selected for a scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Discovery {
    pub files: Vec<String>,
    /// Matching files dropped by the scan cap.
    pub truncated: usize,
}

struct ExcludeRule {
    pattern: String,
    directory_only: bool,
}

fn parse_rule(raw: &str) -> Option<ExcludeRule> {
    let stripped = raw.trim();
    if stripped.is_empty() || stripped.starts_with('#') {
        return None;
    }
    let directory_only = stripped.ends_with('/');
    let mut pattern = stripped.trim_end_matches('/').to_string();
    if let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest.to_string();
    }
    Some(ExcludeRule {
        pattern,
        directory_only,
    })
}

pub fn exclude_sensitive() -> bool {
    match std::env::var("CODESIGHT_EXCLUDE_SENSITIVE") {
        Ok(val) => {
            let v = val.trim().to_lowercase();
            !matches!(v.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GlobToken {
    Literal(char),
    AnyChar,
    Star,
    DoubleStar,
    /// `**/`, zero or more whole directories.
    AnyDirs,
}

fn tokenize_glob(pattern: &str) -> Vec<GlobToken> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    tokens.push(GlobToken::AnyDirs);
                    i += 3;
                } else {
                    tokens.push(GlobToken::DoubleStar);
                    i += 2;
                }
            }
            '*' => {
                tokens.push(GlobToken::Star);
                i += 1;
            }
            '?' => {
                tokens.push(GlobToken::AnyChar);
                i += 1;
            }
            c => {
                tokens.push(GlobToken::Literal(c));
                i += 1;
            }
        }
    }
    tokens
}

/// Glob match where `*` and `?` stop at `/`, `**` crosses directories and
/// `**/` also matches nothing.
pub fn glob_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p = tokenize_glob(pattern);
    let (tl, pl) = (t.len(), p.len());
    // dp[i][j]: t[i..] matches p[j..]
    let mut dp = vec![vec![false; pl + 1]; tl + 1];
    dp[tl][pl] = true;
    for j in (0..pl).rev() {
        for i in (0..=tl).rev() {
            dp[i][j] = match p[j] {
                GlobToken::Literal(c) => i < tl && t[i] == c && dp[i + 1][j + 1],
                GlobToken::AnyChar => i < tl && t[i] != '/' && dp[i + 1][j + 1],
                GlobToken::Star => dp[i][j + 1] || (i < tl && t[i] != '/' && dp[i + 1][j]),
                GlobToken::DoubleStar => dp[i][j + 1] || (i < tl && dp[i + 1][j]),
                GlobToken::AnyDirs => {
                    dp[i][j + 1] || (i + 1..=tl).any(|k| t[k - 1] == '/' && dp[k][j + 1])
                }
            };
        }
    }
    dp[0][0]
}

/// Patterns without a `/` also match the bare file name.
fn matches_pattern(rel_path: &str, pattern: &str) -> bool {
    if glob_match(rel_path, pattern) {
        return true;
    }
    if pattern.contains('/') {
        return false;
    }
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    glob_match(name, pattern)
}

fn is_excluded(rel_path: &str, is_dir: bool, rules: &[ExcludeRule]) -> bool {
    for rule in rules {
        if rule.directory_only && !is_dir {
            continue;
        }
        if matches_pattern(rel_path, &rule.pattern) {
            return true;
        }
        if is_dir && matches_pattern(&format!("{rel_path}/"), &rule.pattern) {
            return true;
        }
        if rel_path.starts_with(&format!("{}/", rule.pattern)) {
            return true;
        }
    }
    false
}

fn relative_posix(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Walk `root` and return the sorted relative paths matching `include` and
/// not matching `exclude`, capped at `max_files`.
pub fn discover_files(
    root: &Path,
    include: &[String],
    exclude: &[String],
    max_files: usize,
) -> CodesightResult<Discovery> {
    if !root.is_dir() {
        return Err(CodesightError::config(format!(
            "path is not a directory: {}",
            root.display()
        )));
    }

    let mut rules: Vec<ExcludeRule> = exclude.iter().filter_map(|p| parse_rule(p)).collect();
    if exclude_sensitive() {
        rules.extend(DEFAULT_SENSITIVE_EXCLUDE_PATTERNS.iter().filter_map(|p| parse_rule(p)));
    }
    let include: Vec<&String> = include.iter().filter(|p| !p.trim().is_empty()).collect();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let rel = relative_posix(root, entry.path());
            !is_excluded(&rel, true, &rules)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative_posix(root, entry.path());
        if is_excluded(&rel, false, &rules) {
            continue;
        }
        if !include.is_empty() && !include.iter().any(|p| matches_pattern(&rel, p)) {
            continue;
        }
        files.push(rel);
    }
    files.sort();

    let truncated = files.len().saturating_sub(max_files);
    files.truncate(max_files);
    debug!(
        root = %root.display(),
        files = files.len(),
        truncated,
        "discovery finished"
    );
    Ok(Discovery { files, truncated })
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Stable positive numeric id for a relative path.
pub fn file_id(path: &str) -> i64 {
    (crc32fast::hash(path.as_bytes()) & 0x7FFF_FFFF) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_glob_match_single_star_stays_in_segment() {
        assert!(glob_match("a.py", "*.py"));
        assert!(!glob_match("pkg/a.py", "*.py"));
        assert!(glob_match("pkg/a.py", "pkg/?.py"));
    }

    #[test]
    fn test_glob_match_double_star() {
        assert!(glob_match("a.py", "**/*.py"));
        assert!(glob_match("pkg/sub/a.py", "**/*.py"));
        assert!(glob_match("venv/lib/x.py", "**/venv/**"));
        assert!(glob_match("src/venv/x.py", "**/venv/**"));
        assert!(!glob_match("src/venvs/x.py", "**/venv/**"));
        assert!(glob_match("pkg/deep/mod.py", "pkg/**"));
    }

    #[test]
    fn test_discover_applies_default_excludes_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "b.py", "x = 1\n");
        write(root, "a.py", "x = 1\n");
        write(root, "pkg/c.py", "x = 1\n");
        write(root, "venv/lib/site.py", "x = 1\n");
        write(root, "pkg/__pycache__/c.py", "x = 1\n");
        write(root, "README.md", "# hi\n");

        let discovery = discover_files(
            root,
            &crate::config::default_include_patterns(),
            &crate::config::default_exclude_patterns(),
            100,
        )
        .unwrap();
        assert_eq!(discovery.files, vec!["a.py", "b.py", "pkg/c.py"]);
        assert_eq!(discovery.truncated, 0);
    }

    #[test]
    fn test_discover_skips_sensitive_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app.py", "x = 1\n");
        write(root, "my_secrets.py", "TOKEN = 'x'\n");
        let discovery = discover_files(root, &["**/*.py".to_string()], &[], 100).unwrap();
        assert_eq!(discovery.files, vec!["app.py"]);
    }

    #[test]
    fn test_discover_caps_file_count() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["a.py", "b.py", "c.py", "d.py"] {
            write(root, name, "pass\n");
        }
        let discovery = discover_files(root, &["**/*.py".to_string()], &[], 3).unwrap();
        assert_eq!(discovery.files.len(), 3);
        assert_eq!(discovery.truncated, 1);
    }

    #[test]
    fn test_discover_rejects_missing_root() {
        let err = discover_files(Path::new("/no/such/root"), &[], &[], 10).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_file_id_is_stable_and_positive() {
        assert_eq!(file_id("pkg/a.py"), file_id("pkg/a.py"));
        assert!(file_id("pkg/a.py") >= 0);
        assert_eq!(content_hash(b"abc").len(), 64);
    }
}
