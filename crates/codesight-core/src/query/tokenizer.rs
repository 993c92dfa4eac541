//! Token estimation and task keyword extraction.

use std::sync::LazyLock;

use regex::Regex;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9_]*").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "could", "do", "does",
    "for", "from", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its", "me", "my",
    "need", "of", "on", "or", "our", "please", "should", "so", "some", "that", "the", "their",
    "them", "then", "there", "this", "to", "up", "us", "was", "we", "what", "when", "where",
    "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

/// Size of `text` in estimated tokens.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() as f64 / 3.5).max(1.0) as usize
}

/// Lower-cased keywords of a task description, stop-words and words shorter
/// than three characters removed, in first-seen order without duplicates.
pub fn task_keywords(task: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for m in WORD_RE.find_iter(task) {
        let word = m.as_str().to_lowercase();
        if word.len() < 3 || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }
    keywords
}

/// Lower-cased path segments with extensions removed and `_`/`-` split out,
/// e.g. `src/user_auth.py` → `src`, `user_auth`, `user`, `auth`.
pub fn path_segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for part in path.split('/') {
        let stem = part.rsplit_once('.').map(|(s, _)| s).unwrap_or(part);
        if stem.is_empty() {
            continue;
        }
        let lower = stem.to_lowercase();
        for piece in lower.split(['_', '-']) {
            if !piece.is_empty() && piece != lower && !segments.iter().any(|s| s == piece) {
                segments.push(piece.to_string());
            }
        }
        if !segments.contains(&lower) {
            segments.push(lower);
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(35)), 10);
    }

    #[test]
    fn test_task_keywords_drop_stop_words() {
        let keywords = task_keywords("Fix the login bug in the User auth flow, fix it");
        assert_eq!(keywords, vec!["fix", "login", "bug", "user", "auth", "flow"]);
    }

    #[test]
    fn test_path_segments() {
        let segments = path_segments("src/user_auth.py");
        assert!(segments.contains(&"src".to_string()));
        assert!(segments.contains(&"user_auth".to_string()));
        assert!(segments.contains(&"user".to_string()));
        assert!(segments.contains(&"auth".to_string()));
        assert!(!segments.contains(&"py".to_string()));
    }
}
