//! Python parsing wrapper used by extraction passes.
//!
//! Every failure mode is returned as a reason string so callers can record
//! it as a per-file outcome instead of aborting the batch.

use tree_sitter::{Node, Parser, Tree};

/// Parsed source unit holding the decoded text and its syntax tree.
pub struct ParsedUnit {
    pub source: String,
    pub tree: Tree,
}

/// Decode raw bytes as UTF-8, tolerating a leading byte-order mark.
pub fn decode_source(bytes: Vec<u8>) -> Result<String, String> {
    let bytes = match bytes.strip_prefix(b"\xEF\xBB\xBF") {
        Some(rest) => rest.to_vec(),
        None => bytes,
    };
    String::from_utf8(bytes)
        .map_err(|e| format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to()))
}

fn first_error_line(node: Node<'_>) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(child) {
            return Some(line);
        }
    }
    Some(node.start_position().row + 1)
}

pub fn parse_python(source: String) -> Result<ParsedUnit, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| format!("failed to load python grammar: {e}"))?;
    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| "parser produced no tree".to_string())?;
    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        return Err(format!("syntax error at line {line}"));
    }
    Ok(ParsedUnit { source, tree })
}

/// Text of a node, empty when the byte range is not valid UTF-8.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based first line of a node.
pub fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based last line of a node, never before its first line.
pub fn end_line(node: Node<'_>) -> u32 {
    let end = node.end_position();
    let mut row = end.row;
    // A node ending at column 0 stops at the previous line's newline.
    if end.column == 0 && row > node.start_position().row {
        row -= 1;
    }
    (row as u32 + 1).max(start_line(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_source() {
        let unit = parse_python("def f(x):\n    return x\n".to_string()).unwrap();
        assert_eq!(unit.tree.root_node().kind(), "module");
    }

    #[test]
    fn test_parse_reports_syntax_error_line() {
        let err = parse_python("x = 1\ndef broken(:\n    pass\n".to_string())
            .err()
            .unwrap();
        assert!(err.starts_with("syntax error at line"), "{err}");
    }

    #[test]
    fn test_parse_empty_source() {
        assert!(parse_python(String::new()).is_ok());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = decode_source(vec![b'x', 0xFF, b'y']).unwrap_err();
        assert_eq!(err, "invalid UTF-8 at byte 1");
        assert_eq!(decode_source(b"\xEF\xBB\xBFx = 1".to_vec()).unwrap(), "x = 1");
    }

    #[test]
    fn test_end_line_not_before_start() {
        let unit = parse_python("class A:\n    pass\n".to_string()).unwrap();
        let class = unit.tree.root_node().child(0).unwrap();
        assert_eq!(start_line(class), 1);
        assert_eq!(end_line(class), 2);
    }
}
