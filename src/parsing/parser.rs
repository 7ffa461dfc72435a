//! The source-parser seam.
//!
//! The rest of the engine consumes only [`ParsedFile`]; everything
//! tree-sitter-specific stays behind [`SourceParser`].

use tree_sitter::Node;

use crate::parsing::Language;
use crate::types::{Element, Import, Range};

/// Elements and imports extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub elements: Vec<Element>,
    pub imports: Vec<Import>,
}

/// Common interface for all language parsers.
///
/// Parsing is best-effort: a file tree-sitter cannot parse yields an empty
/// [`ParsedFile`] rather than an error, and parsers skip malformed subtrees
/// instead of failing the file.
pub trait SourceParser: Send {
    /// Language this parser handles.
    fn language(&self) -> Language;

    /// Extract elements and imports from source code.
    fn parse(&mut self, code: &str) -> ParsedFile;
}

/// Maximum recursion depth for AST traversal, guarding against pathological
/// nesting blowing the stack.
pub const MAX_AST_DEPTH: usize = 500;

pub(crate) fn depth_exceeded(depth: usize, node: Node) -> bool {
    if depth > MAX_AST_DEPTH {
        tracing::warn!(
            line = node.start_position().row + 1,
            "maximum AST depth exceeded, skipping subtree"
        );
        return true;
    }
    false
}

/// Source range of a tree-sitter node.
pub(crate) fn node_range(node: Node) -> Range {
    let start = node.start_position();
    let end = node.end_position();
    Range::new(
        start.row as u32,
        start.column as u32,
        end.row as u32,
        end.column as u32,
    )
}

/// Text a node spans.
pub(crate) fn node_text<'a>(node: Node, code: &'a str) -> &'a str {
    &code[node.byte_range()]
}

/// Strip one layer of matching string quotes.
pub(crate) fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// Last segment of a separator-delimited path-like string.
pub(crate) fn last_segment<'a>(path: &'a str, separator: &str) -> &'a str {
    path.rsplit(separator).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"fmt\""), "fmt");
        assert_eq!(strip_quotes("'./util'"), "./util");
        assert_eq!(strip_quotes("`raw`"), "raw");
        assert_eq!(strip_quotes("bare"), "bare");
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("github.com/org/repo/pkg", "/"), "pkg");
        assert_eq!(last_segment("crate::storage::kv", "::"), "kv");
        assert_eq!(last_segment("fmt", "/"), "fmt");
    }
}
