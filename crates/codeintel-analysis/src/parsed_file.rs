//! The boundary types this crate consumes from an external parser.
//!
//! Analysis never parses source itself; it consumes a `ParseFile`
//! capability that returns a `ParsedFile`, and only tokenizes,
//! fingerprints, chunks, and builds search entries from one. Symbols and
//! edges are addressed by a file-local index rather than a persisted id, so
//! this crate has no dependency on the storage crate — the indexing crate,
//! which depends on both, maps `local_id` to a stable `Uuid` when it
//! persists a `ParsedFile`.

use async_trait::async_trait;

/// Source-agnostic symbol taxonomy. `Namespace`, `Field`, `Variable`, and
/// `Parameter` exist as symbols but are never chunk-eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Namespace,
    Class,
    Interface,
    Struct,
    Enum,
    Method,
    Function,
    Constructor,
    Property,
    Field,
    Variable,
    Parameter,
}

impl SymbolKind {
    /// Chunk-eligible kinds: the kinds whose source text is worth slicing
    /// into an embeddable chunk.
    #[must_use]
    pub const fn is_chunk_eligible(self) -> bool {
        matches!(
            self,
            Self::Class
                | Self::Interface
                | Self::Struct
                | Self::Enum
                | Self::Method
                | Self::Function
                | Self::Constructor
                | Self::Property
        )
    }
}

/// Edge kind between two symbols, or a symbol and an unresolved name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Import,
    Inherits,
    Implements,
    Calls,
    References,
    Defines,
    Contains,
    Overrides,
    TypeOf,
    Returns,
}

/// A symbol's 1-based line span within its file's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: i32,
    pub start_col: i32,
    pub end_line: i32,
    pub end_col: i32,
}

impl Span {
    /// Slices `source` to this span's lines (1-based, inclusive), joined by
    /// `\n`. Returns `None` if the span falls outside the source's line
    /// count.
    #[must_use]
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        self.slice_lines(source, self.start_line, self.end_line)
    }

    /// Slices `source` to an arbitrary `start..=end` (1-based, inclusive)
    /// line range, independent of this span's own bounds.
    #[must_use]
    pub fn slice_lines<'a>(&self, source: &'a str, start_line: i32, end_line: i32) -> Option<&'a str> {
        if start_line < 1 || end_line < start_line {
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let (start_idx, end_idx) = (start_line as usize - 1, end_line as usize - 1);

        let mut line_starts = Vec::new();
        line_starts.push(0usize);
        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
        }
        if start_idx >= line_starts.len() {
            return None;
        }
        let from = line_starts[start_idx];
        let to = if end_idx + 1 < line_starts.len() {
            line_starts[end_idx + 1].saturating_sub(1)
        } else {
            source.len()
        };
        source.get(from..to.max(from))
    }
}

/// A symbol within a `ParsedFile`, addressed by a file-local index rather
/// than a stable id.
#[derive(Debug, Clone)]
pub struct ParsedSymbol {
    pub local_id: usize,
    pub parent_local_id: Option<usize>,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub span: Span,
    pub signature: Option<String>,
    pub documentation: Option<String>,
    pub modifiers: Vec<String>,
    /// Identifier-grade tokens lifted from string literals inside the body.
    pub literal_tokens: Vec<String>,
}

/// A directed edge from a source symbol to either another symbol in the
/// same file or an unresolved name.
#[derive(Debug, Clone)]
pub struct ParsedEdge {
    pub source_local_id: usize,
    pub target_local_id: Option<usize>,
    pub target_name: Option<String>,
    pub kind: EdgeKind,
}

/// A single parsed source file: its symbols, its intra-file edges, and the
/// raw text the spans index into.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_path: String,
    pub language: String,
    pub source: String,
    pub symbols: Vec<ParsedSymbol>,
    pub edges: Vec<ParsedEdge>,
}

impl ParsedFile {
    /// Total number of lines in `source`, used by the chunker to clamp
    /// `chunkEndLine`.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.source.lines().count().max(1)
    }
}

/// External collaborator that turns raw source text into a `ParsedFile`.
/// Analysis depends only on this trait, never on a concrete parser.
#[async_trait]
pub trait ParseFile: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn parse_file(
        &self,
        file_path: &str,
        language: &str,
        source: &str,
    ) -> Result<ParsedFile, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_extracts_inclusive_line_range() {
        let source = "line1\nline2\nline3\nline4\n";
        let span = Span {
            start_line: 2,
            start_col: 0,
            end_line: 3,
            end_col: 0,
        };
        assert_eq!(span.slice(source), Some("line2\nline3"));
    }

    #[test]
    fn slice_handles_last_line_without_trailing_newline() {
        let source = "line1\nline2";
        let span = Span {
            start_line: 1,
            start_col: 0,
            end_line: 2,
            end_col: 0,
        };
        assert_eq!(span.slice(source), Some("line1\nline2"));
    }

    #[test]
    fn slice_out_of_range_returns_none() {
        let source = "line1\nline2";
        let span = Span {
            start_line: 5,
            start_col: 0,
            end_line: 6,
            end_col: 0,
        };
        assert_eq!(span.slice(source), None);
    }
}
