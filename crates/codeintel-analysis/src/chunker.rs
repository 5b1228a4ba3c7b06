//! Chunker: slices chunk-eligible symbols out of a parsed file's source
//! text into the code chunks the indexer persists and the embedding
//! pipeline embeds.

use sha2::{Digest, Sha256};

use crate::parsed_file::{ParsedFile, ParsedSymbol};

/// Context-line and size knobs for chunk materialisation.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub context_lines_before: i32,
    pub context_lines_after: i32,
    pub max_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            context_lines_before: 2,
            context_lines_after: 2,
            max_chunk_chars: 8000,
        }
    }
}

/// A materialised chunk, tied back to the symbol it was built from by
/// local id.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub symbol_local_id: usize,
    pub start_line: i32,
    pub end_line: i32,
    pub content: String,
    pub token_count: usize,
}

/// Result of chunking one file: either its chunks, or a failure the
/// pipeline logs and skips (no partial chunks are ever emitted).
#[derive(Debug, Clone)]
pub struct ChunkedFile {
    pub success: bool,
    pub chunks: Vec<Chunk>,
    pub error: Option<String>,
}

/// Chunks every chunk-eligible symbol in `parsed`.
#[must_use]
pub fn chunk_file(parsed: &ParsedFile, config: &ChunkerConfig) -> ChunkedFile {
    if parsed.source.is_empty() && !parsed.symbols.is_empty() {
        return ChunkedFile {
            success: false,
            chunks: Vec::new(),
            error: Some("source missing".to_string()),
        };
    }

    let line_count = i32::try_from(parsed.line_count()).unwrap_or(i32::MAX);
    let mut seen = std::collections::HashSet::new();
    let mut chunks = Vec::new();

    for symbol in &parsed.symbols {
        if !symbol.kind.is_chunk_eligible() {
            continue;
        }
        if let Some(chunk) = chunk_one(symbol, parsed, line_count, config) {
            let digest = sha256_hex(&chunk.content);
            let key = (parsed.file_path.clone(), chunk.start_line, chunk.end_line, digest);
            if seen.insert(key) {
                chunks.push(chunk);
            }
        }
    }

    ChunkedFile {
        success: true,
        chunks,
        error: None,
    }
}

fn chunk_one(
    symbol: &ParsedSymbol,
    parsed: &ParsedFile,
    line_count: i32,
    config: &ChunkerConfig,
) -> Option<Chunk> {
    let with_context = clamp_span(
        symbol.span.start_line - config.context_lines_before,
        symbol.span.end_line + config.context_lines_after,
        line_count,
    );

    let (mut start_line, mut end_line) = with_context;
    let mut content = symbol
        .span
        .slice_lines(&parsed.source, start_line, end_line)
        .unwrap_or_default()
        .to_string();

    if content.len() > config.max_chunk_chars {
        let (no_context_start, no_context_end) =
            clamp_span(symbol.span.start_line, symbol.span.end_line, line_count);
        let retried = symbol
            .span
            .slice_lines(&parsed.source, no_context_start, no_context_end)
            .unwrap_or_default()
            .to_string();

        if retried.len() <= config.max_chunk_chars {
            start_line = no_context_start;
            end_line = no_context_end;
            content = retried;
        } else {
            start_line = no_context_start;
            end_line = no_context_end;
            content = truncate_chars(&retried, config.max_chunk_chars);
        }
    }

    if content.is_empty() {
        return None;
    }

    let token_count = content.len() / 4;

    Some(Chunk {
        symbol_local_id: symbol.local_id,
        start_line,
        end_line,
        content,
        token_count,
    })
}

fn clamp_span(start_line: i32, end_line: i32, line_count: i32) -> (i32, i32) {
    (start_line.max(1), end_line.min(line_count))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn sha256_hex(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsed_file::{Span, SymbolKind};

    fn file_with(symbols: Vec<ParsedSymbol>, source: &str) -> ParsedFile {
        ParsedFile {
            file_path: "src/lib.rs".to_string(),
            language: "rust".to_string(),
            source: source.to_string(),
            symbols,
            edges: Vec::new(),
        }
    }

    fn method(local_id: usize, start_line: i32, end_line: i32) -> ParsedSymbol {
        ParsedSymbol {
            local_id,
            parent_local_id: None,
            name: format!("fn{local_id}"),
            qualified_name: format!("mod::fn{local_id}"),
            kind: SymbolKind::Function,
            span: Span {
                start_line,
                start_col: 0,
                end_line,
                end_col: 0,
            },
            signature: None,
            documentation: None,
            modifiers: Vec::new(),
            literal_tokens: Vec::new(),
        }
    }

    #[test]
    fn skips_non_chunk_eligible_kinds() {
        let mut symbol = method(0, 2, 2);
        symbol.kind = SymbolKind::Variable;
        let file = file_with(vec![symbol], "a\nb\nc\n");
        let result = chunk_file(&file, &ChunkerConfig::default());
        assert!(result.success);
        assert!(result.chunks.is_empty());
    }

    #[test]
    fn adds_context_lines_and_clamps_to_file_bounds() {
        let file = file_with(vec![method(0, 1, 1)], "a\nb\nc\n");
        let config = ChunkerConfig {
            context_lines_before: 5,
            context_lines_after: 5,
            max_chunk_chars: 8000,
        };
        let result = chunk_file(&file, &config);
        assert!(result.success);
        let chunk = &result.chunks[0];
        assert_eq!(chunk.start_line, 1);
        assert_eq!(chunk.end_line, 3);
    }

    #[test]
    fn dedups_identical_spans_and_content() {
        let file = file_with(vec![method(0, 1, 2), method(1, 1, 2)], "a\nb\n");
        let result = chunk_file(&file, &ChunkerConfig::default());
        assert_eq!(result.chunks.len(), 1);
    }

    #[test]
    fn falls_back_to_no_context_then_hard_truncate_when_over_budget() {
        let long_body = "x".repeat(100);
        let source = format!("fn body() {{\n{long_body}\n}}\n");
        let file = file_with(vec![method(0, 1, 3)], &source);
        let config = ChunkerConfig {
            context_lines_before: 1,
            context_lines_after: 1,
            max_chunk_chars: 20,
        };
        let result = chunk_file(&file, &config);
        let chunk = &result.chunks[0];
        assert!(chunk.content.len() <= 20);
    }

    #[test]
    fn missing_source_with_symbols_is_a_failure() {
        let file = file_with(vec![method(0, 1, 2)], "");
        let result = chunk_file(&file, &ChunkerConfig::default());
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("source missing"));
        assert!(result.chunks.is_empty());
    }
}
