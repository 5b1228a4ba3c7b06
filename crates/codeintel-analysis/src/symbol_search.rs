//! Symbol search builder: one weighted-bucket search entry per symbol,
//! ready for the storage layer's `setweight` tsvector construction.

use crate::parsed_file::{ParsedFile, ParsedSymbol};
use crate::tokenizer::tokenize;

/// Snippet cap in bytes: truncated to a small cap to keep search rows dense.
const SNIPPET_MAX_BYTES: usize = 2048;

/// One symbol's search entry: four weighted token buckets plus a bounded
/// source snippet. The storage layer combines the buckets into a single
/// tsvector with `setweight(A, name_and_qualified)`, `setweight(B,
/// signature)`, `setweight(C, documentation)`, `setweight(D, literal)`.
#[derive(Debug, Clone)]
pub struct SymbolSearchEntry {
    pub symbol_local_id: usize,
    pub name_tokens: Vec<String>,
    pub qualified_tokens: Vec<String>,
    pub signature_tokens: Vec<String>,
    pub documentation_tokens: Vec<String>,
    pub literal_tokens: Vec<String>,
    pub snippet: String,
}

/// Builds one `SymbolSearchEntry` per symbol in a parsed file.
#[must_use]
pub fn build_entries(parsed: &ParsedFile) -> Vec<SymbolSearchEntry> {
    parsed
        .symbols
        .iter()
        .map(|symbol| build_entry(symbol, &parsed.source))
        .collect()
}

fn build_entry(symbol: &ParsedSymbol, source: &str) -> SymbolSearchEntry {
    SymbolSearchEntry {
        symbol_local_id: symbol.local_id,
        name_tokens: tokenize(&symbol.name),
        qualified_tokens: tokenize(&symbol.qualified_name),
        signature_tokens: symbol.signature.as_deref().map(tokenize).unwrap_or_default(),
        documentation_tokens: symbol.documentation.as_deref().map(tokenize).unwrap_or_default(),
        literal_tokens: symbol.literal_tokens.clone(),
        snippet: snippet_for(symbol, source),
    }
}

fn snippet_for(symbol: &ParsedSymbol, source: &str) -> String {
    let full = symbol.span.slice(source).unwrap_or_default();
    truncate_bytes(full, SNIPPET_MAX_BYTES)
}

fn truncate_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsed_file::{Span, SymbolKind};

    fn sample_symbol() -> ParsedSymbol {
        ParsedSymbol {
            local_id: 0,
            parent_local_id: None,
            name: "GetUserById".to_string(),
            qualified_name: "App.Services.UserService.GetUserById".to_string(),
            kind: SymbolKind::Method,
            span: Span {
                start_line: 1,
                start_col: 0,
                end_line: 3,
                end_col: 1,
            },
            signature: Some("fn get_user_by_id(id: u64) -> Option<User>".to_string()),
            documentation: Some("Looks up a user by id.".to_string()),
            modifiers: vec!["pub".to_string()],
            literal_tokens: vec!["not_found".to_string()],
        }
    }

    #[test]
    fn builds_weighted_token_buckets() {
        let source = "fn get_user_by_id(id: u64) -> Option<User> {\n    todo!()\n}\n";
        let entry = build_entry(&sample_symbol(), source);
        assert!(entry.name_tokens.contains(&"user".to_string()));
        assert!(entry.qualified_tokens.contains(&"services".to_string()));
        assert!(entry.signature_tokens.contains(&"option".to_string()));
        assert!(entry.documentation_tokens.contains(&"looks".to_string()));
        assert_eq!(entry.literal_tokens, vec!["not_found".to_string()]);
    }

    #[test]
    fn snippet_is_truncated_to_cap() {
        let long_line = "x".repeat(SNIPPET_MAX_BYTES * 2);
        let mut symbol = sample_symbol();
        symbol.span = Span {
            start_line: 1,
            start_col: 0,
            end_line: 1,
            end_col: 0,
        };
        let entry = build_entry(&symbol, &long_line);
        assert!(entry.snippet.len() <= SNIPPET_MAX_BYTES);
    }
}
