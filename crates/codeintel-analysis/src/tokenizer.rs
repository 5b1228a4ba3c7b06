//! Lexeme splitting shared by the symbol search builder and the fingerprint
//! service.
//!
//! Stop-list and regexes are built once as `once_cell::sync::Lazy` statics,
//! never reconstructed per call.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Segment splitter: any run of non-alphanumeric characters.
static SEGMENT_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

/// Identifier lexeme recognised by `ExtractIdentifierTokens`.
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// A fixed multi-language keyword stop-list for `ExtractIdentifierTokens`.
static KEYWORD_STOPLIST: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "abstract", "as", "async", "await", "bool", "break", "case", "catch", "char", "class",
        "const", "continue", "def", "default", "do", "double", "else", "enum", "export", "extends",
        "false", "final", "finally", "float", "for", "from", "func", "function", "if", "impl",
        "implements", "import", "in", "int", "interface", "is", "let", "long", "match", "mod",
        "module", "mut", "namespace", "new", "null", "override", "package", "private", "protected",
        "pub", "public", "readonly", "return", "self", "short", "static", "str", "string", "struct",
        "super", "switch", "this", "throw", "throws", "trait", "true", "try", "type", "typeof",
        "undefined", "union", "unsafe", "use", "using", "var", "virtual", "void", "volatile",
        "where", "while", "yield",
    ]
    .into_iter()
    .collect()
});

/// Splits `text` on non-alphanumeric runs, decomposes each segment into
/// acronym/capitalised/digit sub-tokens, lowercases, drops tokens shorter
/// than 2 characters, and removes duplicates (first-seen order kept).
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for segment in SEGMENT_SPLIT.split(text) {
        for token in split_segment(segment) {
            let lower = token.to_lowercase();
            if lower.chars().count() < 2 {
                continue;
            }
            if seen.insert(lower.clone()) {
                out.push(lower);
            }
        }
    }

    out
}

/// Splits a non-alphanumeric-free segment into acronym/capitalised/digit
/// sub-tokens. The `regex` crate has no lookaround, so
/// acronym-vs-capitalised-word boundaries (`HTTPStatus` -> `HTTP`, `Status`)
/// are resolved with an explicit one-character lookahead on the char slice.
fn split_segment(segment: &str) -> Vec<String> {
    let chars: Vec<char> = segment.chars().collect();
    let n = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < n {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < n && chars[i].is_ascii_digit() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else if chars[i].is_ascii_uppercase() {
            let start = i;
            i += 1;
            while i < n && chars[i].is_ascii_uppercase() {
                if i + 1 < n && chars[i + 1].is_ascii_lowercase() {
                    break;
                }
                i += 1;
            }
            while i < n && chars[i].is_ascii_lowercase() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else if chars[i].is_ascii_lowercase() {
            let start = i;
            while i < n && chars[i].is_ascii_lowercase() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else {
            // Non-ASCII alnum (accented letters, etc.): consume one char to
            // guarantee progress rather than recognising a run.
            tokens.push(chars[i].to_string());
            i += 1;
        }
    }

    tokens
}

/// Scans up to `max_chars` characters of `source_text` for identifier
/// lexemes, rejecting keywords, numeric-only lexemes, and anything shorter
/// than 3 characters, returning up to `max_tokens` distinct tokens in
/// first-seen order.
#[must_use]
pub fn extract_identifier_tokens(source_text: &str, max_chars: usize, max_tokens: usize) -> Vec<String> {
    let bounded: String = source_text.chars().take(max_chars).collect();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for m in IDENTIFIER.find_iter(&bounded) {
        if out.len() >= max_tokens {
            break;
        }
        let lexeme = m.as_str();
        if lexeme.len() < 3 {
            continue;
        }
        if lexeme.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if KEYWORD_STOPLIST.contains(lexeme.to_lowercase().as_str()) {
            continue;
        }
        let normalised = tokenize(lexeme);
        if normalised.is_empty() {
            continue;
        }
        for token in normalised {
            if out.len() >= max_tokens {
                break;
            }
            if seen.insert(token.clone()) {
                out.push(token);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_camel_and_acronym_runs() {
        let tokens = tokenize("HTTPStatusCode_2");
        assert_eq!(tokens, vec!["http", "status", "code"]);
    }

    #[test]
    fn tokenize_drops_short_tokens_and_dedups() {
        let tokens = tokenize("a.UserUser");
        assert_eq!(tokens, vec!["user"]);
    }

    #[test]
    fn tokenize_is_deterministic() {
        assert_eq!(tokenize("GetUserById"), tokenize("GetUserById"));
    }

    #[test]
    fn extract_identifier_tokens_rejects_keywords_and_numbers() {
        let src = "public class UserService { private int count123; return 42; }";
        let tokens = extract_identifier_tokens(src, 4000, 256);
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"service".to_string()));
        assert!(!tokens.contains(&"class".to_string()));
        assert!(!tokens.contains(&"return".to_string()));
        assert!(!tokens.contains(&"42".to_string()));
    }

    #[test]
    fn extract_identifier_tokens_respects_caps() {
        let src = "alpha beta gamma delta epsilon zeta eta theta";
        let tokens = extract_identifier_tokens(src, 4000, 3);
        assert_eq!(tokens.len(), 3);
    }
}
