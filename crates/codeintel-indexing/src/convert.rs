//! Maps a `ParsedFile`'s file-local symbol/edge ids to stable `Uuid`s and
//! assembles the `FileIndexBatch` the storage layer persists in one
//! transaction.

use std::collections::HashMap;

use codeintel_analysis::{
    ChunkerConfig, EdgeKind as AEdgeKind, ParsedFile, Span as ASpan, SymbolKind as ASymbolKind,
    build_fingerprint_entries, build_search_entries, chunk_file,
};
use codeintel_storage::{
    CodeChunk, EdgeKind, FileIndexBatch, Span, Symbol, SymbolEdge, SymbolFingerprintRow, SymbolKind,
    generate_symbol_id, hash_content,
};
use uuid::Uuid;

/// Deterministic chunk id keyed on the full dedup-relevant identity —
/// `(filePath, chunkStartLine, chunkEndLine, contentHash)`, extended with
/// `(repo, branch, commit)` since chunk ids must also be stable for
/// `upsert_embeddings`/job targeting across a reindex of the same commit.
fn generate_chunk_id(
    repo: &str,
    branch: &str,
    commit: &str,
    file_path: &str,
    chunk_start_line: i32,
    chunk_end_line: i32,
    content_hash: &str,
) -> Uuid {
    let data =
        format!("{repo}:{branch}:{commit}:{file_path}:{chunk_start_line}:{chunk_end_line}:{content_hash}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, data.as_bytes())
}

fn convert_kind(kind: ASymbolKind) -> SymbolKind {
    match kind {
        ASymbolKind::Namespace => SymbolKind::Namespace,
        ASymbolKind::Class => SymbolKind::Class,
        ASymbolKind::Interface => SymbolKind::Interface,
        ASymbolKind::Struct => SymbolKind::Struct,
        ASymbolKind::Enum => SymbolKind::Enum,
        ASymbolKind::Method => SymbolKind::Method,
        ASymbolKind::Function => SymbolKind::Function,
        ASymbolKind::Constructor => SymbolKind::Constructor,
        ASymbolKind::Property => SymbolKind::Property,
        ASymbolKind::Field => SymbolKind::Field,
        ASymbolKind::Variable => SymbolKind::Variable,
        ASymbolKind::Parameter => SymbolKind::Parameter,
    }
}

fn convert_edge_kind(kind: AEdgeKind) -> EdgeKind {
    match kind {
        AEdgeKind::Import => EdgeKind::Import,
        AEdgeKind::Inherits => EdgeKind::Inherits,
        AEdgeKind::Implements => EdgeKind::Implements,
        AEdgeKind::Calls => EdgeKind::Calls,
        AEdgeKind::References => EdgeKind::References,
        AEdgeKind::Defines => EdgeKind::Defines,
        AEdgeKind::Contains => EdgeKind::Contains,
        AEdgeKind::Overrides => EdgeKind::Overrides,
        AEdgeKind::TypeOf => EdgeKind::TypeOf,
        AEdgeKind::Returns => EdgeKind::Returns,
    }
}

fn convert_span(span: ASpan) -> Span {
    Span {
        start_line: span.start_line,
        start_col: span.start_col,
        end_line: span.end_line,
        end_col: span.end_col,
    }
}

/// Builds symbol ids deterministically from the symbol's identity key so
/// reindexing the same commit reproduces the same ids.
struct IdMap<'a> {
    repo: &'a str,
    branch: &'a str,
    commit: &'a str,
    file_path: &'a str,
    ids: HashMap<usize, Uuid>,
}

impl<'a> IdMap<'a> {
    fn build(repo: &'a str, branch: &'a str, commit: &'a str, file_path: &'a str, parsed: &ParsedFile) -> Self {
        let mut ids = HashMap::with_capacity(parsed.symbols.len());
        for symbol in &parsed.symbols {
            let id = generate_symbol_id(
                repo,
                branch,
                commit,
                file_path,
                &symbol.name,
                &format!("{:?}", symbol.kind),
                symbol.span.start_line,
            );
            ids.insert(symbol.local_id, id);
        }
        Self {
            repo,
            branch,
            commit,
            file_path,
            ids,
        }
    }

    fn get(&self, local_id: usize) -> Uuid {
        self.ids.get(&local_id).copied().unwrap_or_else(|| {
            generate_symbol_id(
                self.repo,
                self.branch,
                self.commit,
                self.file_path,
                "unknown",
                "Unknown",
                local_id as i32,
            )
        })
    }
}

/// Builds the full persistence batch for one parsed file. `chunk_error` is
/// `Some` when the chunker reported a failure (source missing) — chunks
/// are empty in that case but symbols/edges/search/fingerprints still
/// persist.
pub fn build_batch(
    repo: &str,
    branch: &str,
    commit: &str,
    file_path: &str,
    parsed: &ParsedFile,
    chunker_config: &ChunkerConfig,
) -> (FileIndexBatch, Option<String>) {
    let id_map = IdMap::build(repo, branch, commit, file_path, parsed);

    let symbols = parsed
        .symbols
        .iter()
        .map(|symbol| Symbol {
            id: id_map.get(symbol.local_id),
            repo: repo.to_string(),
            branch: branch.to_string(),
            commit: commit.to_string(),
            file_path: file_path.to_string(),
            name: symbol.name.clone(),
            qualified_name: symbol.qualified_name.clone(),
            kind: convert_kind(symbol.kind),
            language: parsed.language.clone(),
            span: convert_span(symbol.span),
            signature: symbol.signature.clone(),
            documentation: symbol.documentation.clone(),
            modifiers: symbol.modifiers.clone(),
            parent_symbol_id: symbol.parent_local_id.map(|p| id_map.get(p)),
            literal_tokens: symbol.literal_tokens.clone(),
        })
        .collect();

    let edges = parsed
        .edges
        .iter()
        .map(|edge| SymbolEdge {
            id: Uuid::new_v4(),
            source_symbol_id: id_map.get(edge.source_local_id),
            target_symbol_id: edge.target_local_id.map(|t| id_map.get(t)),
            target_name: edge.target_name.clone(),
            kind: convert_edge_kind(edge.kind),
        })
        .collect();

    let chunked = chunk_file(parsed, chunker_config);
    let chunk_error = if chunked.success { None } else { chunked.error };

    let symbols_by_local_id: HashMap<usize, _> =
        parsed.symbols.iter().map(|s| (s.local_id, s)).collect();

    let chunks = chunked
        .chunks
        .iter()
        .filter_map(|chunk| {
            let symbol = symbols_by_local_id.get(&chunk.symbol_local_id)?;
            let parent_name = symbol
                .parent_local_id
                .and_then(|p| symbols_by_local_id.get(&p))
                .map(|parent| parent.name.clone());
            let content_hash = hash_content(&chunk.content);
            let chunk_id = generate_chunk_id(
                repo,
                branch,
                commit,
                file_path,
                chunk.start_line,
                chunk.end_line,
                &content_hash,
            );
            Some(CodeChunk {
                id: chunk_id,
                repo: repo.to_string(),
                branch: branch.to_string(),
                commit: commit.to_string(),
                file_path: file_path.to_string(),
                symbol_id: id_map.get(symbol.local_id),
                symbol_name: symbol.qualified_name.clone(),
                symbol_kind: convert_kind(symbol.kind),
                start_line: symbol.span.start_line,
                end_line: symbol.span.end_line,
                chunk_start_line: chunk.start_line,
                chunk_end_line: chunk.end_line,
                content: chunk.content.clone(),
                language: parsed.language.clone(),
                token_count: chunk.token_count as i32,
                parent_symbol_name: parent_name,
                signature: symbol.signature.clone(),
                documentation: symbol.documentation.clone(),
                content_hash,
            })
        })
        .collect();

    let search_entries = build_search_entries(parsed)
        .into_iter()
        .map(|entry| {
            let mut name_tokens = entry.name_tokens.clone();
            for token in entry.qualified_tokens {
                if !name_tokens.contains(&token) {
                    name_tokens.push(token);
                }
            }
            codeintel_storage::SymbolSearchEntry {
                symbol_id: id_map.get(entry.symbol_local_id),
                repo: repo.to_string(),
                branch: branch.to_string(),
                commit: commit.to_string(),
                file_path: file_path.to_string(),
                name_tokens,
                signature_tokens: entry.signature_tokens,
                doc_tokens: entry.documentation_tokens,
                literal_tokens: entry.literal_tokens,
                snippet: entry.snippet,
            }
        })
        .collect();

    let fingerprints = build_fingerprint_entries(parsed)
        .into_iter()
        .filter_map(|entry| {
            let symbol = symbols_by_local_id.get(&entry.symbol_local_id)?;
            let bands = entry.fingerprint.bands();
            Some(SymbolFingerprintRow {
                symbol_id: id_map.get(entry.symbol_local_id),
                repo: repo.to_string(),
                branch: branch.to_string(),
                commit: commit.to_string(),
                file_path: file_path.to_string(),
                language: parsed.language.clone(),
                kind: convert_kind(symbol.kind),
                fingerprint_kind: codeintel_analysis::FINGERPRINT_KIND.to_string(),
                #[allow(clippy::cast_possible_wrap)]
                fingerprint: entry.fingerprint.hash as i64,
                band0: i32::from(bands[0]),
                band1: i32::from(bands[1]),
                band2: i32::from(bands[2]),
                band3: i32::from(bands[3]),
            })
        })
        .collect();

    (
        FileIndexBatch {
            symbols,
            edges,
            chunks,
            search_entries,
            fingerprints,
        },
        chunk_error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_analysis::{ParsedEdge, ParsedSymbol};

    fn sample_file() -> ParsedFile {
        ParsedFile {
            file_path: "src/lib.rs".to_string(),
            language: "rust".to_string(),
            source: "fn get_user() -> User {\n    todo!()\n}\n".to_string(),
            symbols: vec![ParsedSymbol {
                local_id: 0,
                parent_local_id: None,
                name: "get_user".to_string(),
                qualified_name: "crate::get_user".to_string(),
                kind: ASymbolKind::Function,
                span: ASpan {
                    start_line: 1,
                    start_col: 0,
                    end_line: 3,
                    end_col: 1,
                },
                signature: Some("fn get_user() -> User".to_string()),
                documentation: None,
                modifiers: Vec::new(),
                literal_tokens: Vec::new(),
            }],
            edges: vec![ParsedEdge {
                source_local_id: 0,
                target_local_id: None,
                target_name: Some("User".to_string()),
                kind: AEdgeKind::TypeOf,
            }],
        }
    }

    #[test]
    fn builds_consistent_symbol_ids_across_runs() {
        let parsed = sample_file();
        let (batch_a, _) = build_batch("r", "main", "c1", "src/lib.rs", &parsed, &ChunkerConfig::default());
        let (batch_b, _) = build_batch("r", "main", "c1", "src/lib.rs", &parsed, &ChunkerConfig::default());
        assert_eq!(batch_a.symbols[0].id, batch_b.symbols[0].id);
    }

    #[test]
    fn edge_target_name_preserved_when_unresolved() {
        let parsed = sample_file();
        let (batch, _) = build_batch("r", "main", "c1", "src/lib.rs", &parsed, &ChunkerConfig::default());
        assert_eq!(batch.edges[0].target_symbol_id, None);
        assert_eq!(batch.edges[0].target_name.as_deref(), Some("User"));
    }

    #[test]
    fn chunk_is_built_for_chunk_eligible_symbol() {
        let parsed = sample_file();
        let (batch, chunk_error) =
            build_batch("r", "main", "c1", "src/lib.rs", &parsed, &ChunkerConfig::default());
        assert!(chunk_error.is_none());
        assert_eq!(batch.chunks.len(), 1);
        assert_eq!(batch.chunks[0].symbol_name, "crate::get_user");
    }

    #[test]
    fn missing_source_reports_chunk_error_without_dropping_symbols() {
        let mut parsed = sample_file();
        parsed.source.clear();
        let (batch, chunk_error) =
            build_batch("r", "main", "c1", "src/lib.rs", &parsed, &ChunkerConfig::default());
        assert_eq!(chunk_error.as_deref(), Some("source missing"));
        assert!(batch.chunks.is_empty());
        assert_eq!(batch.symbols.len(), 1);
    }
}
