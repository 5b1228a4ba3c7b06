//! Analysis crate: tokenizer, fingerprint service, chunker, and symbol
//! search builder.
//!
//! This crate never parses source itself — it consumes the `ParseFile`
//! boundary and turns a `ParsedFile` into the row-shaped values the
//! indexing pipeline persists: chunks, search entries, fingerprints.

pub mod chunker;
pub mod error;
pub mod fingerprint;
pub mod parsed_file;
pub mod symbol_search;
pub mod tokenizer;

pub use chunker::{Chunk, ChunkedFile, ChunkerConfig, chunk_file};
pub use error::{AnalysisError, AnalysisResult};
pub use fingerprint::{
    FINGERPRINT_KIND, Fingerprint, FingerprintEntry, build_entries as build_fingerprint_entries,
};
pub use parsed_file::{EdgeKind, ParseFile, ParsedEdge, ParsedFile, ParsedSymbol, Span, SymbolKind};
pub use symbol_search::{SymbolSearchEntry, build_entries as build_search_entries};
pub use tokenizer::{extract_identifier_tokens, tokenize};
