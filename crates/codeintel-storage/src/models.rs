//! Typed rows for the nine persisted entities: branches, symbols, edges,
//! chunks, search entries, fingerprints, embeddings, and embedding jobs.
//!
//! These are explicit typed structs rather than `dynamic` row objects or a
//! generic `Row` mapper: every column the core reads or writes has a named
//! Rust field, and the SQL <-> Rust boundary is in `repository.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a branch's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "PascalCase")]
pub enum IndexState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Stale,
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Stale => "Stale",
        };
        write!(f, "{s}")
    }
}

/// `(repo, name)` row tracking a branch's indexing progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub repo: String,
    pub name: String,
    pub head_commit: Option<String>,
    pub index_state: IndexState,
    pub indexed_commit_sha: Option<String>,
}

/// Symbol kind, matching a source-agnostic taxonomy.
///
/// `Namespace`, `Field`, `Variable`, and `Parameter` exist as symbols but are
/// never chunk-eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "PascalCase")]
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
    /// Kinds whose source text is worth slicing into an embeddable chunk.
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

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A symbol's line/column span. 1-based; `end_col` may be half-open per the
/// upstream parser's convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: i32,
    pub start_col: i32,
    pub end_line: i32,
    pub end_col: i32,
}

/// A parsed symbol, keyed by `(repo, branch, commit, file_path, name, kind, start)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: Uuid,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub file_path: String,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub language: String,
    pub span: Span,
    pub signature: Option<String>,
    pub documentation: Option<String>,
    pub modifiers: Vec<String>,
    pub parent_symbol_id: Option<Uuid>,
    /// Identifier-grade tokens lifted from string literals inside the body.
    pub literal_tokens: Vec<String>,
}

/// Edge kind between two symbols, or a symbol and an unresolved name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "PascalCase")]
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

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A directed edge from a source symbol to either a resolved target symbol
/// or an unresolved qualified name string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolEdge {
    pub id: Uuid,
    pub source_symbol_id: Uuid,
    pub target_symbol_id: Option<Uuid>,
    pub target_name: Option<String>,
    pub kind: EdgeKind,
}

/// A materialised source slice keyed to a chunk-eligible symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: Uuid,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub file_path: String,
    pub symbol_id: Uuid,
    pub symbol_name: String,
    pub symbol_kind: SymbolKind,
    pub start_line: i32,
    pub end_line: i32,
    pub chunk_start_line: i32,
    pub chunk_end_line: i32,
    pub content: String,
    pub language: String,
    pub token_count: i32,
    pub parent_symbol_name: Option<String>,
    pub signature: Option<String>,
    pub documentation: Option<String>,
    /// sha256 of `content`; part of the file-scoped dedup key.
    pub content_hash: String,
}

/// Per-symbol inverted-index row with five weighted token buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSearchEntry {
    pub symbol_id: Uuid,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub file_path: String,
    /// Bucket A: name ∪ qualified-name tokens.
    pub name_tokens: Vec<String>,
    /// Bucket B: signature tokens.
    pub signature_tokens: Vec<String>,
    /// Bucket C: documentation tokens.
    pub doc_tokens: Vec<String>,
    /// Bucket D: literal tokens.
    pub literal_tokens: Vec<String>,
    pub snippet: String,
}

/// `(symbolId, language, kind, fingerprintKind, fingerprint, band0..band3)` row
/// used for LSH candidate generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFingerprintRow {
    pub symbol_id: Uuid,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub file_path: String,
    pub language: String,
    pub kind: SymbolKind,
    pub fingerprint_kind: String,
    /// The 64-bit SimHash, stored bit-for-bit as signed i64.
    pub fingerprint: i64,
    pub band0: i32,
    pub band1: i32,
    pub band2: i32,
    pub band3: i32,
}

/// A persisted vector embedding for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub id: Uuid,
    pub chunk_id: Uuid,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub dims: i32,
    pub generated_at: DateTime<Utc>,
}

/// Status of a durable embedding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "PascalCase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Blocked,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Blocked => "Blocked",
        };
        write!(f, "{s}")
    }
}

/// A durable embedding job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingJob {
    pub id: Uuid,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub target_kind: String,
    pub target_id: Uuid,
    pub model: String,
    pub dims: Option<i32>,
    pub status: JobStatus,
    pub attempts: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chunk enqueued for embedding generation (input to `enqueue_embedding_jobs`).
#[derive(Debug, Clone)]
pub struct NewEmbeddingJob {
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub target_kind: String,
    pub target_id: Uuid,
    pub model: String,
    pub status: JobStatus,
}

/// Everything produced by the indexing pipeline for a single parsed file,
/// ready to be persisted atomically by `replace_file_symbols`.
#[derive(Debug, Clone, Default)]
pub struct FileIndexBatch {
    pub symbols: Vec<Symbol>,
    pub edges: Vec<SymbolEdge>,
    pub chunks: Vec<CodeChunk>,
    pub search_entries: Vec<SymbolSearchEntry>,
    pub fingerprints: Vec<SymbolFingerprintRow>,
}

/// A sparse-search hit over `symbol_search`.
#[derive(Debug, Clone)]
pub struct SparseHit {
    pub symbol_id: Uuid,
    pub score: f32,
    pub snippet: Option<String>,
    pub matched_tokens: Vec<String>,
}
