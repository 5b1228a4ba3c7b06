//! The storage-layer trait consumed by the indexing pipeline, the embedding
//! job worker, and the query orchestrator.
//!
//! A sprawling per-entity repository interface with a getter/setter per
//! column is test-seam padding nobody needs. This trait exposes only the
//! methods actually used by the core, plus a single batch-upsert per
//! write path: persistence is two batch operations
//! (`replace_file_symbols`, `enqueue_embedding_jobs`); everything else is
//! a narrow read or a single state transition.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageResult;
use crate::models::{
    Branch, CodeChunk, EmbeddingJob, FileIndexBatch, IndexState, JobStatus, NewEmbeddingJob,
    SparseHit, Symbol, SymbolEdge, SymbolFingerprintRow,
};

/// One embedding vector to persist against a chunk.
#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub chunk_id: Uuid,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub vector: Vec<f32>,
    pub model: String,
}

#[async_trait]
pub trait MetadataRepository: Send + Sync {
    // -- Branch lifecycle ---------------------------------------------------

    /// Get or create the `(repo, branch)` row.
    async fn ensure_branch(&self, repo: &str, branch: &str) -> StorageResult<Branch>;

    /// Atomically transition a branch into `InProgress`, rejecting the call
    /// if it is already `InProgress` — the coordination latch that
    /// serialises concurrent reindex attempts.
    ///
    /// Returns `Err(StorageError::IndexInProgress)` if another run is live.
    async fn try_begin_indexing(&self, repo: &str, branch: &str) -> StorageResult<()>;

    /// Transition a branch out of `InProgress` into a terminal state,
    /// recording the indexed commit on success.
    async fn finish_indexing(
        &self,
        repo: &str,
        branch: &str,
        state: IndexState,
        indexed_commit_sha: Option<&str>,
    ) -> StorageResult<()>;

    // -- Indexing pipeline writes ---------------------------------------------

    /// Delete prior symbols/edges/chunks/search/fingerprint rows for
    /// `(repo, branch, file_path)` and insert the new batch in one
    /// transaction.
    async fn replace_file_symbols(
        &self,
        repo: &str,
        branch: &str,
        file_path: &str,
        batch: FileIndexBatch,
    ) -> StorageResult<()>;

    // -- Query orchestrator reads ---------------------------------------------

    async fn get_symbols_by_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<Symbol>>;

    async fn get_symbol(&self, id: Uuid) -> StorageResult<Option<Symbol>>;

    /// Edges whose source is one of `source_ids` (used for the Fast profile's
    /// bounded edge-expansion).
    async fn get_edges_from(&self, source_ids: &[Uuid]) -> StorageResult<Vec<SymbolEdge>>;

    async fn get_fingerprint(&self, symbol_id: Uuid) -> StorageResult<Option<SymbolFingerprintRow>>;

    /// Symbols sharing at least one of the four bands — the disjunctive-OR
    /// LSH contract.
    #[allow(clippy::too_many_arguments)]
    async fn find_fingerprint_candidates(
        &self,
        repo: &str,
        branch: &str,
        language: &str,
        kind: crate::models::SymbolKind,
        fingerprint_kind: &str,
        bands: [u16; 4],
        limit: i64,
    ) -> StorageResult<Vec<SymbolFingerprintRow>>;

    /// Weighted tsvector rank search over `symbol_search`.
    async fn sparse_search(
        &self,
        repo: &str,
        branch: &str,
        query_tokens: &[String],
        limit: i64,
    ) -> StorageResult<Vec<SparseHit>>;

    async fn get_chunk(&self, id: Uuid) -> StorageResult<Option<CodeChunk>>;

    async fn get_chunks_by_symbol_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<CodeChunk>>;

    async fn get_embeddings_by_chunk_ids(
        &self,
        chunk_ids: &[Uuid],
        model: &str,
    ) -> StorageResult<Vec<crate::models::Embedding>>;

    /// Distinct embedding models present for a `(repo, branch)`.
    async fn get_embedding_models(&self, repo: &str, branch: &str) -> StorageResult<Vec<String>>;

    /// Embedding vector dimensionality stored for `(repo, branch, model)`, if any.
    async fn get_embedding_dims(
        &self,
        repo: &str,
        branch: &str,
        model: &str,
    ) -> StorageResult<Option<i32>>;

    async fn has_any_embeddings(&self, repo: &str, branch: &str, model: &str) -> StorageResult<bool>;

    /// Cosine-nearest-neighbour search against `embeddings`, scoped by
    /// `(repo, branch, model)`.
    async fn nearest_embeddings(
        &self,
        repo: &str,
        branch: &str,
        model: &str,
        query_vector: &[f32],
        limit: i64,
    ) -> StorageResult<Vec<(Uuid, f32)>>;

    // -- Embedding job queue --------------------------------------------------

    /// Upsert on the unique key `(repo, branch, targetKind, targetId, model)`.
    async fn enqueue_embedding_jobs(&self, jobs: Vec<NewEmbeddingJob>) -> StorageResult<()>;

    /// Atomic claim-with-lock: select up to `batch_size` eligible `Pending`
    /// rows with `SKIP LOCKED`, mark them `Processing`.
    async fn claim_embedding_jobs(
        &self,
        worker_id: &str,
        batch_size: i64,
    ) -> StorageResult<Vec<EmbeddingJob>>;

    async fn complete_embedding_job(&self, id: Uuid, last_error: Option<&str>) -> StorageResult<()>;

    async fn requeue_embedding_job(
        &self,
        id: Uuid,
        next_attempt_at: chrono::DateTime<chrono::Utc>,
        last_error: &str,
    ) -> StorageResult<()>;

    async fn block_embedding_job(&self, id: Uuid, last_error: &str) -> StorageResult<()>;

    async fn upsert_embeddings(&self, embeddings: Vec<NewEmbedding>) -> StorageResult<()>;

    /// Re-queue `Processing` rows stuck past `stale_minutes`. Returns the
    /// number of rows swept.
    async fn sweep_stale_jobs(&self, stale_minutes: i64) -> StorageResult<u64>;

    /// Delete `Completed` rows older than `purge_days`.
    async fn purge_completed_jobs(&self, purge_days: i64) -> StorageResult<u64>;

    /// For tests/ops: count jobs in a given status.
    async fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<i64>;
}
