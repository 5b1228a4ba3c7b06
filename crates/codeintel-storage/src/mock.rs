//! In-memory `MetadataRepository` fake for tests — a narrow in-memory
//! seam, no embedded `PostgreSQL` in the test harness.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::models::{
    Branch, CodeChunk, Embedding, EmbeddingJob, FileIndexBatch, IndexState, JobStatus,
    NewEmbeddingJob, SparseHit, Symbol, SymbolEdge, SymbolFingerprintRow, SymbolKind,
};
use crate::traits::{MetadataRepository, NewEmbedding};

#[derive(Default)]
struct State {
    branches: HashMap<(String, String), Branch>,
    symbols: HashMap<Uuid, Symbol>,
    edges: Vec<SymbolEdge>,
    chunks: HashMap<Uuid, CodeChunk>,
    search_entries: Vec<(Uuid, Vec<String>)>, // (symbol_id, all tokens lowercased)
    search_snippets: HashMap<Uuid, String>,
    fingerprints: HashMap<Uuid, SymbolFingerprintRow>,
    embeddings: HashMap<Uuid, Vec<Embedding>>, // chunk_id -> embeddings (one per model)
    jobs: Vec<EmbeddingJob>,
}

/// An in-memory stand-in for [`PostgresRepository`](crate::repository::PostgresRepository),
/// covering the symbols / `symbol_search` / `symbol_fingerprints` / embeddings
/// surface the core actually reads and writes.
#[derive(Default)]
pub struct MockMetadataRepository {
    state: Mutex<State>,
}

impl MockMetadataRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every job row, for test assertions. Not part of
    /// `MetadataRepository` — the query orchestrator and worker never need
    /// an unfiltered dump.
    #[must_use]
    pub fn jobs_snapshot(&self) -> Vec<EmbeddingJob> {
        self.state.lock().unwrap().jobs.clone()
    }
}

fn hamming_band_hit(a: [i32; 4], b: [u16; 4]) -> bool {
    a.iter().zip(b.iter()).any(|(x, y)| *x == i32::from(*y))
}

#[async_trait]
impl MetadataRepository for MockMetadataRepository {
    async fn ensure_branch(&self, repo: &str, branch: &str) -> StorageResult<Branch> {
        let mut state = self.state.lock().unwrap();
        let key = (repo.to_string(), branch.to_string());
        let entry = state.branches.entry(key).or_insert_with(|| Branch {
            repo: repo.to_string(),
            name: branch.to_string(),
            head_commit: None,
            index_state: IndexState::Pending,
            indexed_commit_sha: None,
        });
        Ok(entry.clone())
    }

    async fn try_begin_indexing(&self, repo: &str, branch: &str) -> StorageResult<()> {
        drop(self.ensure_branch(repo, branch).await?);
        let mut state = self.state.lock().unwrap();
        let key = (repo.to_string(), branch.to_string());
        let entry = state.branches.get_mut(&key).expect("ensured above");
        if entry.index_state == IndexState::InProgress {
            return Err(StorageError::IndexInProgress {
                repo: repo.to_string(),
                branch: branch.to_string(),
            });
        }
        entry.index_state = IndexState::InProgress;
        Ok(())
    }

    async fn finish_indexing(
        &self,
        repo: &str,
        branch: &str,
        state: IndexState,
        indexed_commit_sha: Option<&str>,
    ) -> StorageResult<()> {
        let mut guard = self.state.lock().unwrap();
        let key = (repo.to_string(), branch.to_string());
        if let Some(entry) = guard.branches.get_mut(&key) {
            entry.index_state = state;
            if let Some(sha) = indexed_commit_sha {
                entry.indexed_commit_sha = Some(sha.to_string());
            }
        }
        Ok(())
    }

    async fn replace_file_symbols(
        &self,
        repo: &str,
        branch: &str,
        file_path: &str,
        batch: FileIndexBatch,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();

        let stale_ids: Vec<Uuid> = state
            .symbols
            .values()
            .filter(|s| s.repo == repo && s.branch == branch && s.file_path == file_path)
            .map(|s| s.id)
            .collect();
        for id in &stale_ids {
            state.symbols.remove(id);
            state.chunks.retain(|_, c| c.symbol_id != *id);
            state.fingerprints.remove(id);
        }
        state
            .edges
            .retain(|e| !stale_ids.contains(&e.source_symbol_id));
        state
            .search_entries
            .retain(|(id, _)| !stale_ids.contains(id));

        for symbol in batch.symbols {
            state.symbols.insert(symbol.id, symbol);
        }
        for edge in batch.edges {
            state.edges.push(edge);
        }
        for chunk in batch.chunks {
            state.chunks.insert(chunk.id, chunk);
        }
        for entry in batch.search_entries {
            let mut tokens: Vec<String> = Vec::new();
            tokens.extend(entry.name_tokens.iter().map(|t| t.to_ascii_lowercase()));
            tokens.extend(entry.signature_tokens.iter().map(|t| t.to_ascii_lowercase()));
            tokens.extend(entry.doc_tokens.iter().map(|t| t.to_ascii_lowercase()));
            tokens.extend(entry.literal_tokens.iter().map(|t| t.to_ascii_lowercase()));
            state.search_snippets.insert(entry.symbol_id, entry.snippet);
            state.search_entries.push((entry.symbol_id, tokens));
        }
        for fp in batch.fingerprints {
            state.fingerprints.insert(fp.symbol_id, fp);
        }

        Ok(())
    }

    async fn get_symbols_by_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<Symbol>> {
        let state = self.state.lock().unwrap();
        Ok(ids.iter().filter_map(|id| state.symbols.get(id).cloned()).collect())
    }

    async fn get_symbol(&self, id: Uuid) -> StorageResult<Option<Symbol>> {
        let state = self.state.lock().unwrap();
        Ok(state.symbols.get(&id).cloned())
    }

    async fn get_edges_from(&self, source_ids: &[Uuid]) -> StorageResult<Vec<SymbolEdge>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .edges
            .iter()
            .filter(|e| source_ids.contains(&e.source_symbol_id))
            .cloned()
            .collect())
    }

    async fn get_fingerprint(&self, symbol_id: Uuid) -> StorageResult<Option<SymbolFingerprintRow>> {
        let state = self.state.lock().unwrap();
        Ok(state.fingerprints.get(&symbol_id).cloned())
    }

    async fn find_fingerprint_candidates(
        &self,
        repo: &str,
        branch: &str,
        language: &str,
        kind: SymbolKind,
        fingerprint_kind: &str,
        bands: [u16; 4],
        limit: i64,
    ) -> StorageResult<Vec<SymbolFingerprintRow>> {
        let state = self.state.lock().unwrap();
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .fingerprints
            .values()
            .filter(|fp| {
                fp.repo == repo
                    && fp.branch == branch
                    && fp.language == language
                    && fp.kind == kind
                    && fp.fingerprint_kind == fingerprint_kind
                    && hamming_band_hit([fp.band0, fp.band1, fp.band2, fp.band3], bands)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn sparse_search(
        &self,
        repo: &str,
        branch: &str,
        query_tokens: &[String],
        limit: i64,
    ) -> StorageResult<Vec<SparseHit>> {
        let state = self.state.lock().unwrap();
        let needles: Vec<String> = query_tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        let mut hits: Vec<SparseHit> = state
            .search_entries
            .iter()
            .filter_map(|(symbol_id, tokens)| {
                let symbol = state.symbols.get(symbol_id)?;
                if symbol.repo != repo || symbol.branch != branch {
                    return None;
                }
                let matched: Vec<String> = needles
                    .iter()
                    .filter(|needle| tokens.iter().any(|t| t.contains(needle.as_str())))
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                Some(SparseHit {
                    symbol_id: *symbol_id,
                    score: matched.len() as f32,
                    snippet: state.search_snippets.get(symbol_id).cloned(),
                    matched_tokens: matched,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_chunk(&self, id: Uuid) -> StorageResult<Option<CodeChunk>> {
        let state = self.state.lock().unwrap();
        Ok(state.chunks.get(&id).cloned())
    }

    async fn get_chunks_by_symbol_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<CodeChunk>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .chunks
            .values()
            .filter(|c| ids.contains(&c.symbol_id))
            .cloned()
            .collect())
    }

    async fn get_embeddings_by_chunk_ids(
        &self,
        chunk_ids: &[Uuid],
        model: &str,
    ) -> StorageResult<Vec<Embedding>> {
        let state = self.state.lock().unwrap();
        let model = model.to_ascii_lowercase();
        Ok(chunk_ids
            .iter()
            .filter_map(|id| state.embeddings.get(id))
            .flatten()
            .filter(|e| e.model == model)
            .cloned()
            .collect())
    }

    async fn get_embedding_models(&self, repo: &str, branch: &str) -> StorageResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut models: Vec<String> = state
            .embeddings
            .values()
            .flatten()
            .filter(|e| e.repo == repo && e.branch == branch)
            .map(|e| e.model.clone())
            .collect();
        models.sort();
        models.dedup();
        Ok(models)
    }

    async fn get_embedding_dims(
        &self,
        repo: &str,
        branch: &str,
        model: &str,
    ) -> StorageResult<Option<i32>> {
        let state = self.state.lock().unwrap();
        let model = model.to_ascii_lowercase();
        Ok(state
            .embeddings
            .values()
            .flatten()
            .find(|e| e.repo == repo && e.branch == branch && e.model == model)
            .map(|e| e.dims))
    }

    async fn has_any_embeddings(&self, repo: &str, branch: &str, model: &str) -> StorageResult<bool> {
        Ok(self.get_embedding_dims(repo, branch, model).await?.is_some())
    }

    async fn nearest_embeddings(
        &self,
        repo: &str,
        branch: &str,
        model: &str,
        query_vector: &[f32],
        limit: i64,
    ) -> StorageResult<Vec<(Uuid, f32)>> {
        let state = self.state.lock().unwrap();
        let model = model.to_ascii_lowercase();
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        let mut scored: Vec<(Uuid, f32)> = state
            .embeddings
            .values()
            .flatten()
            .filter(|e| e.repo == repo && e.branch == branch && e.model == model)
            .map(|e| (e.chunk_id, cosine_similarity(query_vector, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn enqueue_embedding_jobs(&self, jobs: Vec<NewEmbeddingJob>) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        for job in jobs {
            let model = job.model.to_ascii_lowercase();
            if let Some(existing) = state.jobs.iter_mut().find(|j| {
                j.repo == job.repo
                    && j.branch == job.branch
                    && j.target_kind == job.target_kind
                    && j.target_id == job.target_id
                    && j.model == model
            }) {
                existing.status = job.status;
                existing.attempts = 0;
                existing.next_attempt_at = None;
                existing.last_error = None;
            } else {
                state.jobs.push(EmbeddingJob {
                    id: Uuid::new_v4(),
                    repo: job.repo,
                    branch: job.branch,
                    commit: job.commit,
                    target_kind: job.target_kind,
                    target_id: job.target_id,
                    model,
                    dims: None,
                    status: job.status,
                    attempts: 0,
                    next_attempt_at: None,
                    last_error: None,
                    locked_at: None,
                    locked_by: None,
                    created_at: now(),
                    updated_at: now(),
                });
            }
        }
        Ok(())
    }

    async fn claim_embedding_jobs(
        &self,
        worker_id: &str,
        batch_size: i64,
    ) -> StorageResult<Vec<EmbeddingJob>> {
        let mut state = self.state.lock().unwrap();
        let batch_size = usize::try_from(batch_size.max(0)).unwrap_or(usize::MAX);
        let now_ts = now();

        let mut claimed = Vec::new();
        for job in state.jobs.iter_mut() {
            if claimed.len() >= batch_size {
                break;
            }
            let eligible = job.status == JobStatus::Pending
                && job.next_attempt_at.is_none_or(|t| t <= now_ts);
            if eligible {
                job.status = JobStatus::Processing;
                job.locked_at = Some(now_ts);
                job.locked_by = Some(worker_id.to_string());
                job.attempts += 1;
                job.updated_at = now_ts;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete_embedding_job(&self, id: Uuid, last_error: Option<&str>) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.status = JobStatus::Completed;
            job.last_error = last_error.map(str::to_string);
            job.locked_at = None;
            job.locked_by = None;
            job.updated_at = now();
        }
        Ok(())
    }

    async fn requeue_embedding_job(
        &self,
        id: Uuid,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.status = JobStatus::Pending;
            job.next_attempt_at = Some(next_attempt_at);
            job.last_error = Some(last_error.to_string());
            job.locked_at = None;
            job.locked_by = None;
            job.updated_at = now();
        }
        Ok(())
    }

    async fn block_embedding_job(&self, id: Uuid, last_error: &str) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.status = JobStatus::Blocked;
            job.last_error = Some(last_error.to_string());
            job.next_attempt_at = None;
            job.locked_at = None;
            job.locked_by = None;
            job.updated_at = now();
        }
        Ok(())
    }

    async fn upsert_embeddings(&self, embeddings: Vec<NewEmbedding>) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        for e in embeddings {
            let dims = i32::try_from(e.vector.len()).unwrap_or(i32::MAX);
            let model = e.model.to_ascii_lowercase();
            let entry = state.embeddings.entry(e.chunk_id).or_default();
            entry.retain(|existing| existing.model != model);
            entry.push(Embedding {
                id: Uuid::new_v4(),
                chunk_id: e.chunk_id,
                repo: e.repo,
                branch: e.branch,
                commit: e.commit,
                vector: e.vector,
                model,
                dims,
                generated_at: now(),
            });
        }
        Ok(())
    }

    async fn sweep_stale_jobs(&self, stale_minutes: i64) -> StorageResult<u64> {
        let mut state = self.state.lock().unwrap();
        let cutoff = now() - chrono::Duration::minutes(stale_minutes);
        let mut swept = 0u64;
        for job in state.jobs.iter_mut() {
            if job.status == JobStatus::Processing && job.locked_at.is_some_and(|t| t < cutoff) {
                job.status = JobStatus::Pending;
                job.locked_at = None;
                job.locked_by = None;
                job.updated_at = now();
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn purge_completed_jobs(&self, purge_days: i64) -> StorageResult<u64> {
        let mut state = self.state.lock().unwrap();
        let cutoff = now() - chrono::Duration::days(purge_days);
        let before = state.jobs.len();
        state
            .jobs
            .retain(|j| !(j.status == JobStatus::Completed && j.updated_at < cutoff));
        Ok((before - state.jobs.len()) as u64)
    }

    async fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.jobs.iter().filter(|j| j.status == status).count() as i64)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
