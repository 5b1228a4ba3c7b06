//! `PostgreSQL` implementation of [`MetadataRepository`].
//!
//! Uses runtime-checked `sqlx::query`/`query_scalar` (not the compile-time
//! `query!` macro), since this workspace has no live database to verify
//! queries against at build time.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::models::{
    Branch, CodeChunk, EdgeKind, Embedding, EmbeddingJob, FileIndexBatch, IndexState, JobStatus,
    NewEmbeddingJob, SparseHit, Symbol, SymbolEdge, SymbolFingerprintRow, SymbolKind, Span,
};
use crate::traits::{MetadataRepository, NewEmbedding};

/// `PostgreSQL`-backed [`MetadataRepository`].
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn symbol_kind_str(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Namespace => "Namespace",
        SymbolKind::Class => "Class",
        SymbolKind::Interface => "Interface",
        SymbolKind::Struct => "Struct",
        SymbolKind::Enum => "Enum",
        SymbolKind::Method => "Method",
        SymbolKind::Function => "Function",
        SymbolKind::Constructor => "Constructor",
        SymbolKind::Property => "Property",
        SymbolKind::Field => "Field",
        SymbolKind::Variable => "Variable",
        SymbolKind::Parameter => "Parameter",
    }
}

fn parse_symbol_kind(s: &str) -> SymbolKind {
    match s {
        "Namespace" => SymbolKind::Namespace,
        "Class" => SymbolKind::Class,
        "Interface" => SymbolKind::Interface,
        "Struct" => SymbolKind::Struct,
        "Enum" => SymbolKind::Enum,
        "Method" => SymbolKind::Method,
        "Function" => SymbolKind::Function,
        "Constructor" => SymbolKind::Constructor,
        "Property" => SymbolKind::Property,
        "Field" => SymbolKind::Field,
        "Variable" => SymbolKind::Variable,
        _ => SymbolKind::Parameter,
    }
}

fn edge_kind_str(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Import => "Import",
        EdgeKind::Inherits => "Inherits",
        EdgeKind::Implements => "Implements",
        EdgeKind::Calls => "Calls",
        EdgeKind::References => "References",
        EdgeKind::Defines => "Defines",
        EdgeKind::Contains => "Contains",
        EdgeKind::Overrides => "Overrides",
        EdgeKind::TypeOf => "TypeOf",
        EdgeKind::Returns => "Returns",
    }
}

fn parse_edge_kind(s: &str) -> EdgeKind {
    match s {
        "Import" => EdgeKind::Import,
        "Inherits" => EdgeKind::Inherits,
        "Implements" => EdgeKind::Implements,
        "Calls" => EdgeKind::Calls,
        "References" => EdgeKind::References,
        "Defines" => EdgeKind::Defines,
        "Contains" => EdgeKind::Contains,
        "Overrides" => EdgeKind::Overrides,
        "TypeOf" => EdgeKind::TypeOf,
        _ => EdgeKind::Returns,
    }
}

fn index_state_str(state: IndexState) -> &'static str {
    match state {
        IndexState::Pending => "Pending",
        IndexState::InProgress => "InProgress",
        IndexState::Completed => "Completed",
        IndexState::Failed => "Failed",
        IndexState::Stale => "Stale",
    }
}

fn parse_index_state(s: &str) -> IndexState {
    match s {
        "InProgress" => IndexState::InProgress,
        "Completed" => IndexState::Completed,
        "Failed" => IndexState::Failed,
        "Stale" => IndexState::Stale,
        _ => IndexState::Pending,
    }
}

fn job_status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Pending",
        JobStatus::Processing => "Processing",
        JobStatus::Completed => "Completed",
        JobStatus::Blocked => "Blocked",
    }
}

fn parse_job_status(s: &str) -> JobStatus {
    match s {
        "Processing" => JobStatus::Processing,
        "Completed" => JobStatus::Completed,
        "Blocked" => JobStatus::Blocked,
        _ => JobStatus::Pending,
    }
}

fn row_to_symbol(row: &sqlx::postgres::PgRow) -> Symbol {
    Symbol {
        id: row.get("id"),
        repo: row.get("repo"),
        branch: row.get("branch"),
        commit: row.get("commit_sha"),
        file_path: row.get("file_path"),
        name: row.get("name"),
        qualified_name: row.get("qualified_name"),
        kind: parse_symbol_kind(row.get::<String, _>("kind").as_str()),
        language: row.get("language"),
        span: Span {
            start_line: row.get("start_line"),
            start_col: row.get("start_col"),
            end_line: row.get("end_line"),
            end_col: row.get("end_col"),
        },
        signature: row.get("signature"),
        documentation: row.get("documentation"),
        modifiers: row.get::<Vec<String>, _>("modifiers"),
        parent_symbol_id: row.get("parent_symbol_id"),
        literal_tokens: row.get::<Vec<String>, _>("literal_tokens"),
    }
}

fn row_to_chunk(row: &sqlx::postgres::PgRow) -> CodeChunk {
    CodeChunk {
        id: row.get("id"),
        repo: row.get("repo"),
        branch: row.get("branch"),
        commit: row.get("commit_sha"),
        file_path: row.get("file_path"),
        symbol_id: row.get("symbol_id"),
        symbol_name: row.get("symbol_name"),
        symbol_kind: parse_symbol_kind(row.get::<String, _>("symbol_kind").as_str()),
        start_line: row.get("start_line"),
        end_line: row.get("end_line"),
        chunk_start_line: row.get("chunk_start_line"),
        chunk_end_line: row.get("chunk_end_line"),
        content: row.get("content"),
        language: row.get("language"),
        token_count: row.get("token_count"),
        parent_symbol_name: row.get("parent_symbol_name"),
        signature: row.get("signature"),
        documentation: row.get("documentation"),
        content_hash: row.get("content_hash"),
    }
}

fn row_to_fingerprint(row: &sqlx::postgres::PgRow) -> SymbolFingerprintRow {
    SymbolFingerprintRow {
        symbol_id: row.get("symbol_id"),
        repo: row.get("repo"),
        branch: row.get("branch"),
        commit: row.get("commit_sha"),
        file_path: row.get("file_path"),
        language: row.get("language"),
        kind: parse_symbol_kind(row.get::<String, _>("kind").as_str()),
        fingerprint_kind: row.get("fingerprint_kind"),
        fingerprint: row.get("fingerprint"),
        band0: row.get("band0"),
        band1: row.get("band1"),
        band2: row.get("band2"),
        band3: row.get("band3"),
    }
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> EmbeddingJob {
    EmbeddingJob {
        id: row.get("id"),
        repo: row.get("repo"),
        branch: row.get("branch"),
        commit: row.get("commit_sha"),
        target_kind: row.get("target_kind"),
        target_id: row.get("target_id"),
        model: row.get("model"),
        dims: row.get("dims"),
        status: parse_job_status(row.get::<String, _>("status").as_str()),
        attempts: row.get("attempts"),
        next_attempt_at: row.get("next_attempt_at"),
        last_error: row.get("last_error"),
        locked_at: row.get("locked_at"),
        locked_by: row.get("locked_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl MetadataRepository for PostgresRepository {
    async fn ensure_branch(&self, repo: &str, branch: &str) -> StorageResult<Branch> {
        sqlx::query("INSERT INTO repositories (repo) VALUES ($1) ON CONFLICT (repo) DO NOTHING")
            .bind(repo)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            INSERT INTO branches (repo, name, index_state)
            VALUES ($1, $2, 'Pending')
            ON CONFLICT (repo, name) DO NOTHING
            ",
        )
        .bind(repo)
        .bind(branch)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT repo, name, head_commit, index_state, indexed_commit_sha FROM branches WHERE repo = $1 AND name = $2",
        )
        .bind(repo)
        .bind(branch)
        .fetch_one(&self.pool)
        .await?;

        Ok(Branch {
            repo: row.get("repo"),
            name: row.get("name"),
            head_commit: row.get("head_commit"),
            index_state: parse_index_state(row.get::<String, _>("index_state").as_str()),
            indexed_commit_sha: row.get("indexed_commit_sha"),
        })
    }

    async fn try_begin_indexing(&self, repo: &str, branch: &str) -> StorageResult<()> {
        self.ensure_branch(repo, branch).await?;

        let result = sqlx::query(
            r"
            UPDATE branches
            SET index_state = 'InProgress'
            WHERE repo = $1 AND name = $2 AND index_state <> 'InProgress'
            ",
        )
        .bind(repo)
        .bind(branch)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::IndexInProgress {
                repo: repo.to_string(),
                branch: branch.to_string(),
            });
        }
        Ok(())
    }

    async fn finish_indexing(
        &self,
        repo: &str,
        branch: &str,
        state: IndexState,
        indexed_commit_sha: Option<&str>,
    ) -> StorageResult<()> {
        sqlx::query(
            r"
            UPDATE branches
            SET index_state = $3,
                indexed_commit_sha = COALESCE($4, indexed_commit_sha)
            WHERE repo = $1 AND name = $2
            ",
        )
        .bind(repo)
        .bind(branch)
        .bind(index_state_str(state))
        .bind(indexed_commit_sha)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_file_symbols(
        &self,
        repo: &str,
        branch: &str,
        file_path: &str,
        batch: FileIndexBatch,
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        // Reindex semantics: delete prior rows for this file
        // first. symbol_search/symbol_fingerprints/code_chunks/symbol_edges
        // cascade from symbols via FK ON DELETE CASCADE (see migrations).
        sqlx::query("DELETE FROM symbols WHERE repo = $1 AND branch = $2 AND file_path = $3")
            .bind(repo)
            .bind(branch)
            .bind(file_path)
            .execute(&mut *tx)
            .await?;

        for symbol in &batch.symbols {
            sqlx::query(
                r"
                INSERT INTO symbols (
                    id, repo, branch, commit_sha, file_path, name, qualified_name, kind,
                    language, start_line, start_col, end_line, end_col,
                    signature, documentation, modifiers, parent_symbol_id, literal_tokens
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
                ",
            )
            .bind(symbol.id)
            .bind(&symbol.repo)
            .bind(&symbol.branch)
            .bind(&symbol.commit)
            .bind(&symbol.file_path)
            .bind(&symbol.name)
            .bind(&symbol.qualified_name)
            .bind(symbol_kind_str(symbol.kind))
            .bind(&symbol.language)
            .bind(symbol.span.start_line)
            .bind(symbol.span.start_col)
            .bind(symbol.span.end_line)
            .bind(symbol.span.end_col)
            .bind(&symbol.signature)
            .bind(&symbol.documentation)
            .bind(&symbol.modifiers)
            .bind(symbol.parent_symbol_id)
            .bind(&symbol.literal_tokens)
            .execute(&mut *tx)
            .await?;
        }

        for edge in &batch.edges {
            sqlx::query(
                r"
                INSERT INTO symbol_edges (id, source_symbol_id, target_symbol_id, target_name, kind)
                VALUES ($1,$2,$3,$4,$5)
                ",
            )
            .bind(edge.id)
            .bind(edge.source_symbol_id)
            .bind(edge.target_symbol_id)
            .bind(&edge.target_name)
            .bind(edge_kind_str(edge.kind))
            .execute(&mut *tx)
            .await?;
        }

        for chunk in &batch.chunks {
            sqlx::query(
                r"
                INSERT INTO code_chunks (
                    id, repo, branch, commit_sha, file_path, symbol_id, symbol_name, symbol_kind,
                    start_line, end_line, chunk_start_line, chunk_end_line, content, language,
                    token_count, parent_symbol_name, signature, documentation, content_hash
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)
                ",
            )
            .bind(chunk.id)
            .bind(&chunk.repo)
            .bind(&chunk.branch)
            .bind(&chunk.commit)
            .bind(&chunk.file_path)
            .bind(chunk.symbol_id)
            .bind(&chunk.symbol_name)
            .bind(symbol_kind_str(chunk.symbol_kind))
            .bind(chunk.start_line)
            .bind(chunk.end_line)
            .bind(chunk.chunk_start_line)
            .bind(chunk.chunk_end_line)
            .bind(&chunk.content)
            .bind(&chunk.language)
            .bind(chunk.token_count)
            .bind(&chunk.parent_symbol_name)
            .bind(&chunk.signature)
            .bind(&chunk.documentation)
            .bind(&chunk.content_hash)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &batch.search_entries {
            let name_text = entry.name_tokens.join(" ");
            let signature_text = entry.signature_tokens.join(" ");
            let doc_text = entry.doc_tokens.join(" ");
            let literal_text = entry.literal_tokens.join(" ");

            sqlx::query(
                r"
                INSERT INTO symbol_search (
                    symbol_id, repo, branch, commit_sha, file_path,
                    name_text, signature_text, doc_text, literal_text, snippet, search_vector
                ) VALUES (
                    $1,$2,$3,$4,$5,$6,$7,$8,$9,$10,
                    setweight(to_tsvector('simple', $6), 'A') ||
                    setweight(to_tsvector('simple', $7), 'B') ||
                    setweight(to_tsvector('simple', $8), 'C') ||
                    setweight(to_tsvector('simple', $9), 'D')
                )
                ",
            )
            .bind(entry.symbol_id)
            .bind(&entry.repo)
            .bind(&entry.branch)
            .bind(&entry.commit)
            .bind(&entry.file_path)
            .bind(&name_text)
            .bind(&signature_text)
            .bind(&doc_text)
            .bind(&literal_text)
            .bind(&entry.snippet)
            .execute(&mut *tx)
            .await?;
        }

        for fp in &batch.fingerprints {
            sqlx::query(
                r"
                INSERT INTO symbol_fingerprints (
                    symbol_id, repo, branch, commit_sha, file_path, language, kind,
                    fingerprint_kind, fingerprint, band0, band1, band2, band3
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
                ",
            )
            .bind(fp.symbol_id)
            .bind(&fp.repo)
            .bind(&fp.branch)
            .bind(&fp.commit)
            .bind(&fp.file_path)
            .bind(&fp.language)
            .bind(symbol_kind_str(fp.kind))
            .bind(&fp.fingerprint_kind)
            .bind(fp.fingerprint)
            .bind(fp.band0)
            .bind(fp.band1)
            .bind(fp.band2)
            .bind(fp.band3)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_symbols_by_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<Symbol>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT * FROM symbols WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_symbol).collect())
    }

    async fn get_symbol(&self, id: Uuid) -> StorageResult<Option<Symbol>> {
        let row = sqlx::query("SELECT * FROM symbols WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_symbol))
    }

    async fn get_edges_from(&self, source_ids: &[Uuid]) -> StorageResult<Vec<SymbolEdge>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, source_symbol_id, target_symbol_id, target_name, kind FROM symbol_edges WHERE source_symbol_id = ANY($1)",
        )
        .bind(source_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SymbolEdge {
                id: row.get("id"),
                source_symbol_id: row.get("source_symbol_id"),
                target_symbol_id: row.get("target_symbol_id"),
                target_name: row.get("target_name"),
                kind: parse_edge_kind(row.get::<String, _>("kind").as_str()),
            })
            .collect())
    }

    async fn get_fingerprint(&self, symbol_id: Uuid) -> StorageResult<Option<SymbolFingerprintRow>> {
        let row = sqlx::query("SELECT * FROM symbol_fingerprints WHERE symbol_id = $1")
            .bind(symbol_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_fingerprint))
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
        // Disjunctive OR across bands, the LSH contract: any one shared band
        // is enough to become a candidate.
        let rows = sqlx::query(
            r"
            SELECT * FROM symbol_fingerprints
            WHERE repo = $1 AND branch = $2 AND language = $3 AND kind = $4
              AND fingerprint_kind = $5
              AND (band0 = $6 OR band1 = $7 OR band2 = $8 OR band3 = $9)
            LIMIT $10
            ",
        )
        .bind(repo)
        .bind(branch)
        .bind(language)
        .bind(symbol_kind_str(kind))
        .bind(fingerprint_kind)
        .bind(i32::from(bands[0]))
        .bind(i32::from(bands[1]))
        .bind(i32::from(bands[2]))
        .bind(i32::from(bands[3]))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_fingerprint).collect())
    }

    async fn sparse_search(
        &self,
        repo: &str,
        branch: &str,
        query_tokens: &[String],
        limit: i64,
    ) -> StorageResult<Vec<SparseHit>> {
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        // OR-of-tokens with phrase-adjacent terms treated as independent
        // alternatives.
        let tsquery = query_tokens
            .iter()
            .map(|t| format!("{}:*", t.replace(['\'', '\\'], "")))
            .collect::<Vec<_>>()
            .join(" | ");

        let rows = sqlx::query(
            r"
            SELECT symbol_id, snippet, name_text, signature_text, doc_text, literal_text,
                   ts_rank(search_vector, to_tsquery('simple', $3)) AS rank
            FROM symbol_search
            WHERE repo = $1 AND branch = $2 AND search_vector @@ to_tsquery('simple', $3)
            ORDER BY rank DESC
            LIMIT $4
            ",
        )
        .bind(repo)
        .bind(branch)
        .bind(&tsquery)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let bucket_text = [
                    row.get::<String, _>("name_text"),
                    row.get::<String, _>("signature_text"),
                    row.get::<String, _>("doc_text"),
                    row.get::<String, _>("literal_text"),
                ]
                .join(" ");
                let bucket_tokens: HashSet<&str> = bucket_text.split_whitespace().collect();
                let matched: Vec<String> = query_tokens
                    .iter()
                    .filter(|needle| {
                        bucket_tokens.iter().any(|token| token.contains(needle.as_str()))
                    })
                    .cloned()
                    .collect();
                SparseHit {
                    symbol_id: row.get("symbol_id"),
                    score: row.get::<f32, _>("rank"),
                    snippet: row.get("snippet"),
                    matched_tokens: matched,
                }
            })
            .collect())
    }

    async fn get_chunk(&self, id: Uuid) -> StorageResult<Option<CodeChunk>> {
        let row = sqlx::query("SELECT * FROM code_chunks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_chunk))
    }

    async fn get_chunks_by_symbol_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<CodeChunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT * FROM code_chunks WHERE symbol_id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn get_embeddings_by_chunk_ids(
        &self,
        chunk_ids: &[Uuid],
        model: &str,
    ) -> StorageResult<Vec<Embedding>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, chunk_id, repo, branch, commit_sha, vector, model, dims, generated_at FROM embeddings WHERE chunk_id = ANY($1) AND model = $2",
        )
        .bind(chunk_ids)
        .bind(model.to_ascii_lowercase())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let vector: pgvector::Vector = row.get("vector");
                Embedding {
                    id: row.get("id"),
                    chunk_id: row.get("chunk_id"),
                    repo: row.get("repo"),
                    branch: row.get("branch"),
                    commit: row.get("commit_sha"),
                    vector: vector.to_vec(),
                    model: row.get("model"),
                    dims: row.get("dims"),
                    generated_at: row.get("generated_at"),
                }
            })
            .collect())
    }

    async fn get_embedding_models(&self, repo: &str, branch: &str) -> StorageResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT model FROM embeddings WHERE repo = $1 AND branch = $2",
        )
        .bind(repo)
        .bind(branch)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("model")).collect())
    }

    async fn get_embedding_dims(
        &self,
        repo: &str,
        branch: &str,
        model: &str,
    ) -> StorageResult<Option<i32>> {
        let row = sqlx::query(
            "SELECT dims FROM embeddings WHERE repo = $1 AND branch = $2 AND model = $3 LIMIT 1",
        )
        .bind(repo)
        .bind(branch)
        .bind(model.to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("dims")))
    }

    async fn has_any_embeddings(&self, repo: &str, branch: &str, model: &str) -> StorageResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM embeddings WHERE repo = $1 AND branch = $2 AND model = $3) AS present",
        )
        .bind(repo)
        .bind(branch)
        .bind(model.to_ascii_lowercase())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("present"))
    }

    async fn nearest_embeddings(
        &self,
        repo: &str,
        branch: &str,
        model: &str,
        query_vector: &[f32],
        limit: i64,
    ) -> StorageResult<Vec<(Uuid, f32)>> {
        let vector = pgvector::Vector::from(query_vector.to_vec());
        let rows = sqlx::query(
            r"
            SELECT chunk_id, 1 - (vector <=> $4) AS similarity
            FROM embeddings
            WHERE repo = $1 AND branch = $2 AND model = $3
            ORDER BY vector <=> $4
            LIMIT $5
            ",
        )
        .bind(repo)
        .bind(branch)
        .bind(model.to_ascii_lowercase())
        .bind(vector)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("chunk_id"), row.get::<f32, _>("similarity")))
            .collect())
    }

    async fn enqueue_embedding_jobs(&self, jobs: Vec<NewEmbeddingJob>) -> StorageResult<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for job in jobs {
            sqlx::query(
                r"
                INSERT INTO embedding_jobs (
                    id, repo, branch, commit_sha, target_kind, target_id, model, status,
                    attempts, next_attempt_at, last_error, created_at, updated_at
                ) VALUES (
                    gen_random_uuid(), $1,$2,$3,$4,$5,$6,$7, 0, NULL, NULL, now(), now()
                )
                ON CONFLICT (repo, branch, target_kind, target_id, model)
                DO UPDATE SET
                    status = EXCLUDED.status,
                    attempts = 0,
                    next_attempt_at = NULL,
                    last_error = NULL,
                    updated_at = now()
                ",
            )
            .bind(&job.repo)
            .bind(&job.branch)
            .bind(&job.commit)
            .bind(&job.target_kind)
            .bind(job.target_id)
            .bind(job.model.to_ascii_lowercase())
            .bind(job_status_str(job.status))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn claim_embedding_jobs(
        &self,
        worker_id: &str,
        batch_size: i64,
    ) -> StorageResult<Vec<EmbeddingJob>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r"
            UPDATE embedding_jobs
            SET status = 'Processing',
                locked_at = now(),
                locked_by = $1,
                attempts = attempts + 1,
                updated_at = now()
            WHERE id IN (
                SELECT id FROM embedding_jobs
                WHERE status = 'Pending' AND (next_attempt_at IS NULL OR next_attempt_at <= now())
                ORDER BY created_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            ",
        )
        .bind(worker_id)
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows.iter().map(row_to_job).collect())
    }

    async fn complete_embedding_job(&self, id: Uuid, last_error: Option<&str>) -> StorageResult<()> {
        sqlx::query(
            r"
            UPDATE embedding_jobs
            SET status = 'Completed', last_error = $2, locked_at = NULL, locked_by = NULL, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn requeue_embedding_job(
        &self,
        id: Uuid,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> StorageResult<()> {
        sqlx::query(
            r"
            UPDATE embedding_jobs
            SET status = 'Pending', next_attempt_at = $2, last_error = $3,
                locked_at = NULL, locked_by = NULL, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(next_attempt_at)
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn block_embedding_job(&self, id: Uuid, last_error: &str) -> StorageResult<()> {
        sqlx::query(
            r"
            UPDATE embedding_jobs
            SET status = 'Blocked', last_error = $2, next_attempt_at = NULL,
                locked_at = NULL, locked_by = NULL, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_embeddings(&self, embeddings: Vec<NewEmbedding>) -> StorageResult<()> {
        if embeddings.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for e in embeddings {
            let dims = i32::try_from(e.vector.len()).unwrap_or(i32::MAX);
            let vector = pgvector::Vector::from(e.vector);
            sqlx::query(
                r"
                INSERT INTO embeddings (id, chunk_id, repo, branch, commit_sha, vector, model, dims, generated_at)
                VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, now())
                ON CONFLICT (chunk_id, model) DO UPDATE SET
                    vector = EXCLUDED.vector,
                    model = EXCLUDED.model,
                    dims = EXCLUDED.dims,
                    generated_at = now()
                ",
            )
            .bind(e.chunk_id)
            .bind(&e.repo)
            .bind(&e.branch)
            .bind(&e.commit)
            .bind(vector)
            .bind(e.model.to_ascii_lowercase())
            .bind(dims)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn sweep_stale_jobs(&self, stale_minutes: i64) -> StorageResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE embedding_jobs
            SET status = 'Pending', locked_at = NULL, locked_by = NULL, updated_at = now()
            WHERE status = 'Processing' AND locked_at < now() - make_interval(mins => $1)
            ",
        )
        .bind(i32::try_from(stale_minutes).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_completed_jobs(&self, purge_days: i64) -> StorageResult<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM embedding_jobs
            WHERE status = 'Completed' AND updated_at < now() - make_interval(days => $1)
            ",
        )
        .bind(i32::try_from(purge_days).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM embedding_jobs WHERE status = $1")
            .bind(job_status_str(status))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}
