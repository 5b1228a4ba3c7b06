//! The query orchestrator: Fast/Hybrid/Semantic retrieval profiles plus
//! the `similar:<id>` fingerprint-candidate intent.
//!
//! A struct holding `Arc`-wrapped collaborators, one public entry point
//! per retrieval mode, `#[tracing::instrument]` on the public boundary,
//! built against `MetadataRepository`/`EmbeddingProvider` since storage is
//! combined Postgres + pgvector rather than a separate vector store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use codeintel_analysis::{tokenize, FINGERPRINT_KIND};
use codeintel_config::{ApplicationConfig, RetrievalProfile};
use codeintel_storage::{CodeChunk, MetadataRepository, SparseHit, Symbol, SymbolEdge, Uuid};
use serde_json::json;
use tracing::instrument;

use crate::error::QueryResult;
use crate::intent::{self, Intent};
use crate::request::{decode_query_embedding, QueryRequest};
use crate::response::{shape_response, QueryResponse, SearchResult};

/// The query orchestrator. Reads storage; never writes.
pub struct QueryOrchestrator {
    repository: Arc<dyn MetadataRepository>,
    config: Arc<ApplicationConfig>,
}

impl QueryOrchestrator {
    #[must_use]
    pub fn new(repository: Arc<dyn MetadataRepository>, config: Arc<ApplicationConfig>) -> Self {
        Self { repository, config }
    }

    /// Runs a query end to end: detect intent, select and execute a
    /// retrieval profile (or the `similar:` path), shape the response.
    #[instrument(skip(self, request), fields(repository = %request.repository, elapsed_ms))]
    pub async fn query(&self, request: &QueryRequest) -> QueryResult<QueryResponse> {
        let started = Instant::now();
        let detected = intent::detect(&request.query);

        let (results, mut metadata) = if detected == Intent::Similar {
            self.similar_intent(request).await?
        } else {
            let profile = request
                .profile_override
                .unwrap_or(self.config.retrieval.default_profile);
            match profile {
                RetrievalProfile::Fast => self.fast_profile(request).await?,
                RetrievalProfile::Hybrid => self.hybrid_profile(request).await?,
                RetrievalProfile::Semantic => self.semantic_profile(request).await?,
            }
        };

        metadata.insert("repository".to_string(), json!(request.repository));
        metadata.insert(
            "branch".to_string(),
            json!(request.branch_or_default()),
        );

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::Span::current().record("elapsed_ms", elapsed_ms);

        Ok(shape_response(
            request.query.clone(),
            detected.as_str(),
            results,
            &self.config.response,
            metadata,
            elapsed_ms,
        ))
    }

    // -- Fast profile --------------------------------------------------------

    async fn fast_profile(
        &self,
        request: &QueryRequest,
    ) -> QueryResult<(Vec<SearchResult>, HashMap<String, serde_json::Value>)> {
        let mut metadata = HashMap::new();
        metadata.insert("profile".to_string(), json!("fast"));

        let tokens = tokenize(&request.query);
        let branch = request.branch_or_default();
        let limit = i64::try_from(request.max_results.saturating_mul(2)).unwrap_or(i64::MAX);

        let hits = self
            .repository
            .sparse_search(&request.repository, branch, &tokens, limit)
            .await?;
        if hits.is_empty() {
            return Ok((Vec::new(), metadata));
        }

        let ids: Vec<Uuid> = hits.iter().map(|h| h.symbol_id).collect();
        let symbols = self.repository.get_symbols_by_ids(&ids).await?;
        let symbols_by_id: HashMap<Uuid, &Symbol> = symbols.iter().map(|s| (s.id, s)).collect();
        let chunks_by_symbol = self.chunks_by_symbol(&ids).await?;

        let mut scores: HashMap<Uuid, f32> = hits.iter().map(|h| (h.symbol_id, h.score)).collect();

        // Member boost (step 5): a hit whose parent is also a hit gets
        // +0.1 * parentScore.
        let boosts: Vec<(Uuid, f32)> = hits
            .iter()
            .filter_map(|h| {
                let symbol = symbols_by_id.get(&h.symbol_id)?;
                let parent_id = symbol.parent_symbol_id?;
                let parent_score = scores.get(&parent_id).copied()?;
                Some((h.symbol_id, 0.1 * parent_score))
            })
            .collect();
        for (id, boost) in boosts {
            if let Some(score) = scores.get_mut(&id) {
                *score += boost;
            }
        }

        let mut results: Vec<SearchResult> = hits
            .iter()
            .filter_map(|hit| {
                let symbol = symbols_by_id.get(&hit.symbol_id)?;
                let score = scores.get(&hit.symbol_id).copied().unwrap_or(hit.score);
                let content = chunks_by_symbol
                    .get(&hit.symbol_id)
                    .map(|c| c.content.clone())
                    .or_else(|| hit.snippet.clone())
                    .unwrap_or_default();
                let mut why: Vec<String> =
                    hit.matched_tokens.iter().map(|t| format!("match:{t}")).collect();
                why.truncate(3);
                Some(symbol_to_result(
                    symbol,
                    content,
                    score,
                    Some(hit.score),
                    None,
                    why,
                ))
            })
            .collect();

        // Edge expansion (step 5): for the top-k (k<=10) hits, fetch
        // outgoing edges and add their targets as additional results,
        // capped at maxResults/2 additions.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        let top_ids: Vec<Uuid> = results.iter().take(10).map(|r| r.id).collect();
        if !top_ids.is_empty() {
            let edges = self.repository.get_edges_from(&top_ids).await?;
            let cap = (request.max_results / 2).max(1);
            let additions = self
                .expand_edges(&edges, &scores, cap, &symbols_by_id)
                .await?;
            results.extend(additions);
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(request.max_results);
        Ok((results, metadata))
    }

    async fn expand_edges(
        &self,
        edges: &[SymbolEdge],
        source_scores: &HashMap<Uuid, f32>,
        cap: usize,
        already: &HashMap<Uuid, &Symbol>,
    ) -> QueryResult<Vec<SearchResult>> {
        let mut target_ids = Vec::new();
        for edge in edges {
            if let Some(target_id) = edge.target_symbol_id {
                if !already.contains_key(&target_id) {
                    target_ids.push(target_id);
                }
            }
        }
        target_ids.truncate(cap);
        if target_ids.is_empty() {
            return Ok(Vec::new());
        }

        let targets = self.repository.get_symbols_by_ids(&target_ids).await?;
        let targets_by_id: HashMap<Uuid, &Symbol> = targets.iter().map(|s| (s.id, s)).collect();
        let chunks_by_symbol = self.chunks_by_symbol(&target_ids).await?;

        let mut out = Vec::new();
        for edge in edges {
            let Some(target_id) = edge.target_symbol_id else {
                continue;
            };
            let Some(symbol) = targets_by_id.get(&target_id) else {
                continue;
            };
            if out.len() >= cap {
                break;
            }
            let source_score = source_scores.get(&edge.source_symbol_id).copied().unwrap_or(0.0);
            let content = chunks_by_symbol
                .get(&target_id)
                .map(|c| c.content.clone())
                .unwrap_or_default();
            out.push(symbol_to_result(
                symbol,
                content,
                0.5 * source_score,
                None,
                None,
                vec![format!("edge:{}", edge.kind)],
            ));
        }
        Ok(out)
    }

    // -- Hybrid profile -------------------------------------------------------

    async fn hybrid_profile(
        &self,
        request: &QueryRequest,
    ) -> QueryResult<(Vec<SearchResult>, HashMap<String, serde_json::Value>)> {
        let (mut results, mut metadata) = self.fast_profile(request).await?;
        metadata.insert("profile".to_string(), json!("hybrid"));

        let Some(embedding_input) = &request.query_embedding else {
            metadata.insert("fallback".to_string(), json!("hybrid->fast"));
            metadata.insert("embeddingUsed".to_string(), json!(false));
            return Ok((results, metadata));
        };
        let Ok(decoded) = decode_query_embedding(embedding_input) else {
            metadata.insert("fallback".to_string(), json!("hybrid->fast"));
            metadata.insert("embeddingUsed".to_string(), json!(false));
            return Ok((results, metadata));
        };

        let branch = request.branch_or_default();
        let model = match self.resolve_embedding_model(&decoded.model, &request.repository, branch).await? {
            Ok(model) => model,
            Err(error_code) => {
                metadata.insert("fallback".to_string(), json!("hybrid->fast"));
                metadata.insert("embeddingUsed".to_string(), json!(false));
                metadata.insert("errorCode".to_string(), json!(error_code));
                return Ok((results, metadata));
            }
        };

        if let Some(stored_dims) = self
            .repository
            .get_embedding_dims(&request.repository, branch, &model)
            .await?
        {
            if usize::try_from(stored_dims).unwrap_or(0) != decoded.vector.len() {
                metadata.insert("fallback".to_string(), json!("hybrid->fast"));
                metadata.insert("embeddingUsed".to_string(), json!(false));
                metadata.insert("errorCode".to_string(), json!("embedding_dims_mismatch"));
                return Ok((results, metadata));
            }
        }

        if !self
            .repository
            .has_any_embeddings(&request.repository, branch, &model)
            .await?
        {
            metadata.insert("fallback".to_string(), json!("query_embedding_invalid"));
            metadata.insert("embeddingUsed".to_string(), json!(false));
            return Ok((results, metadata));
        }

        let symbol_ids: Vec<Uuid> = results.iter().map(|r| r.id).collect();
        let chunks_by_symbol = self.chunks_by_symbol(&symbol_ids).await?;
        let chunk_ids: Vec<Uuid> = chunks_by_symbol.values().map(|c| c.id).collect();
        let embeddings = self
            .repository
            .get_embeddings_by_chunk_ids(&chunk_ids, &model)
            .await?;
        let embedding_by_chunk: HashMap<Uuid, &[f32]> = embeddings
            .iter()
            .map(|e| (e.chunk_id, e.vector.as_slice()))
            .collect();

        let sparse_weight = self.config.retrieval.hybrid_sparse_weight;
        let vector_weight = self.config.retrieval.hybrid_vector_weight;
        let mut reranked = 0usize;
        for result in &mut results {
            let Some(chunk) = chunks_by_symbol.get(&result.id) else {
                continue;
            };
            let Some(vector) = embedding_by_chunk.get(&chunk.id) else {
                continue;
            };
            let cosine = cosine_similarity(&decoded.vector, vector);
            let sparse_score = f64::from(result.bm25.unwrap_or(result.score));
            #[allow(clippy::cast_possible_truncation)]
            let final_score = (sparse_weight * sparse_score + vector_weight * f64::from(cosine)) as f32;
            result.score = final_score;
            result.vector = Some(cosine);
            result.why.push("rerank:semantic_boost".to_string());
            result.why.truncate(3);
            reranked += 1;
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));

        metadata.insert("embeddingUsed".to_string(), json!(true));
        metadata.insert("embeddingModel".to_string(), json!(model));
        metadata.insert("embeddingCandidateCount".to_string(), json!(reranked));
        Ok((results, metadata))
    }

    /// Resolves the hybrid/semantic embedding model.
    /// `Ok(Err(error_code))` signals a fallback-worthy ambiguity rather than
    /// a storage failure.
    async fn resolve_embedding_model(
        &self,
        explicit: &Option<String>,
        repo: &str,
        branch: &str,
    ) -> QueryResult<Result<String, &'static str>> {
        if let Some(model) = explicit {
            return Ok(Ok(model.to_lowercase()));
        }
        if !self.config.embedding.model_id.trim().is_empty() {
            return Ok(Ok(self.config.embedding.model_id.to_lowercase()));
        }
        let models = self.repository.get_embedding_models(repo, branch).await?;
        match models.as_slice() {
            [single] => Ok(Ok(single.clone())),
            _ => Ok(Err("embedding_model_ambiguous")),
        }
    }

    // -- Semantic profile -----------------------------------------------------

    async fn semantic_profile(
        &self,
        request: &QueryRequest,
    ) -> QueryResult<(Vec<SearchResult>, HashMap<String, serde_json::Value>)> {
        let branch = request.branch_or_default();

        let embedding_input = request.query_embedding.as_ref();
        let decoded = embedding_input.and_then(|i| decode_query_embedding(i).ok());

        let model = match &decoded {
            Some(decoded) => {
                match self
                    .resolve_embedding_model(&decoded.model, &request.repository, branch)
                    .await?
                {
                    Ok(model) => Some(model),
                    Err(_) => None,
                }
            }
            None => None,
        };

        let has_embeddings = match &model {
            Some(model) => {
                self.repository
                    .has_any_embeddings(&request.repository, branch, model)
                    .await?
            }
            None => false,
        };

        if let (Some(decoded), Some(model)) = (&decoded, &model) {
            if has_embeddings {
                let limit = i64::try_from(request.max_results.saturating_mul(2)).unwrap_or(i64::MAX);
                let nearest = self
                    .repository
                    .nearest_embeddings(&request.repository, branch, model, &decoded.vector, limit)
                    .await?;
                return self.results_from_nearest_chunks(nearest).await;
            }
        }

        let (results, mut metadata) = self.hybrid_profile(request).await?;
        metadata.insert("profile".to_string(), json!("semantic"));
        metadata.insert("fallback".to_string(), json!("semantic->hybrid->fast"));
        metadata.insert("embeddingUsed".to_string(), json!(false));
        Ok((results, metadata))
    }

    async fn results_from_nearest_chunks(
        &self,
        nearest: Vec<(Uuid, f32)>,
    ) -> QueryResult<(Vec<SearchResult>, HashMap<String, serde_json::Value>)> {
        let mut metadata = HashMap::new();
        metadata.insert("profile".to_string(), json!("semantic"));
        metadata.insert("embeddingUsed".to_string(), json!(true));

        if nearest.is_empty() {
            return Ok((Vec::new(), metadata));
        }

        let chunk_ids: Vec<Uuid> = nearest.iter().map(|(id, _)| *id).collect();
        let scores: HashMap<Uuid, f32> = nearest.into_iter().collect();

        let chunks: Vec<CodeChunk> = {
            let mut out = Vec::with_capacity(chunk_ids.len());
            for id in &chunk_ids {
                if let Some(chunk) = self.repository.get_chunk(*id).await? {
                    out.push(chunk);
                }
            }
            out
        };

        let symbol_ids: Vec<Uuid> = chunks.iter().map(|c| c.symbol_id).collect();
        let symbols = self.repository.get_symbols_by_ids(&symbol_ids).await?;
        let symbols_by_id: HashMap<Uuid, &Symbol> = symbols.iter().map(|s| (s.id, s)).collect();

        let mut results: Vec<SearchResult> = chunks
            .iter()
            .filter_map(|chunk| {
                let symbol = symbols_by_id.get(&chunk.symbol_id)?;
                let score = scores.get(&chunk.id).copied().unwrap_or(0.0);
                Some(symbol_to_result(
                    symbol,
                    chunk.content.clone(),
                    score,
                    None,
                    Some(score),
                    vec!["similarity:cosine".to_string()],
                ))
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok((results, metadata))
    }

    // -- Similar intent -------------------------------------------------------

    async fn similar_intent(
        &self,
        request: &QueryRequest,
    ) -> QueryResult<(Vec<SearchResult>, HashMap<String, serde_json::Value>)> {
        let mut metadata = HashMap::new();
        metadata.insert("profile".to_string(), json!("similar"));

        let Some((seed_id_text, filter)) = intent::parse_similar_query(&request.query) else {
            metadata.insert("errorCode".to_string(), json!("seed_not_found"));
            metadata.insert("error".to_string(), json!("Seed symbol not found."));
            return Ok((Vec::new(), metadata));
        };

        let Ok(seed_id) = Uuid::parse_str(seed_id_text) else {
            metadata.insert("errorCode".to_string(), json!("seed_not_found"));
            metadata.insert("error".to_string(), json!("Seed symbol not found."));
            return Ok((Vec::new(), metadata));
        };

        let Some(seed) = self.repository.get_symbol(seed_id).await? else {
            metadata.insert("errorCode".to_string(), json!("seed_not_found"));
            metadata.insert("error".to_string(), json!("Seed symbol not found."));
            return Ok((Vec::new(), metadata));
        };

        let Some(seed_fp) = self.repository.get_fingerprint(seed_id).await? else {
            metadata.insert("errorCode".to_string(), json!("seed_fingerprint_missing"));
            metadata.insert("error".to_string(), json!("Seed fingerprint not found."));
            return Ok((Vec::new(), metadata));
        };

        #[allow(clippy::cast_sign_loss)]
        let bands = [
            u16::try_from(seed_fp.band0).unwrap_or(0),
            u16::try_from(seed_fp.band1).unwrap_or(0),
            u16::try_from(seed_fp.band2).unwrap_or(0),
            u16::try_from(seed_fp.band3).unwrap_or(0),
        ];

        let candidates = self
            .repository
            .find_fingerprint_candidates(
                &request.repository,
                request.branch_or_default(),
                &seed.language,
                seed.kind,
                FINGERPRINT_KIND,
                bands,
                200,
            )
            .await?;

        let seed_hash = u64::try_from(seed_fp.fingerprint).unwrap_or(seed_fp.fingerprint as u64);

        let filter_scores: HashMap<Uuid, f32> = match filter {
            Some(filter_text) => {
                let tokens = tokenize(filter_text);
                let hits = self
                    .repository
                    .sparse_search(&request.repository, request.branch_or_default(), &tokens, 500)
                    .await?;
                hits.into_iter().map(|h| (h.symbol_id, h.score)).collect()
            }
            None => HashMap::new(),
        };
        let filtering = filter.is_some();

        let mut ranked: Vec<(Uuid, u32, f32)> = candidates
            .iter()
            .filter(|c| c.symbol_id != seed_id)
            .filter(|c| !filtering || filter_scores.contains_key(&c.symbol_id))
            .map(|c| {
                let candidate_hash = u64::try_from(c.fingerprint).unwrap_or(c.fingerprint as u64);
                let distance = (seed_hash ^ candidate_hash).count_ones();
                let score = filter_scores.get(&c.symbol_id).copied().unwrap_or(0.0);
                (c.symbol_id, distance, score)
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then(b.2.total_cmp(&a.2))
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(request.max_results);

        let ids: Vec<Uuid> = ranked.iter().map(|(id, _, _)| *id).collect();
        let symbols = self.repository.get_symbols_by_ids(&ids).await?;
        let symbols_by_id: HashMap<Uuid, &Symbol> = symbols.iter().map(|s| (s.id, s)).collect();
        let chunks_by_symbol = self.chunks_by_symbol(&ids).await?;

        let results: Vec<SearchResult> = ranked
            .iter()
            .filter_map(|(id, distance, _)| {
                let symbol = symbols_by_id.get(id)?;
                let content = chunks_by_symbol.get(id).map(|c| c.content.clone()).unwrap_or_default();
                #[allow(clippy::cast_precision_loss)]
                let score = 1.0 / (1.0 + *distance as f32);
                Some(symbol_to_result(
                    symbol,
                    content,
                    score,
                    None,
                    None,
                    vec!["similarity:simhash".to_string(), format!("distance:{distance}")],
                ))
            })
            .collect();

        Ok((results, metadata))
    }

    async fn chunks_by_symbol(&self, symbol_ids: &[Uuid]) -> QueryResult<HashMap<Uuid, CodeChunk>> {
        let chunks = self.repository.get_chunks_by_symbol_ids(symbol_ids).await?;
        Ok(chunks.into_iter().map(|c| (c.symbol_id, c)).collect())
    }
}

fn symbol_to_result(
    symbol: &Symbol,
    content: String,
    score: f32,
    bm25: Option<f32>,
    vector: Option<f32>,
    why: Vec<String>,
) -> SearchResult {
    SearchResult {
        id: symbol.id,
        result_type: "symbol".to_string(),
        repository: symbol.repo.clone(),
        branch: symbol.branch.clone(),
        file_path: symbol.file_path.clone(),
        language: symbol.language.clone(),
        symbol_name: symbol.name.clone(),
        qualified: Some(symbol.qualified_name.clone()),
        symbol_kind: Some(symbol.kind.to_string()),
        content,
        start_line: symbol.span.start_line,
        end_line: symbol.span.end_line,
        score,
        bm25,
        vector,
        signature: symbol.signature.clone(),
        documentation: symbol.documentation.clone(),
        why,
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use codeintel_storage::{
        FileIndexBatch, MockMetadataRepository, NewEmbedding, Span, SymbolFingerprintRow,
        SymbolKind, SymbolSearchEntry,
    };
    use crate::request::QueryEmbeddingInput;

    fn config() -> Arc<ApplicationConfig> {
        Arc::new(ApplicationConfig::from_env())
    }

    fn orchestrator(repo: &Arc<MockMetadataRepository>) -> QueryOrchestrator {
        QueryOrchestrator::new(repo.clone() as Arc<dyn MetadataRepository>, config())
    }

    fn encode_vector(values: &[f32]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn symbol(id: Uuid, repo: &str, branch: &str, name: &str, kind: SymbolKind) -> Symbol {
        Symbol {
            id,
            repo: repo.to_string(),
            branch: branch.to_string(),
            commit: "c1".to_string(),
            file_path: format!("src/{name}.rs"),
            name: name.to_string(),
            qualified_name: format!("pkg::{name}"),
            kind,
            language: "rust".to_string(),
            span: Span { start_line: 1, start_col: 0, end_line: 3, end_col: 1 },
            signature: Some(format!("fn {name}()")),
            documentation: None,
            modifiers: Vec::new(),
            parent_symbol_id: None,
            literal_tokens: Vec::new(),
        }
    }

    fn chunk(id: Uuid, symbol_id: Uuid, repo: &str, branch: &str, content: &str) -> CodeChunk {
        CodeChunk {
            id,
            repo: repo.to_string(),
            branch: branch.to_string(),
            commit: "c1".to_string(),
            file_path: "src/lib.rs".to_string(),
            symbol_id,
            symbol_name: "x".to_string(),
            symbol_kind: SymbolKind::Function,
            start_line: 1,
            end_line: 3,
            chunk_start_line: 1,
            chunk_end_line: 3,
            content: content.to_string(),
            language: "rust".to_string(),
            token_count: 4,
            parent_symbol_name: None,
            signature: None,
            documentation: None,
            content_hash: "hash".to_string(),
        }
    }

    async fn seed_symbol_with_search(
        repo_handle: &MockMetadataRepository,
        repo: &str,
        branch: &str,
        sym: Symbol,
        chunk_row: CodeChunk,
        name_tokens: Vec<String>,
    ) {
        let search_entry = SymbolSearchEntry {
            symbol_id: sym.id,
            repo: repo.to_string(),
            branch: branch.to_string(),
            commit: "c1".to_string(),
            file_path: sym.file_path.clone(),
            name_tokens,
            signature_tokens: Vec::new(),
            doc_tokens: Vec::new(),
            literal_tokens: Vec::new(),
            snippet: chunk_row.content.clone(),
        };
        let file_path = sym.file_path.clone();
        repo_handle
            .replace_file_symbols(
                repo,
                branch,
                &file_path,
                FileIndexBatch {
                    symbols: vec![sym],
                    chunks: vec![chunk_row],
                    search_entries: vec![search_entry],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fast_profile_returns_sparse_hits_ranked_by_score() {
        let repo = Arc::new(MockMetadataRepository::new());
        let symbol_id = Uuid::new_v4();
        let chunk_id = Uuid::new_v4();
        let sym = symbol(symbol_id, "repo1", "main", "get_user", SymbolKind::Function);
        let chunk_row = chunk(chunk_id, symbol_id, "repo1", "main", "fn get_user() {}");
        seed_symbol_with_search(
            &repo,
            "repo1",
            "main",
            sym,
            chunk_row,
            vec!["get".to_string(), "user".to_string()],
        )
        .await;

        let request = QueryRequest {
            query: "find the user".to_string(),
            repository: "repo1".to_string(),
            branch: None,
            language: None,
            max_results: 10,
            profile_override: Some(RetrievalProfile::Fast),
            query_embedding: None,
        };

        let response = orchestrator(&repo).query(&request).await.unwrap();
        assert_eq!(*response.metadata.get("profile").unwrap(), json!("fast"));
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].symbol_name, "get_user");
    }

    #[tokio::test]
    async fn hybrid_profile_reranks_with_query_embedding() {
        let repo = Arc::new(MockMetadataRepository::new());
        let model = ApplicationConfig::from_env().embedding.model_id;

        let near_symbol_id = Uuid::new_v4();
        let near_chunk_id = Uuid::new_v4();
        let far_symbol_id = Uuid::new_v4();
        let far_chunk_id = Uuid::new_v4();

        seed_symbol_with_search(
            &repo,
            "repo1",
            "main",
            symbol(near_symbol_id, "repo1", "main", "widget_near", SymbolKind::Function),
            chunk(near_chunk_id, near_symbol_id, "repo1", "main", "fn widget_near() {}"),
            vec!["widget".to_string()],
        )
        .await;
        seed_symbol_with_search(
            &repo,
            "repo1",
            "main",
            symbol(far_symbol_id, "repo1", "main", "widget_far", SymbolKind::Function),
            chunk(far_chunk_id, far_symbol_id, "repo1", "main", "fn widget_far() {}"),
            vec!["widget".to_string()],
        )
        .await;

        repo.upsert_embeddings(vec![
            NewEmbedding {
                chunk_id: near_chunk_id,
                repo: "repo1".to_string(),
                branch: "main".to_string(),
                commit: "c1".to_string(),
                vector: vec![1.0, 0.0, 0.0, 0.0],
                model: model.clone(),
            },
            NewEmbedding {
                chunk_id: far_chunk_id,
                repo: "repo1".to_string(),
                branch: "main".to_string(),
                commit: "c1".to_string(),
                vector: vec![0.0, 1.0, 0.0, 0.0],
                model: model.clone(),
            },
        ])
        .await
        .unwrap();

        let request = QueryRequest {
            query: "find the widget".to_string(),
            repository: "repo1".to_string(),
            branch: None,
            language: None,
            max_results: 10,
            profile_override: Some(RetrievalProfile::Hybrid),
            query_embedding: Some(QueryEmbeddingInput {
                base64: encode_vector(&[1.0, 0.0, 0.0, 0.0]),
                dims: Some(4),
                model: None,
            }),
        };

        let response = orchestrator(&repo).query(&request).await.unwrap();
        assert_eq!(*response.metadata.get("embeddingUsed").unwrap(), json!(true));
        assert_eq!(response.results[0].symbol_name, "widget_near");
    }

    #[tokio::test]
    async fn semantic_profile_uses_nearest_embeddings() {
        let repo = Arc::new(MockMetadataRepository::new());
        let model = ApplicationConfig::from_env().embedding.model_id;
        let symbol_id = Uuid::new_v4();
        let chunk_id = Uuid::new_v4();

        repo.replace_file_symbols(
            "repo1",
            "main",
            "src/seeker.rs",
            FileIndexBatch {
                symbols: vec![symbol(symbol_id, "repo1", "main", "seeker", SymbolKind::Function)],
                chunks: vec![chunk(chunk_id, symbol_id, "repo1", "main", "fn seeker() {}")],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        repo.upsert_embeddings(vec![NewEmbedding {
            chunk_id,
            repo: "repo1".to_string(),
            branch: "main".to_string(),
            commit: "c1".to_string(),
            vector: vec![0.0, 0.0, 1.0, 0.0],
            model: model.clone(),
        }])
        .await
        .unwrap();

        let request = QueryRequest {
            query: "semantic lookup".to_string(),
            repository: "repo1".to_string(),
            branch: None,
            language: None,
            max_results: 10,
            profile_override: Some(RetrievalProfile::Semantic),
            query_embedding: Some(QueryEmbeddingInput {
                base64: encode_vector(&[0.0, 0.0, 1.0, 0.0]),
                dims: Some(4),
                model: None,
            }),
        };

        let response = orchestrator(&repo).query(&request).await.unwrap();
        assert_eq!(*response.metadata.get("embeddingUsed").unwrap(), json!(true));
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].symbol_name, "seeker");
    }

    #[tokio::test]
    async fn semantic_profile_falls_back_without_embeddings() {
        let repo = Arc::new(MockMetadataRepository::new());
        let request = QueryRequest {
            query: "semantic lookup".to_string(),
            repository: "repo1".to_string(),
            branch: None,
            language: None,
            max_results: 10,
            profile_override: Some(RetrievalProfile::Semantic),
            query_embedding: None,
        };

        let response = orchestrator(&repo).query(&request).await.unwrap();
        assert_eq!(*response.metadata.get("profile").unwrap(), json!("semantic"));
        assert_eq!(*response.metadata.get("fallback").unwrap(), json!("semantic->hybrid->fast"));
    }

    #[tokio::test]
    async fn similar_intent_ranks_candidates_by_hamming_distance() {
        let repo = Arc::new(MockMetadataRepository::new());
        let seed_id = Uuid::new_v4();
        let near_id = Uuid::new_v4();
        let far_id = Uuid::new_v4();

        for (id, name) in [(seed_id, "seed"), (near_id, "near"), (far_id, "far")] {
            let sym_id = id;
            let chunk_id = Uuid::new_v4();
            repo.replace_file_symbols(
                "repo1",
                "main",
                &format!("src/{name}.rs"),
                FileIndexBatch {
                    symbols: vec![symbol(sym_id, "repo1", "main", name, SymbolKind::Function)],
                    chunks: vec![chunk(chunk_id, sym_id, "repo1", "main", &format!("fn {name}() {{}}"))],
                    fingerprints: vec![SymbolFingerprintRow {
                        symbol_id: sym_id,
                        repo: "repo1".to_string(),
                        branch: "main".to_string(),
                        commit: "c1".to_string(),
                        file_path: format!("src/{name}.rs"),
                        language: "rust".to_string(),
                        kind: SymbolKind::Function,
                        fingerprint_kind: FINGERPRINT_KIND.to_string(),
                        fingerprint: match name {
                            "seed" => 0b0000,
                            "near" => 0b0001,
                            _ => 0b1111,
                        },
                        band0: 1,
                        band1: 0,
                        band2: 0,
                        band3: 0,
                    }],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let request = QueryRequest {
            query: format!("similar:{seed_id}"),
            repository: "repo1".to_string(),
            branch: None,
            language: None,
            max_results: 10,
            profile_override: None,
            query_embedding: None,
        };

        let response = orchestrator(&repo).query(&request).await.unwrap();
        assert_eq!(response.intent, "similar");
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].symbol_name, "near");
        assert_eq!(response.results[1].symbol_name, "far");
    }

    #[tokio::test]
    async fn similar_intent_reports_missing_seed() {
        let repo = Arc::new(MockMetadataRepository::new());
        let request = QueryRequest {
            query: format!("similar:{}", Uuid::new_v4()),
            repository: "repo1".to_string(),
            branch: None,
            language: None,
            max_results: 10,
            profile_override: None,
            query_embedding: None,
        };

        let response = orchestrator(&repo).query(&request).await.unwrap();
        assert!(response.results.is_empty());
        assert_eq!(*response.metadata.get("errorCode").unwrap(), json!("seed_not_found"));
    }
}
