//! Axum HTTP surface: builds the storage pool, indexing pipeline wiring,
//! embedding job worker, and query orchestrator, then serves a small
//! `Query(request) -> response` route over it.
//!
//! Transport/framing is deliberately thin here: this module parses one
//! JSON body shape into [`QueryRequest`] and serializes [`QueryResponse`]
//! back out. It does not reimplement profile selection, ranking, or
//! job-state logic — all of that lives in the library crates.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use codeintel_config::{ApplicationConfig, RetrievalProfile};
use codeintel_embeddings::StubEmbeddingProvider;
use codeintel_indexing::{EmbeddingJobWorker, WorkerConfig};
use codeintel_query::request::{QueryEmbeddingInput, QueryRequest};
use codeintel_query::QueryOrchestrator;
use codeintel_storage::{MetadataRepository, PostgresRepository};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use crate::config::Args;

struct AppState {
    orchestrator: QueryOrchestrator,
}

/// Builds the dependency graph and serves the HTTP surface until the
/// process receives a shutdown signal.
///
/// # Errors
/// Returns an error if the database pool cannot be created, migrations
/// fail when `--migrate` is passed, or the HTTP listener cannot bind.
pub async fn run(config: ApplicationConfig, args: Args) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let pool: PgPool = if args.migrate {
        codeintel_storage::initialize_database(&config.database).await?
    } else {
        codeintel_storage::create_pool(&config.database).await?
    };

    let repository: Arc<dyn MetadataRepository> = Arc::new(PostgresRepository::new(pool));

    if !args.no_embedding_worker {
        spawn_embedding_worker(Arc::clone(&repository), Arc::clone(&config));
    }

    let orchestrator = QueryOrchestrator::new(Arc::clone(&repository), Arc::clone(&config));
    let state = Arc::new(AppState { orchestrator });

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;

    let router = Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .with_state(state);

    info!(target = "server", %addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Spawns the embedding job worker as a background task.
///
/// Embedding model hosting is an external collaborator that this
/// workspace does not yet integrate with over the network, so the
/// worker runs against [`StubEmbeddingProvider`] until a real provider
/// is wired in.
fn spawn_embedding_worker(repository: Arc<dyn MetadataRepository>, config: Arc<ApplicationConfig>) {
    let provider = Arc::new(StubEmbeddingProvider::new(
        config.embedding.model_id.clone(),
        config.embedding.dimensions,
    ));
    let worker_config = WorkerConfig::new("codeintel-embedding-worker", 1_000);
    let worker = EmbeddingJobWorker::new(
        repository,
        provider,
        config.embedding_jobs.clone(),
        worker_config,
    );

    tokio::spawn(async move {
        worker.run().await;
    });
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct QueryEmbeddingBody {
    base64: String,
    dims: Option<usize>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    query: String,
    repository: String,
    branch: Option<String>,
    language: Option<String>,
    #[serde(default = "default_max_results")]
    max_results: usize,
    profile: Option<String>,
    query_embedding: Option<QueryEmbeddingBody>,
}

const fn default_max_results() -> usize {
    20
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryBody>,
) -> impl IntoResponse {
    let profile_override = match body.profile.as_deref().map(str::parse::<RetrievalProfile>) {
        Some(Ok(profile)) => Some(profile),
        Some(Err(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid_profile" })),
            )
                .into_response();
        }
        None => None,
    };

    let request = QueryRequest {
        query: body.query,
        repository: body.repository,
        branch: body.branch,
        language: body.language,
        max_results: body.max_results,
        profile_override,
        query_embedding: body.query_embedding.map(|e| QueryEmbeddingInput {
            base64: e.base64,
            dims: e.dims,
            model: e.model,
        }),
    };

    match state.orchestrator.query(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            error!(target = "server", error = %err, "query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "query_failed" })),
            )
                .into_response()
        }
    }
}
