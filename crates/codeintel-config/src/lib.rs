//! Centralized configuration management for the code-intelligence workspace
//!
//! This crate provides a unified configuration system that eliminates duplication
//! across the codebase and provides type-safe, validated configuration with
//! support for multiple sources (environment, files, CLI, etc.).
//!
//! Configuration follows a simple hierarchy:
//! 1. Safe defaults (defined as constants)
//! 2. Environment variable overrides
//! 3. Runtime validation

pub mod error;
pub mod source;
pub mod validation;

pub use error::{ConfigError, ConfigResult};

// =============================================================================
// SAFE DEFAULTS - Work for any environment (dev, staging, prod, test)
// =============================================================================

// Embedding provider configuration. Model *hosting* is an external
// collaborator; this crate only configures the name/dims this core
// expects the provider to produce and the per-request timeout it
// enforces around the provider call.
const DEFAULT_EMBEDDING_MODEL_ID: &str = "jinaai/jina-embeddings-v2-base-code";
const DEFAULT_EMBEDDING_MODEL_DIMENSIONS: usize = 768;
const DEFAULT_EMBEDDING_PROVIDER_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_EMBEDDING_INDEXER_CHUNK_BATCH_SIZE: usize = 8;

// Tokenizer Configuration
const DEFAULT_TOKENIZER_CONCURRENT_FILE_LIMIT: usize = 4; // Reasonable parallelism
const DEFAULT_TOKENIZER_MAX_CHUNK_TOKENS: usize = 512; // Matches model max_tokens
const DEFAULT_TOKENIZER_SPLIT_LARGE_UNITS: bool = true; // Always split large functions
const DEFAULT_CHUNK_QUEUE_CAPACITY: usize = 1000; // Bounded queue for back pressure
const DEFAULT_USE_PERSISTENT_QUEUE: bool = true; // PostgreSQL queue for persistence and crash recovery

// Database Configuration (safe local defaults)
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "codeintel";
const DEFAULT_DB_USER: &str = "codeintel";
const DEFAULT_DB_PASSWORD: &str = "localdev123";
const DEFAULT_DB_SSL_MODE: &str = "disable";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5; // Conservative
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 2; // Keep some warm
const DEFAULT_DB_TIMEOUT_SECONDS: u64 = 30; // Reasonable timeout
const DEFAULT_DB_IDLE_TIMEOUT_SECONDS: u64 = 300; // 5 minutes
const DEFAULT_AUTO_MIGRATE: bool = true; // Auto-migrate by default

// API Server Configuration
const DEFAULT_API_HOST: &str = "127.0.0.1"; // Localhost only for security
const DEFAULT_API_PORT: u16 = 3000;
const DEFAULT_API_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_API_ENABLE_CORS: bool = true;
const DEFAULT_API_ENABLE_DOCS: bool = true;

// Telemetry Configuration
const DEFAULT_TELEMETRY_ENABLED: bool = false; // Opt-in
const DEFAULT_TRACING_LEVEL: &str = "info";
const DEFAULT_TRACE_SAMPLE_RATE: f64 = 0.1; // Light sampling
const DEFAULT_TELEMETRY_SERVICE_NAME: &str = "codeintel";
const DEFAULT_TELEMETRY_ENVIRONMENT: &str = "development";

// Retrieval profile configuration
const DEFAULT_RETRIEVAL_PROFILE: &str = "fast";
const DEFAULT_HYBRID_SPARSE_WEIGHT: f64 = 0.3;
const DEFAULT_HYBRID_VECTOR_WEIGHT: f64 = 0.7;

// Chunking configuration
const DEFAULT_CHUNK_CONTEXT_LINES_BEFORE: usize = 5;
const DEFAULT_CHUNK_CONTEXT_LINES_AFTER: usize = 5;
const DEFAULT_MAX_CHUNK_CHARS: usize = 30_000;

// Embedding job queue configuration
const DEFAULT_EMBEDDINGS_ENABLED: bool = false;
const DEFAULT_EMBEDDING_JOBS_MODEL: &str = "";
const DEFAULT_EMBEDDING_JOBS_BATCH_SIZE: usize = 64;
const DEFAULT_EMBEDDING_JOBS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_EMBEDDING_JOBS_STALE_MINUTES: i64 = 10;
const DEFAULT_EMBEDDING_JOBS_PURGE_DAYS: i64 = 7;

// Response shaping configuration
const DEFAULT_MAX_RESPONSE_RESULTS: usize = 50;
const DEFAULT_MAX_RESPONSE_SNIPPET_CHARS: usize = 8_000;
const DEFAULT_MAX_RESPONSE_BYTES: usize = 65_536;

// Database imports for PostgreSQL functionality
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};
use std::time::Duration;

/// Core configuration for the entire application
///
/// All settings have safe defaults and can be overridden via environment variables.
/// No profile/environment selection needed - same defaults work everywhere.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApplicationConfig {
    /// Embedding generation configuration
    pub embedding: EmbeddingConfig,

    /// Indexing service configuration
    pub indexing: IndexingConfig,

    /// Database configuration (PostgreSQL; embeddings are a pgvector column
    /// on the same store, see codeintel-storage)
    pub database: DatabaseConfig,

    /// API server configuration
    pub api: ApiConfig,

    /// Telemetry and observability configuration
    pub telemetry: TelemetryConfig,

    /// Query orchestrator retrieval-profile configuration
    pub retrieval: RetrievalConfig,

    /// Chunker context-line and size-cap configuration
    pub chunking: ChunkConfig,

    /// Durable embedding job queue configuration
    pub embedding_jobs: EmbeddingJobsConfig,

    /// Response-shaping (compaction) configuration
    pub response: ResponseConfig,
}

/// The query orchestrator's three retrieval profiles.
///
/// Fast is sparse-only, Hybrid reranks sparse hits with cosine similarity,
/// Semantic searches the vector index directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalProfile {
    Fast,
    Hybrid,
    Semantic,
}

impl Default for RetrievalProfile {
    fn default() -> Self {
        Self::Fast
    }
}

impl std::str::FromStr for RetrievalProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "hybrid" => Ok(Self::Hybrid),
            "semantic" => Ok(Self::Semantic),
            other => Err(ConfigError::Generic {
                message: format!("unknown retrieval profile '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for RetrievalProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fast => "fast",
            Self::Hybrid => "hybrid",
            Self::Semantic => "semantic",
        };
        write!(f, "{s}")
    }
}

/// Retrieval-profile selection and hybrid rerank weighting
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetrievalConfig {
    /// Profile used when a query does not override one explicitly
    pub default_profile: RetrievalProfile,

    /// Weight applied to the sparse (BM25/tsvector) score in Hybrid rerank
    pub hybrid_sparse_weight: f64,

    /// Weight applied to cosine similarity in Hybrid rerank
    pub hybrid_vector_weight: f64,
}

impl RetrievalConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let default_profile = std::env::var("CODEINTEL_RETRIEVAL_DEFAULT_PROFILE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(
                DEFAULT_RETRIEVAL_PROFILE
                    .parse()
                    .unwrap_or(RetrievalProfile::Fast),
            );

        let hybrid_sparse_weight = std::env::var("CODEINTEL_RETRIEVAL_HYBRID_SPARSE_WEIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HYBRID_SPARSE_WEIGHT);

        let hybrid_vector_weight = std::env::var("CODEINTEL_RETRIEVAL_HYBRID_VECTOR_WEIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HYBRID_VECTOR_WEIGHT);

        Self {
            default_profile,
            hybrid_sparse_weight,
            hybrid_vector_weight,
        }
    }
}

impl validation::Validate for RetrievalConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.hybrid_sparse_weight < 0.0 || self.hybrid_vector_weight < 0.0 {
            return Err(ConfigError::Generic {
                message: "hybrid rerank weights must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Chunker context-line and size-cap configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChunkConfig {
    /// Lines of context to include before a chunk-eligible symbol's span
    pub context_lines_before: usize,

    /// Lines of context to include after a chunk-eligible symbol's span
    pub context_lines_after: usize,

    /// Maximum chunk content length in characters before truncation
    pub max_chunk_chars: usize,
}

impl ChunkConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let context_lines_before = std::env::var("CODEINTEL_CHUNKING_CONTEXT_LINES_BEFORE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHUNK_CONTEXT_LINES_BEFORE);

        let context_lines_after = std::env::var("CODEINTEL_CHUNKING_CONTEXT_LINES_AFTER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHUNK_CONTEXT_LINES_AFTER);

        let max_chunk_chars = std::env::var("CODEINTEL_CHUNKING_MAX_CHUNK_CHARS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_CHUNK_CHARS);

        Self {
            context_lines_before,
            context_lines_after,
            max_chunk_chars,
        }
    }
}

impl validation::Validate for ChunkConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.max_chunk_chars as u64, 1, 10_000_000, "max_chunk_chars")?;
        Ok(())
    }
}

/// Durable embedding job queue configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingJobsConfig {
    /// Global on/off switch; when false, `Enqueue` is a no-op
    pub enabled: bool,

    /// Configured embedding model name (blank means "not configured")
    pub model: String,

    /// Rows claimed per worker tick
    pub batch_size: usize,

    /// Attempts before a job is permanently `Blocked`
    pub max_attempts: u32,

    /// Minutes after which a `Processing` job is considered stale and swept back to `Pending`
    pub stale_minutes: i64,

    /// Days after which `Completed` rows are purged
    pub purge_days: i64,
}

impl EmbeddingJobsConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let enabled = std::env::var("CODEINTEL_EMBEDDING_JOBS_ENABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDINGS_ENABLED);

        let model = std::env::var("CODEINTEL_EMBEDDING_JOBS_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_JOBS_MODEL.to_string());

        let batch_size = std::env::var("CODEINTEL_EMBEDDING_JOBS_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_JOBS_BATCH_SIZE);

        let max_attempts = std::env::var("CODEINTEL_EMBEDDING_JOBS_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_JOBS_MAX_ATTEMPTS);

        let stale_minutes = std::env::var("CODEINTEL_EMBEDDING_JOBS_STALE_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_JOBS_STALE_MINUTES);

        let purge_days = std::env::var("CODEINTEL_EMBEDDING_JOBS_PURGE_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_JOBS_PURGE_DAYS);

        Self {
            enabled,
            model,
            batch_size,
            max_attempts,
            stale_minutes,
            purge_days,
        }
    }

    /// The model name normalised the way the enqueuer persists it: lowercase,
    /// or the `__missing__` sentinel when blank/whitespace.
    #[must_use]
    pub fn normalized_model(&self) -> String {
        let trimmed = self.model.trim();
        if trimmed.is_empty() {
            "__missing__".to_string()
        } else {
            trimmed.to_ascii_lowercase()
        }
    }
}

impl validation::Validate for EmbeddingJobsConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.batch_size as u64, 1, 10_000, "batch_size")?;
        validation::validate_range(u64::from(self.max_attempts), 1, 1_000, "max_attempts")?;
        validation::validate_range(self.stale_minutes as u64, 1, 10_080, "stale_minutes")?;
        validation::validate_range(self.purge_days as u64, 1, 3_650, "purge_days")?;
        Ok(())
    }
}

/// Response shaping / compaction configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseConfig {
    /// Maximum number of results returned in a single response
    pub max_results: usize,

    /// Total snippet character budget shared proportionally across results
    pub max_snippet_chars: usize,

    /// Maximum serialised response size in bytes
    pub max_json_bytes: usize,
}

impl ResponseConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let max_results = std::env::var("CODEINTEL_RESPONSE_MAX_RESULTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_RESPONSE_RESULTS);

        let max_snippet_chars = std::env::var("CODEINTEL_RESPONSE_MAX_SNIPPET_CHARS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_RESPONSE_SNIPPET_CHARS);

        let max_json_bytes = std::env::var("CODEINTEL_RESPONSE_MAX_JSON_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_RESPONSE_BYTES);

        Self {
            max_results,
            max_snippet_chars,
            max_json_bytes,
        }
    }
}

impl validation::Validate for ResponseConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.max_results as u64, 1, 10_000, "max_results")?;
        validation::validate_range(
            self.max_snippet_chars as u64,
            1,
            10_000_000,
            "max_snippet_chars",
        )?;
        validation::validate_range(self.max_json_bytes as u64, 256, 100_000_000, "max_json_bytes")?;
        Ok(())
    }
}

/// Embedding provider configuration.
///
/// Model hosting is an external collaborator; this struct configures only
/// what the core needs to know about the provider it talks to through the
/// `EmbeddingProvider` trait: the model name/dims to stamp on enqueued
/// jobs and persisted embeddings, the per-request timeout enforced around
/// each provider call, and the chunk batch size passed to
/// `TryGenerateEmbeddings` per worker tick.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier stamped on jobs/embeddings (normalised lowercase by
    /// the enqueuer).
    pub model_id: String,

    /// Expected embedding vector width for `model_id`.
    pub dimensions: usize,

    /// Per-request timeout enforced around each `EmbeddingProvider` call
    /// (default 30s).
    pub request_timeout_seconds: u64,

    /// Chunks handed to the provider in a single `TryGenerateEmbeddings` call.
    pub batch_size: usize,
}

impl EmbeddingConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let model_id = std::env::var("CODEINTEL_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL_ID.to_string());

        let dimensions = std::env::var("CODEINTEL_EMBEDDING_DIMENSION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_MODEL_DIMENSIONS);

        let request_timeout_seconds = std::env::var("CODEINTEL_EMBEDDING_PROVIDER_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_PROVIDER_TIMEOUT_SECONDS);

        let batch_size = std::env::var("CODEINTEL_EMBEDDING_INDEXER_CHUNK_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_INDEXER_CHUNK_BATCH_SIZE);

        Self {
            model_id,
            dimensions,
            request_timeout_seconds,
            batch_size,
        }
    }
}

impl validation::Validate for EmbeddingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.model_id, "model_id")?;
        validation::validate_range(self.dimensions as u64, 1, 4096, "dimensions")?;
        validation::validate_range(self.request_timeout_seconds, 1, 3600, "request_timeout_seconds")?;
        validation::validate_range(self.batch_size as u64, 1, 1000, "batch_size")?;
        Ok(())
    }
}


/// Indexing configuration - consolidated
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexingConfig {
    /// Maximum chunk size in tokens
    pub max_chunk_tokens: usize,

    /// Whether to split large code units
    pub split_large_units: bool,

    /// Number of concurrent indexing tasks
    pub concurrency_limit: usize,

    /// Chunk queue capacity (bounded for back pressure control)
    pub chunk_queue_capacity: usize,

    /// Use PostgreSQL-backed persistent queue (true) or in-memory queue (false)
    pub use_persistent_queue: bool,
}

impl IndexingConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let max_chunk_tokens = std::env::var("CODEINTEL_INDEXING_MAX_CHUNK_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOKENIZER_MAX_CHUNK_TOKENS);

        let split_large_units = std::env::var("CODEINTEL_INDEXING_SPLIT_LARGE_UNITS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOKENIZER_SPLIT_LARGE_UNITS);

        let concurrency_limit = std::env::var("CODEINTEL_INDEXING_CONCURRENCY_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOKENIZER_CONCURRENT_FILE_LIMIT);

        let chunk_queue_capacity = std::env::var("CODEINTEL_INDEXING_CHUNK_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHUNK_QUEUE_CAPACITY);

        let use_persistent_queue = std::env::var("CODEINTEL_INDEXING_USE_PERSISTENT_QUEUE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_USE_PERSISTENT_QUEUE);

        Self {
            max_chunk_tokens,
            split_large_units,
            concurrency_limit,
            chunk_queue_capacity,
            use_persistent_queue,
        }
    }
}

impl validation::Validate for IndexingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.max_chunk_tokens as u64, 1, 10_000, "max_chunk_tokens")?;
        validation::validate_range(self.concurrency_limit as u64, 1, 100, "concurrency_limit")?;
        validation::validate_range(
            self.chunk_queue_capacity as u64,
            100,
            100_000,
            "chunk_queue_capacity",
        )?;
        Ok(())
    }
}

/// Database configuration - comprehensive `PostgreSQL` configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (full connection string)
    pub url: String,

    /// Database host
    pub host: String,

    /// Database port
    pub port: u16,

    /// Database name
    pub database: String,

    /// Username for authentication
    pub username: String,

    /// Password for authentication (use environment variables for security)
    pub password: String,

    /// SSL mode for connections ("disable", "prefer", "require")
    pub ssl_mode: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Minimum number of connections in pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub timeout_seconds: u64,

    /// Idle timeout in seconds
    pub idle_timeout_seconds: u64,

    /// Enable migrations on startup
    pub auto_migrate: bool,
}

impl DatabaseConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let host = std::env::var("CODEINTEL_DATABASE_HOST")
            .or_else(|_| std::env::var("DB_HOST"))
            .unwrap_or_else(|_| DEFAULT_DB_HOST.to_string());

        let port = std::env::var("CODEINTEL_DATABASE_PORT")
            .or_else(|_| std::env::var("DB_PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_PORT);

        let database = std::env::var("CODEINTEL_DATABASE_NAME")
            .or_else(|_| std::env::var("DB_NAME"))
            .unwrap_or_else(|_| DEFAULT_DB_NAME.to_string());

        let username = std::env::var("CODEINTEL_DATABASE_USERNAME")
            .or_else(|_| std::env::var("DB_USER"))
            .unwrap_or_else(|_| DEFAULT_DB_USER.to_string());

        let password = std::env::var("CODEINTEL_DATABASE_PASSWORD")
            .or_else(|_| std::env::var("DB_PASSWORD"))
            .unwrap_or_else(|_| {
                tracing::warn!(
                    "Using default database password '{}' - Set CODEINTEL_DATABASE_PASSWORD or DB_PASSWORD environment variable. NEVER use default password in production!",
                    DEFAULT_DB_PASSWORD
                );
                DEFAULT_DB_PASSWORD.to_string()
            });

        let ssl_mode = std::env::var("CODEINTEL_DATABASE_SSL_MODE")
            .or_else(|_| std::env::var("DB_SSLMODE"))
            .unwrap_or_else(|_| DEFAULT_DB_SSL_MODE.to_string());

        let max_connections = std::env::var("CODEINTEL_DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

        let min_connections = std::env::var("CODEINTEL_DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_MIN_CONNECTIONS);

        let timeout_seconds = std::env::var("CODEINTEL_DATABASE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_TIMEOUT_SECONDS);

        let idle_timeout_seconds = std::env::var("CODEINTEL_DATABASE_IDLE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_IDLE_TIMEOUT_SECONDS);

        let auto_migrate = std::env::var("CODEINTEL_DATABASE_AUTO_MIGRATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_AUTO_MIGRATE);

        // Construct comprehensive URL if not provided
        let url = std::env::var("CODEINTEL_DATABASE_URL").unwrap_or_else(|_| {
            format!("postgresql://{username}:{password}@{host}:{port}/{database}")
        });

        Self {
            url,
            host,
            port,
            database,
            username,
            password,
            ssl_mode,
            max_connections,
            min_connections,
            timeout_seconds,
            idle_timeout_seconds,
            auto_migrate,
        }
    }
}

impl validation::Validate for DatabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.url, "url")?;
        validation::validate_range(u64::from(self.max_connections), 1, 1000, "max_connections")?;
        validation::validate_range(self.timeout_seconds, 1, 3600, "timeout_seconds")?;
        Ok(())
    }
}

impl DatabaseConfig {
    /// Convert string SSL mode to `PgSslMode`
    fn parse_ssl_mode(&self) -> PgSslMode {
        match self.ssl_mode.as_str() {
            "disable" => PgSslMode::Disable,
            "require" => PgSslMode::Require,
            _ => PgSslMode::Prefer, // Safe default for "prefer" and unknown values
        }
    }

    /// Build `PostgreSQL` connection options (no URL with password exposed!)
    /// This method creates type-safe connection options for `PostgreSQL`
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(self.parse_ssl_mode())
    }

    /// Create a `PostgreSQL` connection pool with proper configuration
    ///
    /// # Errors
    /// Returns an error if connection to database fails
    pub async fn create_pool(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.timeout_seconds))
            .idle_timeout(Duration::from_secs(self.idle_timeout_seconds))
            .connect_with(self.connect_options())
            .await
    }

    /// Get connection info for logging (NO PASSWORD!)
    /// This method provides safe connection information for logging and debugging
    pub fn safe_connection_string(&self) -> String {
        format!(
            "{}@{}:{}/{} (ssl: {:?})",
            self.username, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

/// API server configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable OpenAPI/Swagger documentation
    pub enable_docs: bool,
}

impl ApiConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let host =
            std::env::var("CODEINTEL_API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());

        let port = std::env::var("CODEINTEL_API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_PORT);

        let timeout_seconds = std::env::var("CODEINTEL_API_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECONDS);

        let enable_cors = std::env::var("CODEINTEL_API_ENABLE_CORS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_ENABLE_CORS);

        let enable_docs = std::env::var("CODEINTEL_API_ENABLE_DOCS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_ENABLE_DOCS);

        Self {
            host,
            port,
            timeout_seconds,
            enable_cors,
            enable_docs,
        }
    }
}

impl validation::Validate for ApiConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.host, "host")?;
        if self.port != 0 {
            validation::validate_port(self.port, "port")?;
        }
        validation::validate_range(self.timeout_seconds, 1, 3600, "timeout_seconds")?;
        Ok(())
    }
}

/// Telemetry and observability configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetryConfig {
    /// Enable telemetry collection
    pub enabled: bool,

    /// OpenTelemetry endpoint URL
    pub otlp_endpoint: Option<String>,

    /// Tracing level (trace, debug, info, warn, error)
    pub tracing_level: String,

    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Metrics server port
    pub metrics_port: u16,

    /// Sample rate for traces (0.0 to 1.0)
    pub trace_sample_rate: f64,

    /// Service name for telemetry
    pub service_name: String,

    /// Environment label for telemetry
    pub environment: String,
}

impl TelemetryConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let enabled = std::env::var("CODEINTEL_TELEMETRY_ENABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TELEMETRY_ENABLED);

        let otlp_endpoint = std::env::var("CODEINTEL_TELEMETRY_OTLP_ENDPOINT").ok();

        let tracing_level = std::env::var("CODEINTEL_TELEMETRY_TRACING_LEVEL")
            .unwrap_or_else(|_| DEFAULT_TRACING_LEVEL.to_string());

        let enable_metrics = std::env::var("CODEINTEL_TELEMETRY_ENABLE_METRICS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TELEMETRY_ENABLED);

        let metrics_port = std::env::var("CODEINTEL_TELEMETRY_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0); // Random port by default

        let trace_sample_rate = std::env::var("CODEINTEL_TELEMETRY_TRACE_SAMPLE_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TRACE_SAMPLE_RATE);

        let service_name = std::env::var("CODEINTEL_TELEMETRY_SERVICE_NAME")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_SERVICE_NAME.to_string());

        let environment = std::env::var("CODEINTEL_TELEMETRY_ENVIRONMENT")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_ENVIRONMENT.to_string());

        Self {
            enabled,
            otlp_endpoint,
            tracing_level,
            enable_metrics,
            metrics_port,
            trace_sample_rate,
            service_name,
            environment,
        }
    }
}

impl validation::Validate for TelemetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.service_name, "service_name")?;
        validation::validate_non_empty(&self.environment, "environment")?;

        if let Some(ref endpoint) = self.otlp_endpoint {
            validation::validate_url(endpoint, "otlp_endpoint")?;
        }

        if self.metrics_port != 0 {
            validation::validate_port(self.metrics_port, "metrics_port")?;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sample_rate_scaled = (self.trace_sample_rate * 1000.0) as u64;
        validation::validate_range(sample_rate_scaled, 0, 1000, "trace_sample_rate")?;

        // Validate tracing level
        match self.tracing_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Generic {
                message: format!("Invalid tracing level: {}", self.tracing_level),
            }),
        }
    }
}

impl ApplicationConfig {
    /// Load configuration from environment variables with safe defaults
    ///
    /// All configuration is loaded from environment variables or falls back
    /// to safe defaults that work in any environment (dev, staging, prod, test).
    pub fn from_env() -> Self {
        Self {
            embedding: EmbeddingConfig::from_env(),
            indexing: IndexingConfig::from_env(),
            database: DatabaseConfig::from_env(),
            api: ApiConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
            retrieval: RetrievalConfig::from_env(),
            chunking: ChunkConfig::from_env(),
            embedding_jobs: EmbeddingJobsConfig::from_env(),
            response: ResponseConfig::from_env(),
        }
    }
}

impl validation::Validate for ApplicationConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.embedding.validate()?;
        self.indexing.validate()?;
        self.database.validate()?;
        self.api.validate()?;
        self.telemetry.validate()?;
        self.retrieval.validate()?;
        self.chunking.validate()?;
        self.embedding_jobs.validate()?;
        self.response.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn test_application_config_can_be_created() {
        let config = ApplicationConfig::from_env();
        assert!(config.embedding.model_id.contains("jina")); // Uses real model
        assert_eq!(config.embedding.dimensions, DEFAULT_EMBEDDING_MODEL_DIMENSIONS);
    }

    #[test]
    fn test_config_validation_rejects_invalid_urls() {
        let mut config = ApplicationConfig::from_env();
        config.database.url = String::new();

        let validation_result = config.validate();
        assert!(validation_result.is_err());
    }

    #[test]
    fn test_config_can_be_serialized_to_toml() {
        let config = ApplicationConfig::from_env();
        let toml_result = toml::to_string(&config);
        assert!(toml_result.is_ok(), "Config should serialize to TOML");

        if let Ok(toml_string) = toml_result {
            assert!(toml_string.contains("embedding"));
            assert!(toml_string.contains("database"));
        }
    }

    #[test]
    fn test_config_uses_safe_defaults() {
        let config = ApplicationConfig::from_env();

        // All configs should use safe defaults that work in any environment
        assert_eq!(config.embedding.batch_size, DEFAULT_EMBEDDING_INDEXER_CHUNK_BATCH_SIZE);
        assert_eq!(
            config.indexing.concurrency_limit,
            DEFAULT_TOKENIZER_CONCURRENT_FILE_LIMIT
        );
        assert_eq!(config.api.enable_docs, DEFAULT_API_ENABLE_DOCS);
    }

    #[test]
    fn test_environment_variable_overrides() {
        // Test that environment variables properly override defaults
        unsafe {
            std::env::set_var("CODEINTEL_EMBEDDING_INDEXER_CHUNK_BATCH_SIZE", "999");
            std::env::set_var("CODEINTEL_API_PORT", "1234");
        }

        let config = ApplicationConfig::from_env();

        assert_eq!(config.embedding.batch_size, 999);
        assert_eq!(config.api.port, 1234);

        // Cleanup
        unsafe {
            std::env::remove_var("CODEINTEL_EMBEDDING_INDEXER_CHUNK_BATCH_SIZE");
            std::env::remove_var("CODEINTEL_API_PORT");
        }
    }

    #[test]
    fn test_telemetry_config_validation() {
        let mut config = ApplicationConfig::from_env();
        config.telemetry.tracing_level = "invalid-level".to_string();

        let validation_result = config.validate();
        assert!(validation_result.is_err());

        if let Err(error) = validation_result {
            assert!(error.to_string().contains("Invalid tracing level"));
        }
    }

    #[test]
    fn test_from_env_creates_valid_config() {
        let config = ApplicationConfig::from_env();
        let validation_result = config.validate();
        assert!(
            validation_result.is_ok(),
            "from_env() should create valid config: {validation_result:?}"
        );
    }

    #[test]
    fn test_embedding_model_consistency() {
        let config = ApplicationConfig::from_env();

        // All configs use the correct Jina model
        assert_eq!(config.embedding.model_id, "jinaai/jina-embeddings-v2-base-code");
        assert_eq!(config.embedding.dimensions, DEFAULT_EMBEDDING_MODEL_DIMENSIONS);
    }

    #[test]
    fn test_configuration_source_loading() {
        use crate::source::{ConfigurationLoader, EnvironmentSource};

        let loader = ConfigurationLoader::new().add_source(Box::new(EnvironmentSource));

        let config_result = loader.load();
        assert!(config_result.is_ok());

        if let Ok(config) = config_result {
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_telemetry_defaults() {
        let config = ApplicationConfig::from_env();

        // Uses safe defaults for telemetry
        assert!(
            (config.telemetry.trace_sample_rate - DEFAULT_TRACE_SAMPLE_RATE).abs() < f64::EPSILON
        );
        assert_eq!(config.telemetry.tracing_level, DEFAULT_TRACING_LEVEL);
        assert_eq!(
            config.telemetry.service_name,
            DEFAULT_TELEMETRY_SERVICE_NAME
        );
    }

    #[test]
    fn test_configuration_serialization_roundtrip() {
        // Test TOML serialization/deserialization without file I/O
        let original_config = ApplicationConfig::from_env();

        let toml_result = toml::to_string(&original_config);
        assert!(toml_result.is_ok());

        if let Ok(toml_string) = toml_result {
            let parsed_result: Result<ApplicationConfig, _> = toml::from_str(&toml_string);
            assert!(parsed_result.is_ok());

            if let Ok(parsed_config) = parsed_result {
                assert_eq!(original_config.embedding.model_id, parsed_config.embedding.model_id);
                assert_eq!(original_config.api.port, parsed_config.api.port);
                assert!(parsed_config.validate().is_ok());
            }
        }
    }
}
