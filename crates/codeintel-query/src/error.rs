//! Query orchestrator errors.
//!
//! The fallback/error codes a caller sees in a degraded-but-successful
//! response (`embedding_model_ambiguous`, `seed_not_found`, …) are carried
//! as `QueryResponse` metadata string data, not as `Err` variants — those
//! codes never abort the orchestrator, they steer it down a fallback
//! path. `QueryError` is reserved for storage failures that make it
//! impossible to produce any response at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("storage error: {0}")]
    Storage(#[from] codeintel_storage::StorageError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
