//! Storage-layer error types
//!
//! One error enum, one `Result` alias, the convention followed by every
//! crate in this workspace.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("branch {repo}/{branch} is already being indexed")]
    IndexInProgress { repo: String, branch: String },

    #[error("constraint violated: {0}")]
    Constraint(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
