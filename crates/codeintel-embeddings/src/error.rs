//! Error type for unexpected faults inside an `EmbeddingProvider`
//! implementation itself (building a client, malformed response payloads).
//!
//! Expected provider failures — the network call failed, the model
//! rejected the input, the request timed out — are never represented as
//! this type. They travel as `EmbeddingBatchOutcome`'s
//! success/transient/error_code/error_message sum type, because the
//! embedding job worker treats them as data, not exceptions.

use thiserror::Error;

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("provider configuration error: {0}")]
    Config(String),

    #[error("provider response could not be decoded: {0}")]
    Decode(String),
}
