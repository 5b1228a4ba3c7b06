//! The `EmbeddingProvider` boundary.
//!
//! Embedding model hosting is an external collaborator: this crate does
//! not load or run a model. It defines the trait the embedding job worker
//! calls, the batch outcome it reads back, and a scripted stub
//! implementation for tests.

pub mod error;
pub mod provider;
pub mod stub;

pub use error::{EmbeddingError, EmbeddingResult};
pub use provider::{EmbeddingBatchOutcome, EmbeddingProvider, GeneratedEmbedding};
pub use stub::StubEmbeddingProvider;
