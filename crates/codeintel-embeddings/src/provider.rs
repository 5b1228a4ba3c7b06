//! `EmbeddingProvider`: the external collaborator boundary for embedding
//! model hosting.
//!
//! The core never hosts a model itself. It calls
//! [`EmbeddingProvider::try_generate_embeddings`] once per claimed batch and
//! reads back a plain data outcome — success, a transient failure worth
//! retrying, or a permanent one — instead of catching an exception.
//! Provider failures are a sum type (`success`/`transient`/`error_code`/
//! `error_message`/`embeddings`), not control flow.

use async_trait::async_trait;

/// One embedding vector produced for a chunk, in request order.
#[derive(Debug, Clone)]
pub struct GeneratedEmbedding {
    pub vector: Vec<f32>,
}

/// The outcome of one `TryGenerateEmbeddings` call.
///
/// `embeddings` is populated, in the same order as the request, only when
/// `success` is true; the worker never inspects it otherwise.
#[derive(Debug, Clone)]
pub struct EmbeddingBatchOutcome {
    pub success: bool,
    pub is_transient: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub embeddings: Vec<GeneratedEmbedding>,
}

impl EmbeddingBatchOutcome {
    #[must_use]
    pub fn success(embeddings: Vec<GeneratedEmbedding>) -> Self {
        Self {
            success: true,
            is_transient: false,
            error_code: None,
            error_message: None,
            embeddings,
        }
    }

    /// A failure worth retrying with backoff: timeouts, rate limits,
    /// connection resets.
    #[must_use]
    pub fn transient(error_code: &str, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            is_transient: true,
            error_code: Some(error_code.to_string()),
            error_message: Some(error_message.into()),
            embeddings: Vec::new(),
        }
    }

    /// A failure the worker should not retry (malformed input, a model
    /// that will never accept this chunk). Still drains through the same
    /// backoff/block bookkeeping as a transient one — the distinction
    /// only changes how `is_transient` reads in `last_error` diagnostics.
    #[must_use]
    pub fn permanent(error_code: &str, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            is_transient: false,
            error_code: Some(error_code.to_string()),
            error_message: Some(error_message.into()),
            embeddings: Vec::new(),
        }
    }
}

/// The boundary the core consumes for embedding generation: model hosting
/// is an external collaborator, and the core consumes an
/// `EmbeddingProvider` with a transient-failure signal.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier this provider produces vectors for. Stamped on
    /// persisted embeddings by the worker, never invented by the core.
    fn model_id(&self) -> &str;

    /// Vector width this provider's model produces.
    fn dimensions(&self) -> usize;

    /// Generate one embedding per input chunk, in order. Never panics or
    /// propagates an error for an expected failure mode — those are
    /// encoded in the returned outcome.
    async fn try_generate_embeddings(&self, chunks: &[String]) -> EmbeddingBatchOutcome;
}
