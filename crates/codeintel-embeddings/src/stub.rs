//! A scripted `EmbeddingProvider` for tests — a narrow in-memory seam, no
//! model loading, no network, no mock framework.
//!
//! By default it returns deterministic vectors derived from chunk text so
//! repeated runs compare equal. Tests that need to exercise the worker's
//! retry/backoff/block transitions can script specific
//! outcomes with [`StubEmbeddingProvider::push_outcome`]; scripted
//! outcomes are consumed FIFO, one per call, before falling back to the
//! deterministic default.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::provider::{EmbeddingBatchOutcome, EmbeddingProvider, GeneratedEmbedding};

pub struct StubEmbeddingProvider {
    model_id: String,
    dimensions: usize,
    scripted: Mutex<VecDeque<EmbeddingBatchOutcome>>,
}

impl StubEmbeddingProvider {
    #[must_use]
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue an outcome to be returned by the next call instead of the
    /// deterministic default. Consumed in FIFO order.
    pub fn push_outcome(&self, outcome: EmbeddingBatchOutcome) {
        self.scripted.lock().unwrap().push_back(outcome);
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn try_generate_embeddings(&self, chunks: &[String]) -> EmbeddingBatchOutcome {
        if let Some(scripted) = self.scripted.lock().unwrap().pop_front() {
            return scripted;
        }

        let embeddings = chunks
            .iter()
            .map(|chunk| GeneratedEmbedding {
                vector: deterministic_vector(chunk, self.dimensions),
            })
            .collect();
        EmbeddingBatchOutcome::success(embeddings)
    }
}

/// Maps text to a fixed-width vector via a SHA-256 digest repeated across
/// `dims` components, scaled to `[-1.0, 1.0)`. Not a real embedding model —
/// only deterministic and content-sensitive, which is all tests need.
fn deterministic_vector(text: &str, dims: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    (0..dims)
        .map(|i| {
            #[allow(clippy::indexing_slicing)]
            let byte = digest[i % digest.len()];
            (f32::from(byte) / 255.0).mul_add(2.0, -1.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_outcome_is_deterministic_and_content_sensitive() {
        let provider = StubEmbeddingProvider::new("stub-model", 8);
        let a = provider
            .try_generate_embeddings(&["fn a() {}".to_string()])
            .await;
        let b = provider
            .try_generate_embeddings(&["fn a() {}".to_string()])
            .await;
        let c = provider
            .try_generate_embeddings(&["fn b() {}".to_string()])
            .await;

        assert!(a.success);
        assert_eq!(a.embeddings[0].vector.len(), 8);
        assert_eq!(a.embeddings[0].vector, b.embeddings[0].vector);
        assert_ne!(a.embeddings[0].vector, c.embeddings[0].vector);
    }

    #[tokio::test]
    async fn scripted_outcome_consumed_once_then_falls_back() {
        let provider = StubEmbeddingProvider::new("stub-model", 4);
        provider.push_outcome(EmbeddingBatchOutcome::transient(
            "provider_timeout",
            "deadline exceeded",
        ));

        let first = provider
            .try_generate_embeddings(&["x".to_string()])
            .await;
        assert!(!first.success);
        assert!(first.is_transient);
        assert_eq!(first.error_code.as_deref(), Some("provider_timeout"));

        let second = provider
            .try_generate_embeddings(&["x".to_string()])
            .await;
        assert!(second.success);
    }
}
