//! `QueryRequest` and the query-embedding wire format.

use base64::Engine;
use codeintel_config::RetrievalProfile;

/// A parsed, not-yet-validated caller-supplied embedding vector.
#[derive(Debug, Clone)]
pub struct QueryEmbeddingInput {
    pub base64: String,
    pub dims: Option<usize>,
    pub model: Option<String>,
}

/// Input to the query orchestrator.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub repository: String,
    pub branch: Option<String>,
    pub language: Option<String>,
    pub max_results: usize,
    pub profile_override: Option<RetrievalProfile>,
    pub query_embedding: Option<QueryEmbeddingInput>,
}

impl QueryRequest {
    #[must_use]
    pub fn branch_or_default(&self) -> &str {
        self.branch.as_deref().unwrap_or("main")
    }
}

/// A decoded, dimension-checked query embedding.
#[derive(Debug, Clone)]
pub struct DecodedQueryEmbedding {
    pub vector: Vec<f32>,
    pub model: Option<String>,
}

/// The two ways a query embedding can fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEmbeddingError {
    InvalidQueryEmbedding,
    InvalidQueryEmbeddingDims,
}

impl QueryEmbeddingError {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidQueryEmbedding => "invalid_query_embedding",
            Self::InvalidQueryEmbeddingDims => "invalid_query_embedding_dims",
        }
    }
}

/// Decodes and validates a caller-supplied query embedding: base64 of
/// little-endian `f32`s, byte length a multiple of 4, `dims` (if given)
/// must equal `len(bytes)/4`, and `0 < dims <= 4096`.
pub fn decode_query_embedding(
    input: &QueryEmbeddingInput,
) -> Result<DecodedQueryEmbedding, QueryEmbeddingError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(input.base64.as_bytes())
        .map_err(|_| QueryEmbeddingError::InvalidQueryEmbedding)?;

    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(QueryEmbeddingError::InvalidQueryEmbedding);
    }

    let dims = bytes.len() / 4;
    if dims == 0 || dims > 4096 {
        return Err(QueryEmbeddingError::InvalidQueryEmbeddingDims);
    }
    if let Some(declared) = input.dims {
        if declared != dims {
            return Err(QueryEmbeddingError::InvalidQueryEmbeddingDims);
        }
    }

    let vector = bytes
        .chunks_exact(4)
        .map(|c| {
            #[allow(clippy::unwrap_used)]
            f32::from_le_bytes(c.try_into().unwrap())
        })
        .collect();

    Ok(DecodedQueryEmbedding {
        vector,
        model: input.model.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(values: &[f32]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn round_trips_a_valid_vector() {
        let input = QueryEmbeddingInput {
            base64: encode(&[1.0, 2.0, 3.0]),
            dims: Some(3),
            model: Some("Model-A".to_string()),
        };
        let decoded = decode_query_embedding(&input).unwrap();
        assert_eq!(decoded.vector, vec![1.0, 2.0, 3.0]);
        assert_eq!(decoded.model.as_deref(), Some("Model-A"));
    }

    #[test]
    fn rejects_non_multiple_of_four_byte_length() {
        let input = QueryEmbeddingInput {
            base64: base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]),
            dims: None,
            model: None,
        };
        assert_eq!(
            decode_query_embedding(&input).unwrap_err(),
            QueryEmbeddingError::InvalidQueryEmbedding
        );
    }

    #[test]
    fn rejects_mismatched_declared_dims() {
        let input = QueryEmbeddingInput {
            base64: encode(&[1.0, 2.0]),
            dims: Some(3),
            model: None,
        };
        assert_eq!(
            decode_query_embedding(&input).unwrap_err(),
            QueryEmbeddingError::InvalidQueryEmbeddingDims
        );
    }

    #[test]
    fn rejects_invalid_base64() {
        let input = QueryEmbeddingInput {
            base64: "not valid base64!!".to_string(),
            dims: None,
            model: None,
        };
        assert_eq!(
            decode_query_embedding(&input).unwrap_err(),
            QueryEmbeddingError::InvalidQueryEmbedding
        );
    }
}
