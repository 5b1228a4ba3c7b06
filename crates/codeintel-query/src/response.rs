//! The wire response shape and response compaction.

use std::collections::HashMap;

use codeintel_config::ResponseConfig;
use serde::Serialize;
use uuid::Uuid;

/// One ranked hit in a `QueryResponse`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub result_type: String,
    pub repository: String,
    pub branch: String,
    pub file_path: String,
    pub language: String,
    pub symbol_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_kind: Option<String>,
    pub content: String,
    pub start_line: i32,
    pub end_line: i32,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub why: Vec<String>,
}

/// The full response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub intent: String,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    pub execution_time_ms: u64,
    #[serde(flatten)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Metadata keys copied through into the response envelope verbatim. Any
/// other key an internal caller sets on the working metadata map is
/// dropped at shaping time.
const PASSTHROUGH_METADATA_KEYS: &[&str] = &[
    "errorCode",
    "error",
    "fallback",
    "embeddingUsed",
    "embeddingModel",
    "embeddingCandidateCount",
    "profile",
    "repository",
    "branch",
];

/// Caps `why` reasons at 3 per result.
pub fn cap_reasons(results: &mut [SearchResult]) {
    for result in results {
        result.why.truncate(3);
    }
}

/// Shapes a raw, already-ranked result list into the bounded wire
/// response. `metadata` carries whatever the calling profile staged
/// (fallback/errorCode/embedding bookkeeping); only the allow-listed keys
/// survive into the final envelope.
#[must_use]
pub fn shape_response(
    query: String,
    intent: &str,
    mut results: Vec<SearchResult>,
    config: &ResponseConfig,
    mut metadata: HashMap<String, serde_json::Value>,
    execution_time_ms: u64,
) -> QueryResponse {
    cap_reasons(&mut results);

    let total_results = results.len();
    results.truncate(config.max_results);

    allocate_snippet_budget(&mut results, config.max_snippet_chars);

    while serialized_size(&results) > config.max_json_bytes && results.len() > 1 {
        results.pop();
    }
    if let Some(last) = results.last_mut() {
        while serialized_size(std::slice::from_ref(last)) > config.max_json_bytes
            && last.content.len() > 1
        {
            let keep = last.content.len() / 2;
            truncate_at_char_boundary(&mut last.content, keep);
        }
    }

    metadata.retain(|k, _| PASSTHROUGH_METADATA_KEYS.contains(&k.as_str()));

    QueryResponse {
        query,
        intent: intent.to_string(),
        results,
        total_results,
        execution_time_ms,
        metadata,
    }
}

/// Proportional-by-rank snippet budget allocation: higher-ranked
/// (earlier, since `results` is sorted descending by score) results get
/// a larger share of `max_snippet_chars`.
fn allocate_snippet_budget(results: &mut [SearchResult], max_snippet_chars: usize) {
    if results.is_empty() {
        return;
    }
    let weight_sum: f64 = results
        .iter()
        .enumerate()
        .map(|(i, _)| rank_weight(i, results.len()))
        .sum();
    if weight_sum <= 0.0 {
        return;
    }

    let len = results.len();
    for (i, result) in results.iter_mut().enumerate() {
        let share = rank_weight(i, len) / weight_sum;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let slot = (share * max_snippet_chars as f64).round() as usize;
        let slot = slot.max(1);
        if result.content.len() > slot {
            truncate_at_char_boundary(&mut result.content, slot);
        }
    }
}

/// Weight of the result at `rank` (0-based) out of `total`: linearly
/// decreasing so rank 0 gets the largest share.
fn rank_weight(rank: usize, total: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let rank = rank as f64;
    #[allow(clippy::cast_precision_loss)]
    let total = total as f64;
    (total - rank).max(1.0)
}

fn truncate_at_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    s.truncate(boundary);
}

fn serialized_size(results: &[SearchResult]) -> usize {
    serde_json::to_vec(results).map(|v| v.len()).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f32, content: &str) -> SearchResult {
        SearchResult {
            id: Uuid::new_v4(),
            result_type: "symbol".to_string(),
            repository: "r".to_string(),
            branch: "main".to_string(),
            file_path: "f.rs".to_string(),
            language: "rust".to_string(),
            symbol_name: "foo".to_string(),
            qualified: None,
            symbol_kind: None,
            content: content.to_string(),
            start_line: 1,
            end_line: 2,
            score,
            bm25: None,
            vector: None,
            signature: None,
            documentation: None,
            why: vec![
                "match:a".to_string(),
                "match:b".to_string(),
                "match:c".to_string(),
                "match:d".to_string(),
            ],
        }
    }

    fn config() -> ResponseConfig {
        ResponseConfig {
            max_results: 10,
            max_snippet_chars: 1000,
            max_json_bytes: 1_000_000,
        }
    }

    #[test]
    fn truncates_to_max_results() {
        let results = (0..5).map(|i| result(i as f32, "x")).collect();
        let mut cfg = config();
        cfg.max_results = 2;
        let resp = shape_response("q".into(), "search", results, &cfg, HashMap::new(), 1);
        assert_eq!(resp.total_results, 5);
        assert_eq!(resp.results.len(), 2);
    }

    #[test]
    fn caps_reasons_at_three() {
        let results = vec![result(1.0, "x")];
        let resp = shape_response("q".into(), "search", results, &config(), HashMap::new(), 1);
        assert_eq!(resp.results[0].why.len(), 3);
    }

    #[test]
    fn passes_through_only_allowlisted_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("fallback".to_string(), serde_json::json!("hybrid->fast"));
        metadata.insert("internal_scratch".to_string(), serde_json::json!(true));
        let resp = shape_response("q".into(), "search", vec![], &config(), metadata, 1);
        assert!(resp.metadata.contains_key("fallback"));
        assert!(!resp.metadata.contains_key("internal_scratch"));
    }

    #[test]
    fn higher_ranked_results_get_larger_snippet_slots() {
        let long = "x".repeat(2000);
        let results = vec![result(2.0, &long), result(1.0, &long)];
        let mut cfg = config();
        cfg.max_snippet_chars = 300;
        let resp = shape_response("q".into(), "search", results, &cfg, HashMap::new(), 1);
        assert!(resp.results[0].content.len() >= resp.results[1].content.len());
    }

    #[test]
    fn shrinks_to_json_byte_budget() {
        let long = "x".repeat(500);
        let results: Vec<_> = (0..20).map(|i| result(i as f32, &long)).collect();
        let mut cfg = config();
        cfg.max_results = 20;
        cfg.max_snippet_chars = 500 * 20;
        cfg.max_json_bytes = 4000;
        let resp = shape_response("q".into(), "search", results, &cfg, HashMap::new(), 1);
        assert!(serialized_size(&resp.results) <= cfg.max_json_bytes || resp.results.len() == 1);
    }
}
