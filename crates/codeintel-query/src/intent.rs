//! Query intent detection.
//!
//! Detection only shapes `QueryResponse.intent` and routes `similar:<id>`
//! queries to the fingerprint-candidate path; it never changes which
//! retrieval profile runs for the remaining intents.

/// The detected purpose of a query, echoed back on `QueryResponse.intent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Similar,
    Search,
    Navigation,
    Relations,
    Documentation,
    Examples,
}

impl Intent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Similar => "similar",
            Self::Search => "search",
            Self::Navigation => "navigation",
            Self::Relations => "relations",
            Self::Documentation => "documentation",
            Self::Examples => "examples",
        }
    }
}

const NAVIGATION_KEYWORDS: &[&str] = &["go to", "definition", "declare", "implement"];
const RELATIONS_KEYWORDS: &[&str] = &["who calls", "references", "uses", "depends"];
const DOCUMENTATION_KEYWORDS: &[&str] = &["doc", "docs", "explain", "what does"];
const EXAMPLES_KEYWORDS: &[&str] = &["example", "usage", "how to use"];
const SEARCH_KEYWORDS: &[&str] = &["find", "where", "locate", "search"];

/// Detects intent from the raw query text. `similar:<id>` is checked
/// first since it is a structural prefix, not a keyword match.
#[must_use]
pub fn detect(query: &str) -> Intent {
    if query.trim_start().starts_with("similar:") {
        return Intent::Similar;
    }

    let lower = query.to_lowercase();
    if contains_any(&lower, SEARCH_KEYWORDS) {
        return Intent::Search;
    }
    if contains_any(&lower, NAVIGATION_KEYWORDS) {
        return Intent::Navigation;
    }
    if contains_any(&lower, RELATIONS_KEYWORDS) {
        return Intent::Relations;
    }
    if contains_any(&lower, DOCUMENTATION_KEYWORDS) {
        return Intent::Documentation;
    }
    if contains_any(&lower, EXAMPLES_KEYWORDS) {
        return Intent::Examples;
    }
    Intent::Search
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Extracts the seed symbol id (as text) and optional post-`:` filter from a
/// `similar:<symbolId>[:filter text]` query.
#[must_use]
pub fn parse_similar_query(query: &str) -> Option<(&str, Option<&str>)> {
    let rest = query.trim_start().strip_prefix("similar:")?;
    let rest = rest.trim_start();
    match rest.split_once(':') {
        Some((id, filter)) => {
            let filter = filter.trim();
            Some((id.trim(), if filter.is_empty() { None } else { Some(filter) }))
        }
        None => Some((rest.trim(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similar_prefix_wins_over_keywords() {
        assert_eq!(detect("similar: find this thing"), Intent::Similar);
    }

    #[test]
    fn keyword_groups_detect_expected_intents() {
        assert_eq!(detect("go to definition of Foo"), Intent::Navigation);
        assert_eq!(detect("who calls Bar"), Intent::Relations);
        assert_eq!(detect("explain this function"), Intent::Documentation);
        assert_eq!(detect("show me an example"), Intent::Examples);
        assert_eq!(detect("find the parser"), Intent::Search);
    }

    #[test]
    fn search_keywords_take_precedence_over_other_groups() {
        // Contains both a Search keyword ("find", "where") and a Navigation
        // keyword ("declare"); Search wins per the spec's bullet order.
        assert_eq!(detect("find where Foo is declared"), Intent::Search);
    }

    #[test]
    fn unmatched_query_defaults_to_search() {
        assert_eq!(detect("frobnicate the widget"), Intent::Search);
    }

    #[test]
    fn parses_seed_id_and_filter() {
        let (id, filter) = parse_similar_query("similar:abc-123:auth handler").unwrap();
        assert_eq!(id, "abc-123");
        assert_eq!(filter, Some("auth handler"));
    }

    #[test]
    fn parses_seed_id_without_filter() {
        let (id, filter) = parse_similar_query("similar:abc-123").unwrap();
        assert_eq!(id, "abc-123");
        assert_eq!(filter, None);
    }
}
