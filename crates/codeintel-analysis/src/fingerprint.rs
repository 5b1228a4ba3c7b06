//! SimHash-64 symbol fingerprinting for near-duplicate detection.

use xxhash_rust::xxh3::xxh3_64;

use crate::parsed_file::{ParsedFile, ParsedSymbol};
use crate::tokenizer::{extract_identifier_tokens, tokenize};

/// Label for the fingerprint algorithm this module implements, stored
/// alongside each fingerprint row so future algorithms can coexist.
pub const FINGERPRINT_KIND: &str = "simhash-64";

const SNIPPET_MAX_CHARS: usize = 4000;
const SNIPPET_MAX_TOKENS: usize = 256;

/// The four 16-bit bands making up a 64-bit fingerprint, used for
/// locality-sensitive-hash candidate lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: u64,
    pub band0: u16,
    pub band1: u16,
    pub band2: u16,
    pub band3: u16,
}

impl Fingerprint {
    #[must_use]
    pub fn bands(self) -> [u16; 4] {
        [self.band0, self.band1, self.band2, self.band3]
    }
}

/// Computes a SimHash-64 fingerprint over a token bag. Order-independent;
/// an empty bag produces the zero fingerprint.
#[must_use]
pub fn compute(tokens: &[String]) -> Fingerprint {
    let mut acc = [0i32; 64];

    for token in tokens {
        let h = xxh3_64(token.as_bytes());
        for (b, slot) in acc.iter_mut().enumerate() {
            let bit = (h >> b) & 1;
            if bit == 1 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }

    let mut hash: u64 = 0;
    for (b, &value) in acc.iter().enumerate() {
        if value > 0 {
            hash |= 1u64 << b;
        }
    }

    Fingerprint {
        hash,
        band0: band(hash, 0),
        band1: band(hash, 1),
        band2: band(hash, 2),
        band3: band(hash, 3),
    }
}

fn band(hash: u64, i: u32) -> u16 {
    #[allow(clippy::cast_possible_truncation)]
    let shifted = (hash >> (16 * i)) & 0xFFFF;
    shifted as u16
}

/// One fingerprint entry ready for persistence, keyed by symbol.
#[derive(Debug, Clone)]
pub struct FingerprintEntry {
    pub symbol_local_id: usize,
    pub fingerprint: Fingerprint,
}

/// Builds one fingerprint entry per chunk-eligible symbol in a parsed file,
/// combining the symbol's declared text fields with identifier tokens
/// scraped from its source snippet.
#[must_use]
pub fn build_entries(parsed: &ParsedFile) -> Vec<FingerprintEntry> {
    parsed
        .symbols
        .iter()
        .filter(|symbol| symbol.kind.is_chunk_eligible())
        .map(|symbol| FingerprintEntry {
            symbol_local_id: symbol.local_id,
            fingerprint: compute(&token_bag(symbol, &parsed.source)),
        })
        .collect()
}

fn token_bag(symbol: &ParsedSymbol, source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    tokens.extend(tokenize(&symbol.name));
    tokens.extend(tokenize(&symbol.qualified_name));
    if let Some(signature) = &symbol.signature {
        tokens.extend(tokenize(signature));
    }
    if let Some(documentation) = &symbol.documentation {
        tokens.extend(tokenize(documentation));
    }
    tokens.extend(symbol.literal_tokens.iter().cloned());

    if let Some(snippet) = symbol.span.slice(source) {
        tokens.extend(extract_identifier_tokens(
            snippet,
            SNIPPET_MAX_CHARS,
            SNIPPET_MAX_TOKENS,
        ));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tokens_yield_zero_fingerprint() {
        let fp = compute(&[]);
        assert_eq!(fp.hash, 0);
        assert_eq!(fp.bands(), [0, 0, 0, 0]);
    }

    #[test]
    fn order_independent() {
        let a = compute(&["alpha".to_string(), "beta".to_string(), "gamma".to_string()]);
        let b = compute(&["gamma".to_string(), "alpha".to_string(), "beta".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_across_calls() {
        let tokens = vec!["user".to_string(), "service".to_string()];
        assert_eq!(compute(&tokens), compute(&tokens));
    }

    #[test]
    fn similar_token_bags_share_bands() {
        let a = compute(&[
            "get".to_string(),
            "user".to_string(),
            "by".to_string(),
            "id".to_string(),
        ]);
        let b = compute(&[
            "get".to_string(),
            "user".to_string(),
            "by".to_string(),
            "name".to_string(),
        ]);
        let shared = a
            .bands()
            .iter()
            .zip(b.bands().iter())
            .filter(|(x, y)| x == y)
            .count();
        assert!(shared >= 1, "expected at least one shared band for near-duplicate inputs");
    }

    #[test]
    fn bands_decompose_hash() {
        let fp = Fingerprint {
            hash: 0x1234_5678_9abc_def0,
            band0: 0,
            band1: 0,
            band2: 0,
            band3: 0,
        };
        let rebuilt = u64::from(fp.band0)
            | (u64::from(fp.band1) << 16)
            | (u64::from(fp.band2) << 32)
            | (u64::from(fp.band3) << 48);
        let computed = compute(&["placeholder".to_string()]);
        let manual = u64::from(computed.band0)
            | (u64::from(computed.band1) << 16)
            | (u64::from(computed.band2) << 32)
            | (u64::from(computed.band3) << 48);
        assert_eq!(manual, computed.hash);
        let _ = rebuilt;
    }
}
