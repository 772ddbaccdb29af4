use sha2::{Digest, Sha256};

/// Length of the hex prefix taken from the SHA-256 digest.
///
/// The Python CLI derives its table names as
/// `hashlib.sha256(normalized).hexdigest()[:16]` — the extension must
/// produce byte-identical keys or cache lookups silently miss.
const KEY_HEX_LEN: usize = 16;

/// Prefix ensuring the table name starts with a letter.
const KEY_PREFIX: &str = "t_";

/// Normalize query text before hashing.
///
/// Collapses every run of whitespace to a single space, trims leading and
/// trailing whitespace, and lowercases the result. Two queries that differ
/// only in formatting normalize to the same string and therefore share a
/// cache entry.
///
/// Normalization is idempotent: `normalize_query(normalize_query(q)) ==
/// normalize_query(q)`.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Strip a trailing `LIMIT n [OFFSET m]` clause from a query.
///
/// Operates on the normalized form. Returns the query without the clause
/// plus the limit value, or the normalized query unchanged when no trailing
/// `LIMIT` is present. Only a clause at the very end of the query is
/// stripped — a `LIMIT` inside a subquery is part of the query's identity.
#[must_use]
pub fn strip_limit(query: &str) -> (String, Option<u32>) {
    let normalized = normalize_query(query);
    let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();

    // Trailing shapes: [.., "limit", n] or [.., "limit", n, "offset", m].
    let tail_at = |keyword_idx: usize| -> Option<u32> {
        if words.get(keyword_idx).copied() != Some("limit") {
            return None;
        }
        words.get(keyword_idx + 1)?.parse().ok()
    };

    if words.len() >= 4 && words[words.len() - 2] == "offset" {
        let keyword_idx = words.len() - 4;
        if words[words.len() - 1].parse::<u32>().is_ok() {
            if let Some(limit) = tail_at(keyword_idx) {
                return (words[..keyword_idx].join(" "), Some(limit));
            }
        }
    }
    if words.len() >= 2 {
        let keyword_idx = words.len() - 2;
        if let Some(limit) = tail_at(keyword_idx) {
            return (words[..keyword_idx].join(" "), Some(limit));
        }
    }
    (normalized, None)
}

/// Whether the query contains a `LIMIT` clause anywhere.
#[must_use]
pub fn has_limit_clause(query: &str) -> bool {
    query.to_lowercase().contains(" limit ")
}

/// Extract the integer following the first ` limit ` occurrence.
///
/// Returns 0 when the query has no `LIMIT` clause or the token after the
/// keyword is not an integer.
#[must_use]
pub fn extract_limit_value(query: &str) -> i32 {
    let lowered = query.to_lowercase();
    let Some(pos) = lowered.find(" limit ") else {
        return 0;
    };
    lowered[pos + " limit ".len()..]
        .split_whitespace()
        .next()
        .and_then(|w| w.parse().ok())
        .unwrap_or(0)
}

/// Derive the cache table name for a query.
///
/// The key is `t_` followed by the first 16 hex characters of the SHA-256
/// digest of the normalized query text. Deterministic and
/// whitespace/case-insensitive.
#[must_use]
pub fn cache_table_name(query: &str) -> String {
    hash_key(&normalize_query(query))
}

/// Derive the cache table name ignoring any trailing `LIMIT` clause.
///
/// Queries that differ only in their trailing `LIMIT`/`OFFSET` share one
/// cache entry; the limit itself is tracked separately by the CLI's
/// metadata table.
#[must_use]
pub fn cache_table_name_without_limit(query: &str) -> String {
    let (without_limit, _) = strip_limit(query);
    hash_key(&without_limit)
}

fn hash_key(normalized: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(normalized.as_bytes());
    let mut key = String::with_capacity(KEY_PREFIX.len() + KEY_HEX_LEN);
    key.push_str(KEY_PREFIX);
    for byte in digest.iter().take(KEY_HEX_LEN / 2) {
        // Writing to a String cannot fail.
        let _ = write!(key, "{byte:02x}");
    }
    key
}
