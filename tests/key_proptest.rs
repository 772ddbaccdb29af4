use proptest::prelude::*;

use snowducks::key::{
    cache_table_name, cache_table_name_without_limit, extract_limit_value, has_limit_clause,
    normalize_query, strip_limit,
};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A plausible SQL word: identifiers, keywords, punctuation-ish tokens.
fn sql_word() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z_][a-zA-Z0-9_]{0,10}",
        Just("SELECT".to_string()),
        Just("FROM".to_string()),
        Just("WHERE".to_string()),
        Just("*".to_string()),
        Just(",".to_string()),
    ]
}

/// A query as a list of words (1..12 tokens).
fn query_words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(sql_word(), 1..12)
}

/// Whitespace runs used to join words.
fn whitespace() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof![Just(' '), Just('\t'), Just('\n')], 1..4)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Join the same words twice with independently drawn whitespace.
fn two_spellings() -> impl Strategy<Value = (String, String)> {
    (query_words(), whitespace(), whitespace()).prop_map(|(words, sep_a, sep_b)| {
        (words.join(&sep_a), words.join(&sep_b))
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Normalization erases whitespace differences entirely.
    #[test]
    fn whitespace_variants_normalize_identically((a, b) in two_spellings()) {
        prop_assert_eq!(normalize_query(&a), normalize_query(&b));
    }

    /// Normalizing twice is the same as normalizing once.
    #[test]
    fn normalization_is_idempotent(query in ".*") {
        let once = normalize_query(&query);
        prop_assert_eq!(normalize_query(&once), once);
    }

    /// Every key is `t_` followed by exactly 16 lowercase hex characters,
    /// for arbitrary input.
    #[test]
    fn key_shape_holds_for_any_input(query in ".*") {
        for key in [cache_table_name(&query), cache_table_name_without_limit(&query)] {
            prop_assert_eq!(key.len(), 18);
            prop_assert!(key.starts_with("t_"));
            prop_assert!(key[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    /// Whitespace variants of the same query share one cache key.
    #[test]
    fn whitespace_variants_share_cache_key((a, b) in two_spellings()) {
        prop_assert_eq!(cache_table_name(&a), cache_table_name(&b));
    }

    /// Appending a trailing LIMIT does not change the limit-insensitive key.
    #[test]
    fn trailing_limit_is_key_invisible(words in query_words(), limit in 1u32..1_000_000) {
        let base = words.join(" ");
        // Only queries that do not already end in a LIMIT clause.
        prop_assume!(strip_limit(&base).1.is_none());
        let with_limit = format!("{base} LIMIT {limit}");
        prop_assert_eq!(
            cache_table_name_without_limit(&base),
            cache_table_name_without_limit(&with_limit)
        );
    }

    /// strip_limit recovers the exact appended limit value.
    #[test]
    fn strip_limit_round_trips(words in query_words(), limit in 1u32..1_000_000) {
        let base = words.join(" ");
        prop_assume!(strip_limit(&base).1.is_none());
        let with_limit = format!("{base} LIMIT {limit}");
        let (stripped, parsed) = strip_limit(&with_limit);
        prop_assert_eq!(parsed, Some(limit));
        prop_assert_eq!(stripped, normalize_query(&base));
    }

    /// has_limit_clause and extract_limit_value agree on appended limits.
    #[test]
    fn limit_detection_agrees(words in query_words(), limit in 1i32..1_000_000) {
        // extract_limit_value reads the first ` limit ` occurrence, so the
        // body must not contain the keyword itself.
        prop_assume!(words.iter().all(|w| !w.eq_ignore_ascii_case("limit")));
        let query = format!("{} LIMIT {limit}", words.join(" "));
        prop_assert!(has_limit_clause(&query));
        prop_assert_eq!(extract_limit_value(&query), limit);
    }
}
