#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use snowducks::key::{has_limit_clause, normalize_query, strip_limit};

#[derive(Debug, Arbitrary)]
struct LimitFuzzInput {
    body: String,
    limit: Option<u32>,
    offset: Option<u32>,
}

fuzz_target!(|input: LimitFuzzInput| {
    let mut query = input.body.clone();
    if let Some(limit) = input.limit {
        query.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = input.offset {
            query.push_str(&format!(" OFFSET {offset}"));
        }
    }

    // Must not panic, and the stripped form must itself be limit-free at
    // the tail (stripping twice changes nothing).
    let (stripped, _) = strip_limit(&query);
    let (stripped_again, again) = strip_limit(&stripped);

    if again.is_none() {
        assert_eq!(stripped_again, stripped);
    }
    // Whatever comes back is normalized text.
    assert_eq!(normalize_query(&stripped), stripped);

    if input.limit.is_some() && !input.body.is_empty() && !has_limit_clause(&input.body) {
        // The appended clause must be detected.
        assert!(has_limit_clause(&query) || normalize_query(&input.body).is_empty());
    }
});
