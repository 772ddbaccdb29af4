#![no_main]
use libfuzzer_sys::fuzz_target;
use snowducks::key::{cache_table_name, cache_table_name_without_limit, normalize_query};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let once = normalize_query(s);
        assert_eq!(normalize_query(&once), once);

        for key in [cache_table_name(s), cache_table_name_without_limit(s)] {
            assert_eq!(key.len(), 18);
            assert!(key.starts_with("t_"));
            assert!(key[2..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
});
