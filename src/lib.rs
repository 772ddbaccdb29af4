pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod info;
pub mod key;

/// SQL surface (scalar + table functions) — only compiled when building the
/// `DuckDB` extension. The `sql` module uses `duckdb::vscalar` and
/// `duckdb::vtab`, which are only available when the `extension` feature
/// (and thus `vscalar` + `loadable-extension`) is active. Under
/// `cargo test` (default `bundled` feature), this module is excluded.
#[cfg(feature = "extension")]
pub mod sql;

/// Extension entry point — called by `DuckDB` when the extension is loaded.
///
/// Registers the key-derivation scalar functions and the `snowducks_table`
/// table function on the connection. All cache and subprocess state is
/// resolved per bind call from the environment, so nothing is shared
/// across queries and no background threads are needed.
///
/// # Safety
///
/// This function is called by `DuckDB` across an FFI boundary. The `con`
/// parameter is provided by `DuckDB` and is guaranteed to be a valid
/// connection handle for the duration of the call. The
/// `#[duckdb_entrypoint_c_api]` macro handles the unsafe C FFI bridging
/// and panic-catching automatically.
#[cfg(feature = "extension")]
mod extension {
    use duckdb::{duckdb_entrypoint_c_api, Connection, Result};
    use std::error::Error;

    use crate::sql::{
        scalars::{
            CacheTableName, CacheTableNameWithoutLimit, ExtractLimitValue, HasLimitClause, Info,
            NormalizeQuery,
        },
        table::SnowducksTableVTab,
    };

    #[allow(clippy::unnecessary_wraps)]
    #[allow(clippy::needless_pass_by_value)]
    #[duckdb_entrypoint_c_api()]
    pub unsafe fn extension_entrypoint(con: Connection) -> Result<(), Box<dyn Error>> {
        con.register_scalar_function::<NormalizeQuery>("snowducks_normalize_query")?;
        // Historical alias kept for scripts written against the first release.
        con.register_scalar_function::<NormalizeQuery>("snowducks_normalize_query_text")?;

        con.register_scalar_function::<CacheTableName>("snowducks_cache_table_name")?;
        con.register_scalar_function::<CacheTableName>("snowducks_generate_cache_table_name")?;
        con.register_scalar_function::<CacheTableNameWithoutLimit>(
            "snowducks_generate_cache_table_name_without_limit",
        )?;

        con.register_scalar_function::<HasLimitClause>("snowducks_has_limit_clause")?;
        con.register_scalar_function::<ExtractLimitValue>("snowducks_extract_limit_value")?;
        con.register_scalar_function::<Info>("snowducks_info")?;

        con.register_table_function::<SnowducksTableVTab>("snowducks_table")?;

        Ok(())
    }
}
