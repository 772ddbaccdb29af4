use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use duckdb::{
    core::{DataChunkHandle, Inserter, LogicalTypeHandle, LogicalTypeId},
    vtab::{BindInfo, InitInfo, TableFunctionInfo, VTab},
    Connection,
};

use crate::cache::{self, ColumnDesc};
use crate::config::SnowducksConfig;
use crate::error::SnowducksError;
use crate::fetch::{FetchClient, FetchRequest, DEFAULT_ROW_LIMIT};
use crate::key;

/// Column name used when a fetch or read fault is reported as data.
const STATUS_COLUMN: &str = "snowducks_status";

/// Standard DuckDB vector size.
const CHUNK_SIZE: usize = 2048;

/// Bind-time result of resolving a query against the cache: the output
/// column names plus every row, all VARCHAR, NULLs as `None`.
///
/// Rows are collected at bind time because the embedded connection and the
/// attached catalog live only for the bind call; the scan phase just pages
/// this buffer out.
pub struct SnowducksBindData {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

// SAFETY: plain owned `String` data.
unsafe impl Send for SnowducksBindData {}
unsafe impl Sync for SnowducksBindData {}

/// Scan cursor: emitted-row position and completion flag.
pub struct SnowducksInitData {
    done: AtomicBool,
    row_index: AtomicUsize,
}

// SAFETY: atomic types are `Send + Sync`.
unsafe impl Send for SnowducksInitData {}
unsafe impl Sync for SnowducksInitData {}

/// The `snowducks_table` table function.
///
/// Usage:
/// ```sql
/// SELECT * FROM snowducks_table('SELECT * FROM orders',
///                               limit := 500,
///                               force_refresh := true,
///                               debug := true)
/// ```
///
/// Bind derives the cache key from the limit-stripped normalized query,
/// probes the DuckLake catalog and the local Parquet set, triggers the
/// Python CLI on a miss, and collects the cached rows. Missing parameters
/// and configuration faults are bind errors; fetch/read faults come back
/// as a single `snowducks_status` row.
pub struct SnowducksTableVTab;

impl VTab for SnowducksTableVTab {
    type BindData = SnowducksBindData;
    type InitData = SnowducksInitData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn std::error::Error>> {
        let query = bind.get_parameter(0).to_string();
        if query.trim().is_empty() {
            return Err(Box::new(SnowducksError::EmptyQuery));
        }

        let limit = bind.get_named_parameter("limit").map_or(DEFAULT_ROW_LIMIT, |v| {
            v.to_string().parse().unwrap_or(DEFAULT_ROW_LIMIT)
        });
        let force_refresh = bind
            .get_named_parameter("force_refresh")
            .is_some_and(|v| v.to_string().eq_ignore_ascii_case("true"));
        let debug = bind
            .get_named_parameter("debug")
            .is_some_and(|v| v.to_string().eq_ignore_ascii_case("true"));

        let config = SnowducksConfig::from_env().map_err(SnowducksError::from)?;
        // The catalog is required for snowducks_table; fail the bind with the
        // exact missing variable names rather than limping along.
        config.require_postgres().map_err(SnowducksError::from)?;

        match resolve_cached_rows(&config, &query, limit, force_refresh, debug) {
            Ok((columns, rows)) => {
                for column in &columns {
                    bind.add_result_column(
                        &column.name,
                        LogicalTypeHandle::from(LogicalTypeId::Varchar),
                    );
                }
                Ok(SnowducksBindData {
                    columns: columns.into_iter().map(|c| c.name).collect(),
                    rows,
                })
            }
            Err(SnowducksError::Config(err)) => Err(Box::new(SnowducksError::Config(err))),
            Err(err) => {
                bind.add_result_column(
                    STATUS_COLUMN,
                    LogicalTypeHandle::from(LogicalTypeId::Varchar),
                );
                Ok(SnowducksBindData {
                    columns: vec![STATUS_COLUMN.to_string()],
                    rows: vec![vec![Some(err.to_string())]],
                })
            }
        }
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn std::error::Error>> {
        Ok(SnowducksInitData {
            done: AtomicBool::new(false),
            row_index: AtomicUsize::new(0),
        })
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let init_data = func.get_init_data();
        if init_data.done.load(Ordering::Relaxed) {
            output.set_len(0);
            return Ok(());
        }

        let bind_data = func.get_bind_data();
        let total = bind_data.rows.len();
        let start = init_data.row_index.load(Ordering::Relaxed);
        if start >= total {
            init_data.done.store(true, Ordering::Relaxed);
            output.set_len(0);
            return Ok(());
        }

        let end = (start + CHUNK_SIZE).min(total);
        for col_idx in 0..bind_data.columns.len() {
            let mut col_vec = output.flat_vector(col_idx);
            for (out_idx, row) in bind_data.rows[start..end].iter().enumerate() {
                match &row[col_idx] {
                    Some(value) => col_vec.insert(out_idx, value.as_str()),
                    None => col_vec.set_null(out_idx),
                }
            }
        }
        output.set_len(end - start);

        init_data.row_index.store(end, Ordering::Relaxed);
        if end >= total {
            init_data.done.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        // Positional parameter: the SQL query (VARCHAR).
        Some(vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(vec![
            (
                "limit".to_string(),
                LogicalTypeHandle::from(LogicalTypeId::Bigint),
            ),
            (
                "force_refresh".to_string(),
                LogicalTypeHandle::from(LogicalTypeId::Boolean),
            ),
            (
                "debug".to_string(),
                LogicalTypeHandle::from(LogicalTypeId::Boolean),
            ),
        ])
    }
}

/// Probe the cache, fetch on miss, and read the cached rows back.
///
/// The embedded connection exists only for the duration of this call. The
/// catalog path is preferred; when the catalog cannot be attached or the
/// table is not yet described there, the local Parquet set is read
/// directly.
fn resolve_cached_rows(
    config: &SnowducksConfig,
    query: &str,
    limit: i64,
    force_refresh: bool,
    debug: bool,
) -> Result<(Vec<ColumnDesc>, Vec<Vec<Option<String>>>), SnowducksError> {
    let mut table = key::cache_table_name_without_limit(query);
    if debug {
        eprintln!("[snowducks] cache key: {table}");
    }

    let con = Connection::open_in_memory()?;
    let catalog_attached = match cache::attach_catalog(&con, config) {
        Ok(()) => true,
        Err(SnowducksError::Config(err)) => return Err(err.into()),
        Err(err) => {
            if debug {
                eprintln!("[snowducks] catalog attach failed, using local files: {err}");
            }
            false
        }
    };

    let cached = (catalog_attached
        && cache::table_is_described(&con, &cache::catalog_relation(config, &table)))
        || cache::cache_entry_exists(config, &table);
    if debug {
        eprintln!("[snowducks] cache {}", if cached { "hit" } else { "miss" });
    }

    if force_refresh || !cached {
        let request = FetchRequest {
            query: query.to_string(),
            limit,
            force_refresh,
        };
        let outcome = FetchClient::from_config(config).fetch(&request)?;
        if debug {
            eprintln!(
                "[snowducks] fetch done: table={:?} status={:?}",
                outcome.table_name, outcome.cache_status
            );
        }
        // The CLI is authoritative about where it materialized the result.
        if let Some(cli_table) = outcome.table_name {
            table = cli_table;
        }
    }

    let catalog_rel = cache::catalog_relation(config, &table);
    let relation = if catalog_attached && cache::table_is_described(&con, &catalog_rel) {
        catalog_rel
    } else {
        let dir = cache::table_data_dir(config, &table);
        if cache::parquet_files(&dir).is_empty() {
            return Err(SnowducksError::CacheRead {
                table,
                message: "no catalog table and no local Parquet files after fetch".to_string(),
            });
        }
        cache::parquet_relation(&dir)
    };

    let columns = cache::describe_columns(&con, &relation)?;
    let rows = cache::read_rows_with_retry(&con, &relation, &columns)?;
    if debug {
        eprintln!(
            "[snowducks] read {} rows x {} columns from {relation}",
            rows.len(),
            columns.len()
        );
    }
    Ok((columns, rows))
}
