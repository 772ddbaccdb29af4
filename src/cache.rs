use std::path::{Path, PathBuf};
use std::time::Duration;

use duckdb::Connection;

use crate::config::SnowducksConfig;
use crate::error::SnowducksError;

/// Alias the DuckLake catalog is attached under, matching the CLI side.
pub const CATALOG_ALIAS: &str = "snowducks_ducklake";

/// Attempts made when reading rows the external fetch just wrote.
const READ_ATTEMPTS: u32 = 3;

/// Pause between read attempts.
const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// One column of a cached table, as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub column_type: String,
}

/// Directory holding the Parquet file set for one cached table.
#[must_use]
pub fn table_data_dir(config: &SnowducksConfig, table: &str) -> PathBuf {
    config.data_path.join(&config.schema).join(table)
}

/// Parquet files DuckLake wrote for a table, sorted for determinism.
///
/// DuckLake names its data files `ducklake-<uuid>.parquet`; anything else
/// in the directory (hidden files, manifests) is ignored. A missing or
/// unreadable directory is simply an empty set.
#[must_use]
pub fn parquet_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("ducklake-") && name.ends_with(".parquet"))
        })
        .collect();
    files.sort();
    files
}

/// Whether any Parquet data exists locally for the given cache key.
#[must_use]
pub fn cache_entry_exists(config: &SnowducksConfig, table: &str) -> bool {
    !parquet_files(&table_data_dir(config, table)).is_empty()
}

/// `read_parquet` relation over a table's Parquet file set.
#[must_use]
pub fn parquet_relation(dir: &Path) -> String {
    let glob = format!("{}/ducklake-*.parquet", dir.display());
    format!("read_parquet({})", quote_literal(&glob))
}

/// Fully qualified relation for a cached table in the attached catalog.
#[must_use]
pub fn catalog_relation(config: &SnowducksConfig, table: &str) -> String {
    format!(
        "{}.{}.{}",
        quote_ident(CATALOG_ALIAS),
        quote_ident(&config.schema),
        quote_ident(table)
    )
}

/// Attach the Postgres-backed DuckLake catalog to an embedded connection.
///
/// Idempotent via `ATTACH IF NOT EXISTS`. Requires the full `PG_*` group;
/// an incomplete environment surfaces the missing variable names.
pub fn attach_catalog(con: &Connection, config: &SnowducksConfig) -> Result<(), SnowducksError> {
    let pg = config.require_postgres()?;
    let sql = format!(
        "ATTACH IF NOT EXISTS {} AS {} (DATA_PATH {})",
        quote_literal(&pg.attach_string()),
        quote_ident(CATALOG_ALIAS),
        quote_literal(&config.data_path.display().to_string()),
    );
    con.execute_batch(&sql)?;
    Ok(())
}

/// Probe whether a relation resolves, without reading any data.
#[must_use]
pub fn table_is_described(con: &Connection, relation: &str) -> bool {
    con.prepare(&format!("DESCRIBE SELECT * FROM {relation}"))
        .is_ok()
}

/// Column names and types of a relation, via `DESCRIBE`.
pub fn describe_columns(
    con: &Connection,
    relation: &str,
) -> Result<Vec<ColumnDesc>, SnowducksError> {
    let mut stmt = con.prepare(&format!("DESCRIBE SELECT * FROM {relation}"))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnDesc {
                name: row.get(0)?,
                column_type: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Read every row of a relation with all columns cast to VARCHAR.
///
/// NULLs are preserved as `None`. The table function declares an
/// all-VARCHAR output schema, so the cast happens here, inside DuckDB,
/// rather than per-value in Rust.
pub fn read_rows_as_varchar(
    con: &Connection,
    relation: &str,
    columns: &[ColumnDesc],
) -> Result<Vec<Vec<Option<String>>>, SnowducksError> {
    let select_list = columns
        .iter()
        .map(|col| format!("CAST({} AS VARCHAR)", quote_ident(&col.name)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = con.prepare(&format!("SELECT {select_list} FROM {relation}"))?;
    let rows = stmt
        .query_map([], |row| {
            (0..columns.len())
                .map(|i| row.get::<_, Option<String>>(i))
                .collect::<Result<Vec<_>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// [`read_rows_as_varchar`] with a bounded retry.
///
/// The external fetch process commits the catalog row and the Parquet
/// files in separate steps, so a read issued immediately after a fetch can
/// land in the gap. Three attempts, one second apart, covers the window.
pub fn read_rows_with_retry(
    con: &Connection,
    relation: &str,
    columns: &[ColumnDesc],
) -> Result<Vec<Vec<Option<String>>>, SnowducksError> {
    let mut last_err = None;
    for attempt in 0..READ_ATTEMPTS {
        if attempt > 0 {
            std::thread::sleep(READ_RETRY_DELAY);
        }
        match read_rows_as_varchar(con, relation, columns) {
            Ok(rows) => return Ok(rows),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| SnowducksError::CacheRead {
        table: relation.to_string(),
        message: "no read attempts were made".to_string(),
    }))
}

/// Double-quote a SQL identifier, escaping embedded double quotes.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quote a SQL string literal, escaping embedded single quotes.
#[must_use]
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
