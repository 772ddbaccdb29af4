use std::fmt;

use crate::config::ConfigError;

/// Errors raised while resolving a `snowducks_table` call.
///
/// Parameter and configuration faults become bind errors (DuckDB surfaces
/// them as extension exceptions). Fetch and cache-read faults are softer:
/// the table function catches them and emits a single `snowducks_status`
/// row instead, so a transient CLI failure never aborts the host query.
#[derive(Debug)]
pub enum SnowducksError {
    /// The required query parameter was empty.
    EmptyQuery,
    /// The environment is not usable (missing variables, bad values).
    Config(ConfigError),
    /// The CLI ran but reported a failed fetch.
    Fetch { message: String },
    /// The CLI's stdout held no parseable JSON result object.
    CliOutput { detail: String },
    /// The CLI could not be spawned at all.
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// Cached rows could not be read back after a fetch.
    CacheRead { table: String, message: String },
    /// An embedded DuckDB statement failed.
    Duck(duckdb::Error),
}

impl fmt::Display for SnowducksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyQuery => {
                write!(f, "snowducks_table requires a non-empty SQL query parameter")
            }
            Self::Config(source) => write!(f, "{source}"),
            Self::Fetch { message } => {
                write!(f, "failed to fetch data from Snowflake: {message}")
            }
            Self::CliOutput { detail } => {
                write!(f, "could not parse snowducks CLI output: {detail}")
            }
            Self::Spawn { program, source } => {
                write!(f, "could not launch '{program}': {source}")
            }
            Self::CacheRead { table, message } => {
                write!(f, "cached table '{table}' could not be read: {message}")
            }
            Self::Duck(source) => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for SnowducksError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(source) => Some(source),
            Self::Spawn { source, .. } => Some(source),
            Self::Duck(source) => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for SnowducksError {
    fn from(source: ConfigError) -> Self {
        Self::Config(source)
    }
}

impl From<duckdb::Error> for SnowducksError {
    fn from(source: duckdb::Error) -> Self {
        Self::Duck(source)
    }
}
