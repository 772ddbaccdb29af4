use std::fmt;
use std::path::PathBuf;

/// Default interpreter used to launch the SnowDucks CLI.
const DEFAULT_PYTHON: &str = "python3";

/// Default schema under which the CLI materializes cached tables.
const DEFAULT_SCHEMA: &str = "main";

/// Postgres connection parameters for the DuckLake metadata catalog.
///
/// The catalog itself is created and maintained by the Python CLI; the
/// extension only needs enough to ATTACH it read-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl PgConfig {
    /// Render the DuckLake ATTACH target string.
    ///
    /// Mirrors the CLI's attach string so both sides land in the same
    /// catalog: `ducklake:postgres:dbname=.. host=.. port=.. user=..
    /// password=..`.
    #[must_use]
    pub fn attach_string(&self) -> String {
        format!(
            "ducklake:postgres:dbname={} host={} port={} user={} password={}",
            self.database, self.host, self.port, self.user, self.password
        )
    }
}

/// Extension configuration, read from the environment at bind time.
#[derive(Debug, Clone)]
pub struct SnowducksConfig {
    /// Root of the DuckLake data directory holding Parquet file sets.
    pub data_path: PathBuf,
    /// Schema the CLI writes cached tables into.
    pub schema: String,
    /// Interpreter used to invoke `-m snowducks.cli`.
    pub python: String,
    /// Postgres catalog parameters, when fully configured.
    pub postgres: Option<PgConfig>,
    /// Names of the absent `PG_*` variables when `postgres` is `None`.
    missing_pg: Vec<String>,
}

/// Configuration failures, surfaced as bind errors.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither `DUCKLAKE_DATA_PATH` nor `HOME` is set, so no cache
    /// directory can be derived.
    NoDataPath,
    /// `PG_PORT` is set but not a valid port number.
    InvalidPort { value: String },
    /// The Postgres group is required but variables are absent.
    MissingPostgres { missing: Vec<String> },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDataPath => {
                write!(
                    f,
                    "cannot locate the DuckLake data directory: set DUCKLAKE_DATA_PATH or HOME"
                )
            }
            Self::InvalidPort { value } => {
                write!(f, "PG_PORT is not a valid port number: '{value}'")
            }
            Self::MissingPostgres { missing } => {
                write!(
                    f,
                    "missing required environment variables: {}",
                    missing.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl SnowducksConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// `DUCKLAKE_DATA_PATH` overrides the `$HOME/.snowducks/data` default.
    /// The Postgres group is `Some` only when `PG_HOST`, `PG_DB`, `PG_USER`
    /// and `PG_PASS` are all present; `PG_PORT` defaults to 5432.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_path = match lookup("DUCKLAKE_DATA_PATH") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = lookup("HOME").ok_or(ConfigError::NoDataPath)?;
                PathBuf::from(home).join(".snowducks").join("data")
            }
        };

        let schema = lookup("DUCKLAKE_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        let python = lookup("SNOWDUCKS_PYTHON").unwrap_or_else(|| DEFAULT_PYTHON.to_string());

        let port = match lookup("PG_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value: raw })?,
            None => 5432,
        };

        let mut missing = Vec::new();
        let mut require = |key: &str| -> String {
            match lookup(key) {
                Some(v) => v,
                None => {
                    missing.push(key.to_string());
                    String::new()
                }
            }
        };
        let host = require("PG_HOST");
        let database = require("PG_DB");
        let user = require("PG_USER");
        let password = require("PG_PASS");

        let postgres = if missing.is_empty() {
            Some(PgConfig {
                host,
                port,
                database,
                user,
                password,
            })
        } else {
            None
        };

        Ok(Self {
            data_path,
            schema,
            python,
            postgres,
            missing_pg: missing,
        })
    }

    /// Return the Postgres group, or the error naming what is missing.
    ///
    /// Callers that need the DuckLake catalog (the table function) use this
    /// so that an unconfigured environment fails with a message listing the
    /// exact absent variables.
    pub fn require_postgres(&self) -> Result<&PgConfig, ConfigError> {
        self.postgres
            .as_ref()
            .ok_or_else(|| ConfigError::MissingPostgres {
                missing: self.missing_pg.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn data_path_defaults_under_home() {
        let config = SnowducksConfig::from_lookup(lookup_from(&[("HOME", "/home/duck")])).unwrap();
        assert_eq!(config.data_path, PathBuf::from("/home/duck/.snowducks/data"));
        assert_eq!(config.schema, "main");
        assert_eq!(config.python, "python3");
        assert!(config.postgres.is_none());
    }

    #[test]
    fn data_path_env_override_wins() {
        let config = SnowducksConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/duck"),
            ("DUCKLAKE_DATA_PATH", "/srv/lake"),
        ]))
        .unwrap();
        assert_eq!(config.data_path, PathBuf::from("/srv/lake"));
    }

    #[test]
    fn no_home_and_no_data_path_is_an_error() {
        let err = SnowducksConfig::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::NoDataPath);
    }

    #[test]
    fn full_postgres_group_is_parsed() {
        let config = SnowducksConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/duck"),
            ("PG_HOST", "db.internal"),
            ("PG_PORT", "6432"),
            ("PG_DB", "ducklake"),
            ("PG_USER", "snowducks"),
            ("PG_PASS", "secret"),
        ]))
        .unwrap();
        let pg = config.postgres.expect("postgres group");
        assert_eq!(pg.host, "db.internal");
        assert_eq!(pg.port, 6432);
        assert_eq!(
            pg.attach_string(),
            "ducklake:postgres:dbname=ducklake host=db.internal port=6432 \
             user=snowducks password=secret"
        );
    }

    #[test]
    fn partial_postgres_group_is_absent() {
        let config = SnowducksConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/duck"),
            ("PG_HOST", "db.internal"),
        ]))
        .unwrap();
        assert!(config.postgres.is_none());
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = SnowducksConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/duck"),
            ("PG_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidPort {
                value: "not-a-port".to_string()
            }
        );
    }

    #[test]
    fn missing_postgres_error_names_variables() {
        let err = ConfigError::MissingPostgres {
            missing: vec!["PG_HOST".to_string(), "PG_PASS".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("PG_HOST"), "unexpected: {msg}");
        assert!(msg.contains("PG_PASS"), "unexpected: {msg}");
    }

    #[test]
    fn require_postgres_lists_absent_variables() {
        let config = SnowducksConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/duck"),
            ("PG_HOST", "db.internal"),
            ("PG_USER", "snowducks"),
        ]))
        .unwrap();
        let err = config.require_postgres().unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingPostgres {
                missing: vec!["PG_DB".to_string(), "PG_PASS".to_string()],
            }
        );
    }

    #[test]
    fn port_defaults_to_5432() {
        let config = SnowducksConfig::from_lookup(lookup_from(&[
            ("HOME", "/home/duck"),
            ("PG_HOST", "h"),
            ("PG_DB", "d"),
            ("PG_USER", "u"),
            ("PG_PASS", "p"),
        ]))
        .unwrap();
        assert_eq!(config.postgres.unwrap().port, 5432);
    }
}
