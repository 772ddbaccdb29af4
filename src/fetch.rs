use std::process::Command;

use serde::Deserialize;

use crate::config::SnowducksConfig;
use crate::error::SnowducksError;

/// Default row limit passed to the CLI when the caller gives none.
pub const DEFAULT_ROW_LIMIT: i64 = 1000;

/// How many trailing output characters to include in error messages.
const ERROR_TAIL_LEN: usize = 400;

/// A single cache-population request handed to the CLI.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub query: String,
    pub limit: i64,
    pub force_refresh: bool,
}

impl FetchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_ROW_LIMIT,
            force_refresh: false,
        }
    }
}

/// The JSON result object the CLI prints as its final stdout line.
///
/// On success: `{"success": true, "table_name": "t_..", "cache_status":
/// "hit"|"miss"}`. On failure: `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CliOutcome {
    pub success: bool,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub cache_status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Invokes `<python> -m snowducks.cli query ...` to populate the cache.
///
/// The query travels as a single argv element — no shell, no temp script,
/// no quote escaping. The CLI owns all Snowflake/Parquet/catalog work; this
/// side only launches it and reads its verdict.
#[derive(Debug, Clone)]
pub struct FetchClient {
    python: String,
}

impl FetchClient {
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SnowducksConfig) -> Self {
        Self::new(config.python.clone())
    }

    /// Run the CLI synchronously and parse its result object.
    ///
    /// Blocks until the subprocess exits. A non-zero exit with no parseable
    /// result object becomes [`SnowducksError::Fetch`] carrying the output
    /// tail; a parseable `success: false` object carries the CLI's own
    /// error string.
    pub fn fetch(&self, request: &FetchRequest) -> Result<CliOutcome, SnowducksError> {
        let mut command = Command::new(&self.python);
        command
            .arg("-m")
            .arg("snowducks.cli")
            .arg("query")
            .arg("--query")
            .arg(&request.query)
            .arg("--limit")
            .arg(request.limit.to_string());
        if request.force_refresh {
            command.arg("--force-refresh");
        }

        let output = command.output().map_err(|source| SnowducksError::Spawn {
            program: self.python.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_cli_output(&stdout) {
            Ok(outcome) if outcome.success => Ok(outcome),
            Ok(outcome) => Err(SnowducksError::Fetch {
                message: outcome
                    .error
                    .unwrap_or_else(|| "CLI reported failure without detail".to_string()),
            }),
            Err(_) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(SnowducksError::Fetch {
                    message: format!("CLI exited with {}: {}", output.status, tail(&stderr)),
                })
            }
            Err(parse_err) => Err(parse_err),
        }
    }
}

/// Find and parse the CLI's result in its stdout.
///
/// Two formats are accepted. Scripted entry points print a one-line JSON
/// result object after human progress lines (`Executing query: ...`), so
/// lines are scanned from the end and the last JSON object wins. The
/// `query` subcommand itself prints no JSON at all, only
/// `Cache table: <t_..>` / `Status: <hit|miss>` pairs (or `Error: ...`),
/// which are recognized as a fallback.
pub fn parse_cli_output(stdout: &str) -> Result<CliOutcome, SnowducksError> {
    for line in stdout.lines().rev() {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            continue;
        }
        if let Ok(outcome) = serde_json::from_str::<CliOutcome>(trimmed) {
            return Ok(outcome);
        }
    }
    if let Some(outcome) = parse_progress_lines(stdout) {
        return Ok(outcome);
    }
    Err(SnowducksError::CliOutput {
        detail: format!("no result object in output: {}", tail(stdout)),
    })
}

/// Recognize the `query` subcommand's plain-text report.
///
/// `Cache table:` alone is enough for success (the status line is
/// informational); an `Error:` line wins over both and maps to a failed
/// outcome carrying the CLI's message.
fn parse_progress_lines(stdout: &str) -> Option<CliOutcome> {
    let mut table_name = None;
    let mut cache_status = None;
    let mut error = None;
    for line in stdout.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Cache table: ") {
            table_name = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("Status: ") {
            cache_status = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("Error: ") {
            error = Some(rest.trim().to_string());
        }
    }

    if error.is_some() {
        return Some(CliOutcome {
            success: false,
            table_name,
            cache_status,
            error,
        });
    }
    table_name.as_ref()?;
    Some(CliOutcome {
        success: true,
        table_name,
        cache_status,
        error: None,
    })
}

fn tail(text: &str) -> &str {
    let trimmed = text.trim();
    let start = trimmed
        .char_indices()
        .rev()
        .nth(ERROR_TAIL_LEN)
        .map_or(0, |(i, _)| i);
    &trimmed[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn parses_success_object_after_progress_lines() {
        let stdout = "Executing query: select 1\n\
                      Limit: 1000\n\
                      {\"success\": true, \"table_name\": \"t_abc\", \"cache_status\": \"miss\"}\n";
        let outcome = parse_cli_output(stdout).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.table_name.as_deref(), Some("t_abc"));
        assert_eq!(outcome.cache_status.as_deref(), Some("miss"));
    }

    #[test]
    fn parses_failure_object() {
        let stdout = "{\"success\": false, \"error\": \"Missing dependencies: pyarrow\"}";
        let outcome = parse_cli_output(stdout).unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Missing dependencies: pyarrow")
        );
    }

    #[test]
    fn last_json_object_wins() {
        let stdout = "{\"success\": false, \"error\": \"first attempt\"}\n\
                      retrying...\n\
                      {\"success\": true, \"table_name\": \"t_x\"}\n";
        let outcome = parse_cli_output(stdout).unwrap();
        assert!(outcome.success);
    }

    #[test]
    fn plain_text_query_output_is_recognized() {
        // The `query` subcommand prints no JSON, only progress lines.
        let stdout = "Executing query: select 1\n\
                      Limit: 1000\n\
                      Force refresh: False\n\
                      Cache table: t_822ae07d4783158b\n\
                      Status: hit\n";
        let outcome = parse_cli_output(stdout).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.table_name.as_deref(), Some("t_822ae07d4783158b"));
        assert_eq!(outcome.cache_status.as_deref(), Some("hit"));
    }

    #[test]
    fn plain_text_error_line_is_a_failed_outcome() {
        let stdout = "Executing query: select 1\n\
                      Error: 250001: Could not connect to Snowflake backend\n";
        let outcome = parse_cli_output(stdout).unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("250001: Could not connect to Snowflake backend")
        );
    }

    #[test]
    fn json_object_wins_over_progress_lines() {
        let stdout = "Cache table: t_from_text\n\
                      Status: miss\n\
                      {\"success\": true, \"table_name\": \"t_from_json\"}\n";
        let outcome = parse_cli_output(stdout).unwrap();
        assert_eq!(outcome.table_name.as_deref(), Some("t_from_json"));
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        let err = parse_cli_output("Traceback (most recent call last):\n  boom\n").unwrap_err();
        assert!(matches!(err, SnowducksError::CliOutput { .. }));
    }

    #[test]
    fn formatted_json_spanning_lines_is_rejected() {
        // The CLI prints the object on one line; a multi-line object means
        // someone changed the contract and we want a loud parse error.
        let err = parse_cli_output("{\n  \"success\": true\n}\n").unwrap_err();
        assert!(matches!(err, SnowducksError::CliOutput { .. }));
    }

    /// Write an executable stub that ignores its arguments and prints
    /// `body` to stdout.
    fn write_stub(path: &str, body: &str) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "cat <<'JSON'").unwrap();
        writeln!(file, "{body}").unwrap();
        writeln!(file, "JSON").unwrap();
        drop(file);
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn fetch_reads_outcome_from_stub_interpreter() {
        let stub = "/tmp/snowducks_test_stub_ok.sh";
        write_stub(
            stub,
            "{\"success\": true, \"table_name\": \"t_deadbeef\", \"cache_status\": \"hit\"}",
        );
        let client = FetchClient::new(stub);
        let outcome = client.fetch(&FetchRequest::new("select 1")).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.table_name.as_deref(), Some("t_deadbeef"));
        let _ = std::fs::remove_file(stub);
    }

    #[test]
    fn fetch_surfaces_cli_error_string() {
        let stub = "/tmp/snowducks_test_stub_err.sh";
        write_stub(stub, "{\"success\": false, \"error\": \"no warehouse\"}");
        let client = FetchClient::new(stub);
        let err = client.fetch(&FetchRequest::new("select 1")).unwrap_err();
        match err {
            SnowducksError::Fetch { message } => assert_eq!(message, "no warehouse"),
            other => panic!("unexpected error: {other}"),
        }
        let _ = std::fs::remove_file(stub);
    }

    #[test]
    fn missing_interpreter_is_a_spawn_error() {
        let client = FetchClient::new("/nonexistent/python3");
        let err = client.fetch(&FetchRequest::new("select 1")).unwrap_err();
        assert!(matches!(err, SnowducksError::Spawn { .. }));
    }
}
