//! Output formatting: table and JSON.
//!
//! Table uses `tabled`; the JSON formats serialize the original data via
//! serde.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render `data` in the chosen format. `table_fn` builds the table view.
pub fn render<T>(
    format: OutputFormat,
    data: &T,
    table_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(table_fn(data)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
    }
}

/// Rounded table over `rows`, or a placeholder line when there are none.
pub fn render_table<R: Tabled>(rows: &[R], empty: &str) -> String {
    if rows.is_empty() {
        return empty.to_owned();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Cell helpers ─────────────────────────────────────────────────────

/// Epoch seconds as a UTC wall-clock time.
pub fn format_epoch(ts: f64) -> String {
    fieldlink_core::clock::from_epoch_secs(ts)
        .map_or_else(|| ts.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Single-line JSON for a table cell.
pub fn compact_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) if map.is_empty() => "-".into(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Tabled)]
    struct Row {
        name: &'static str,
    }

    #[test]
    fn empty_table_uses_placeholder() {
        assert_eq!(render_table::<Row>(&[], "(none)"), "(none)");
        assert!(render_table(&[Row { name: "aruco" }], "(none)").contains("aruco"));
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render(OutputFormat::JsonCompact, &json!({"a": [1, 2]}), |_| String::new())
            .unwrap();
        assert_eq!(out, r#"{"a":[1,2]}"#);
    }

    #[test]
    fn epoch_formatting() {
        assert_eq!(format_epoch(1_700_000_000.0), "2023-11-14 22:13:20");
        assert_eq!(compact_cell(&json!({})), "-");
        assert_eq!(compact_cell(&json!({"id": 7})), r#"{"id":7}"#);
    }
}
