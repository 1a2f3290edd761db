//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use fieldlink_config::ConfigError;
use fieldlink_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const INPUT: i32 = 4;
    pub const IO: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("Line {line}: {reason}")]
    #[diagnostic(
        code(fieldlink::envelope),
        help(
            "Each line must be a JSON object like\n\
             {{\"route\": \"targets\", \"body\": {{\"target_type\": ..., \"image_b64\": ...}}}}"
        )
    )]
    Envelope { line: usize, reason: String },

    #[error("Line {line}: {source}")]
    #[diagnostic(code(fieldlink::rejected))]
    Rejected {
        line: usize,
        #[source]
        source: CoreError,
    },

    // ── Station ──────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(fieldlink::station))]
    Station(#[from] CoreError),

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(fieldlink::config),
        help("Inspect the resolved configuration with: fieldlink config show")
    )]
    Config(#[from] ConfigError),

    #[error("Config file already exists at {}", path.display())]
    #[diagnostic(
        code(fieldlink::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: PathBuf },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error("Cannot read {}", path.display())]
    #[diagnostic(code(fieldlink::read_failed))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(fieldlink::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render config: {0}")]
    #[diagnostic(code(fieldlink::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Envelope { .. } | Self::Rejected { .. } => exit_code::INPUT,
            Self::Station(e) if e.is_client_error() => exit_code::INPUT,
            Self::Config(ConfigError::Validation { .. }) | Self::ConfigExists { .. } => {
                exit_code::USAGE
            }
            Self::Config(ConfigError::Io(_)) | Self::Read { .. } | Self::Io(_) => exit_code::IO,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the envelope line number to a failure from the station.
    pub fn at_line(line: usize, err: CoreError) -> Self {
        if err.is_client_error() {
            Self::Rejected { line, source: err }
        } else {
            Self::Station(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_failures_exit_with_input_code() {
        let err = CliError::at_line(3, CoreError::EmptySubmission);
        assert_eq!(err.exit_code(), exit_code::INPUT);
        assert_eq!(err.to_string(), "Line 3: No detections found in submission");
    }

    #[test]
    fn storage_failures_are_general() {
        let err = CliError::at_line(
            1,
            CoreError::Storage {
                message: "disk full".into(),
            },
        );
        assert!(matches!(err, CliError::Station(_)));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn config_errors_map_by_kind() {
        let invalid = CliError::Config(ConfigError::Validation {
            field: "tracker.max_items".into(),
            reason: "must be at least 1".into(),
        });
        assert_eq!(invalid.exit_code(), exit_code::USAGE);

        let io = CliError::Config(ConfigError::Io(std::io::Error::other("denied")));
        assert_eq!(io.exit_code(), exit_code::IO);
    }
}
