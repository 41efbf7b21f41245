//! Configuration error types
//!
//! Every loader in this crate (failure policy, runbooks) returns
//! [`ConfigError`]. Malformed input is rejected at load time and never
//! silently skipped; in-run conditions are carried as data instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Malformed failure-policy or runbook input.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON document did not match the expected shape
    #[error("Invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// YAML document did not match the expected shape
    #[error("Invalid YAML in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// File extension is not one of json/yaml/yml
    #[error("Unsupported file format for {path} (expected .json, .yaml or .yml)")]
    UnsupportedFormat { path: PathBuf },

    /// A failure rule probability outside [0, 1] (or NaN)
    #[error("Failure rule '{rule_id}' has probability {probability}, expected a value in [0, 1]")]
    InvalidProbability { rule_id: String, probability: f64 },

    /// A runbook knowledge entry confidence outside [0, 1] (or NaN)
    #[error("Runbook {role} entry '{error_code}' has confidence {confidence}, expected a value in [0, 1]")]
    InvalidConfidence {
        role: String,
        error_code: String,
        confidence: f32,
    },

    /// A required text field was empty
    #[error("{context}: field '{field}' must not be empty")]
    EmptyField {
        context: String,
        field: &'static str,
    },

    /// Two failure rules share an id
    #[error("Duplicate failure rule id '{0}'")]
    DuplicateRule(String),

    /// A forced failure named a rule the policy does not contain
    #[error("No failure rule with id '{0}'")]
    UnknownRule(String),

    /// Two runbook documents declare the same role
    #[error("Duplicate runbook for role {0}")]
    DuplicateRunbook(String),

    /// Role name did not match any known agent role
    #[error("Unknown agent role '{0}'")]
    UnknownRole(String),

    /// Runbook directory path is not a directory
    #[error("Runbook path {0} is not a directory")]
    NotADirectory(PathBuf),
}

impl ConfigError {
    pub(crate) fn empty(context: impl Into<String>, field: &'static str) -> Self {
        Self::EmptyField {
            context: context.into(),
            field,
        }
    }
}

/// Parse a document by file extension (`.json`, `.yaml`, `.yml`).
pub(crate) fn parse_by_extension<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
    content: &str,
) -> ConfigResult<T> {
    let origin = path.display().to_string();
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            serde_json::from_str(content).map_err(|source| ConfigError::Json { origin, source })
        }
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml { origin, source })
        }
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Read a file into a string, tagging I/O failures with the path.
pub(crate) fn read_file(path: &std::path::Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
