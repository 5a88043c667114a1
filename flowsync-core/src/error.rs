//! Error types for flowsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from local workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The workflow file is not valid JSON or does not match the record shape.
    #[error("failed to parse workflow at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The workflow parsed but failed schema checks.
    #[error("invalid workflow at {path}: {}", problems.join("; "))]
    Invalid { path: PathBuf, problems: Vec<String> },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error in a project or environment config file.
    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A config value is missing or malformed.
    #[error("invalid configuration in {origin}: {field}: {message}")]
    InvalidConfig {
        origin: String,
        field: &'static str,
        message: String,
    },

    /// No config file for the requested environment.
    #[error("configuration not found: {path}\navailable environments: {available}")]
    EnvironmentNotFound { path: PathBuf, available: String },

    /// A deploy/diff target named something that is neither a file nor a category.
    #[error("unknown category '{name}'; expected a .json file or one of: {expected}")]
    UnknownCategory { name: String, expected: String },
}

impl WorkspaceError {
    /// True when the error comes from a malformed or schema-invalid file.
    pub fn is_validation(&self) -> bool {
        matches!(self, WorkspaceError::Parse { .. } | WorkspaceError::Invalid { .. })
    }
}

/// Convenience constructor for [`WorkspaceError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WorkspaceError {
    WorkspaceError::Io {
        path: path.into(),
        source,
    }
}
