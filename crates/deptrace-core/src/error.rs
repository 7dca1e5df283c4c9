//! Error taxonomy for patching, transplanting and config resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by `deptrace-core`.
#[derive(Debug, Error)]
pub enum DeptraceError {
    /// A patch rule matched nothing, or matched without changing the text.
    ///
    /// The upstream source no longer has the shape the rule was written for.
    #[error("patch `{rule}` had no effect on {}: anchor not found (upstream drift?)", .file.display())]
    PatchDrift { rule: String, file: PathBuf },

    /// A patch rule carries a pattern the regex engine rejects.
    #[error("patch `{rule}` has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    /// The pristine (checked-in) version of a file could not be read.
    #[error("cannot read pristine {} from {}: {reason}", .file.display(), .repo.display())]
    Pristine {
        repo: PathBuf,
        file: PathBuf,
        reason: String,
    },

    /// A transplant source does not exist.
    #[error("transplant source missing: {}", .0.display())]
    MissingSource(PathBuf),

    /// Filesystem error with the path it happened on.
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The runtime configuration is not valid JSON.
    #[error("failed to parse config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The runtime configuration is valid JSON but lacks a required field.
    #[error("invalid config: {field} {reason}")]
    ConfigInvalid { field: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeptraceError {
    /// Attach a path to an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeptraceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, DeptraceError>;
