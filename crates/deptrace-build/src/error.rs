//! Error types for deptrace-build

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while planning or running a build.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Target name outside the closed set
    #[error("unknown target `{name}`; expected one of: {valid}")]
    UnknownTarget { name: String, valid: String },

    /// The declared target dependencies form a cycle
    #[error("dependency cycle between targets: {targets:?}")]
    DependencyCycle { targets: Vec<String> },

    /// External command could not be started
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External command exited non-zero
    #[error("`{command}` failed with {}", .code.map(|c| format!("exit code {c}")).unwrap_or_else(|| "a signal".to_string()))]
    CommandFailed { command: String, code: Option<i32> },

    /// Toolchain finished but an expected output is missing
    #[error("{target} build did not produce {}", .path.display())]
    MissingArtifact { target: String, path: PathBuf },

    /// IO error
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Patch, transplant or config error
    #[error(transparent)]
    Core(#[from] deptrace_core::DeptraceError),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for build operations
pub type Result<T> = std::result::Result<T, BuildError>;
