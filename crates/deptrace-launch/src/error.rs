//! Error types for deptrace-launch

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while launching the node
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Config could not be loaded or resolved
    #[error(transparent)]
    Config(#[from] deptrace_core::DeptraceError),

    /// A child process could not be started
    #[error("failed to start {name} ({}): {source}", .program.display())]
    Spawn {
        name: String,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a child process failed
    #[error("failed to wait for {name}: {source}")]
    Wait {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The node exited non-zero
    #[error("node exited with {}", .code.map(|c| format!("exit code {c}")).unwrap_or_else(|| "a signal".to_string()))]
    NodeFailed { code: Option<i32> },
}

/// Result type for launch operations
pub type Result<T> = std::result::Result<T, LaunchError>;
