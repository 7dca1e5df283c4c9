//! Sources of pristine (unpatched) file text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{DeptraceError, Result};

/// Yields the checked-in text of a file, ignoring any local modification.
pub trait PristineSource: Send + Sync {
    /// `file` is relative to `repo`.
    fn read(&self, repo: &Path, file: &Path) -> Result<String>;
}

/// Reads the staged (index) version of a file via `git show :<path>`.
///
/// This is the text `git checkout -- <path>` would restore.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitIndex;

impl PristineSource for GitIndex {
    fn read(&self, repo: &Path, file: &Path) -> Result<String> {
        let object = format!(":{}", file.to_string_lossy().replace('\\', "/"));
        let output = Command::new("git")
            .args(["show", &object])
            .current_dir(repo)
            .output()
            .map_err(|e| DeptraceError::Pristine {
                repo: repo.to_path_buf(),
                file: file.to_path_buf(),
                reason: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeptraceError::Pristine {
                repo: repo.to_path_buf(),
                file: file.to_path_buf(),
                reason: stderr.trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| DeptraceError::Pristine {
            repo: repo.to_path_buf(),
            file: file.to_path_buf(),
            reason: format!("not utf-8: {e}"),
        })
    }
}

/// In-memory pristine texts keyed by repo-relative path (testing only).
#[derive(Debug, Clone, Default)]
pub struct MemoryPristine {
    files: HashMap<PathBuf, String>,
}

impl MemoryPristine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.insert(file.into(), contents.into());
        self
    }
}

impl PristineSource for MemoryPristine {
    fn read(&self, repo: &Path, file: &Path) -> Result<String> {
        self.files
            .get(file)
            .cloned()
            .ok_or_else(|| DeptraceError::Pristine {
                repo: repo.to_path_buf(),
                file: file.to_path_buf(),
                reason: "not tracked".to_string(),
            })
    }
}
