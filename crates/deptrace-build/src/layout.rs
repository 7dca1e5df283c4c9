//! Filesystem layout of a deptrace checkout.
//!
//! Every path the pipeline reads or writes is derived here from one root, so
//! no step depends on the process working directory.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Locations of the tracer sources, the upstream checkouts and the output
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub root: PathBuf,
    /// Tracer sources: `dep.go`, `dep_tracer/`, `libdep.go`, `extra/`.
    pub tracer_dir: PathBuf,
    /// go-ethereum checkout.
    pub node_repo: PathBuf,
    /// foundry checkout.
    pub toolchain_repo: PathBuf,
    /// The `tracevm` crate, wired into foundry's workspace as a path dependency.
    pub tracevm_dir: PathBuf,
    /// Unified output directory.
    pub out_dir: PathBuf,
    pub default_config: PathBuf,
    pub launcher_script: PathBuf,
    /// Companion inspection server sources.
    pub webview_dir: PathBuf,
}

impl Layout {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let tracer_dir = root.join("tracer");
        let toolchain_repo = root.join("foundry");
        Self {
            node_repo: root.join("go-ethereum"),
            tracevm_dir: toolchain_repo.join("tracevm"),
            toolchain_repo,
            out_dir: root.join("build"),
            default_config: root.join("conf.json"),
            launcher_script: tracer_dir.join("extra").join("geth_run.py"),
            webview_dir: root.join("webview"),
            tracer_dir,
            root,
        }
    }

    /// Override the unified output directory.
    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    /// go-ethereum's live tracer directory, where `dep.go` registers itself.
    pub fn node_tracer_dir(&self) -> PathBuf {
        self.node_repo.join("eth").join("tracers").join("live")
    }

    /// Scratch directory for the C archive build before it is published.
    pub fn lib_staging_dir(&self) -> PathBuf {
        self.tracer_dir.join(".deptrace")
    }

    /// Path to `tracevm` as written in foundry's workspace manifest: relative
    /// when the crate lives inside the checkout, absolute otherwise.
    pub fn tracevm_dependency_path(&self) -> String {
        let path = self
            .tracevm_dir
            .strip_prefix(&self.toolchain_repo)
            .unwrap_or(&self.tracevm_dir);
        path.to_string_lossy().replace('\\', "/")
    }

    /// Resolve a path relative to the toolchain checkout.
    pub fn in_toolchain(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.toolchain_repo.join(relative)
    }

    /// Resolve a path relative to the node checkout.
    pub fn in_node(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.node_repo.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_root() {
        let layout = Layout::from_root("/work");
        assert_eq!(layout.tracer_dir, PathBuf::from("/work/tracer"));
        assert_eq!(layout.node_repo, PathBuf::from("/work/go-ethereum"));
        assert_eq!(layout.toolchain_repo, PathBuf::from("/work/foundry"));
        assert_eq!(layout.tracevm_dir, PathBuf::from("/work/foundry/tracevm"));
        assert_eq!(layout.out_dir, PathBuf::from("/work/build"));
        assert_eq!(
            layout.launcher_script,
            PathBuf::from("/work/tracer/extra/geth_run.py")
        );
        assert_eq!(
            layout.node_tracer_dir(),
            PathBuf::from("/work/go-ethereum/eth/tracers/live")
        );
    }

    #[test]
    fn test_tracevm_dependency_path() {
        let mut layout = Layout::from_root("/work");
        assert_eq!(layout.tracevm_dependency_path(), "tracevm");

        layout.tracevm_dir = PathBuf::from("/opt/tracevm");
        assert_eq!(layout.tracevm_dependency_path(), "/opt/tracevm");
    }

    #[test]
    fn test_out_dir_override() {
        let layout = Layout::from_root("/work").with_out_dir("/tmp/out");
        assert_eq!(layout.out_dir, PathBuf::from("/tmp/out"));
        assert_eq!(layout.root, PathBuf::from("/work"));
    }
}
