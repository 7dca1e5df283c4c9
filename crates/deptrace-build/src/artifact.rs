//! Final build outputs and their place in the unified output directory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{BuildError, Result};
use crate::target::BuildTarget;

pub const NODE_BINARY: &str = "geth";
pub const DEFAULT_CONFIG: &str = "conf.json";
pub const LAUNCHER: &str = "run.py";
pub const WEBVIEW: &str = "webview";
pub const LIB_ARCHIVE: &str = "libdep.a";
pub const LIB_HEADER: &str = "libdep.h";
pub const TOOLCHAIN_BINARY: &str = "cast-dep";

/// What an artifact is.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Executable,
    Config,
    Launcher,
    StaticArchive,
    Header,
    /// A directory tree (the companion server sources).
    Tree,
}

impl ArtifactKind {
    fn is_executable(&self) -> bool {
        matches!(self, ArtifactKind::Executable | ArtifactKind::Launcher)
    }
}

/// A published file in the unified output directory.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    /// SHA-256 of the published file; `None` for trees.
    pub sha256: Option<String>,
}

/// Copy a finished build output into `out_dir` under `name`.
///
/// A stale copy at the destination is removed first. Executables and the
/// launcher get mode `0755`.
pub fn publish(
    target: BuildTarget,
    source: &Path,
    out_dir: &Path,
    name: &str,
    kind: ArtifactKind,
) -> Result<Artifact> {
    if !source.exists() {
        return Err(BuildError::MissingArtifact {
            target: target.name().to_string(),
            path: source.to_path_buf(),
        });
    }

    let destination = out_dir.join(name);
    deptrace_core::transplant(source, &destination)?;

    let sha256 = if kind == ArtifactKind::Tree {
        None
    } else {
        if kind.is_executable() {
            mark_executable(&destination)?;
        }
        Some(file_digest(&destination)?)
    };

    info!(
        target = %target,
        artifact = %destination.display(),
        sha256 = sha256.as_deref().unwrap_or("-"),
        "published"
    );

    Ok(Artifact {
        kind,
        path: destination,
        sha256,
    })
}

/// Compute the SHA-256 of a file.
pub fn file_digest(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|e| BuildError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|e| BuildError::io(path, e))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(|e| BuildError::io(path, e))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_publish_replaces_stale_copy() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join(LIB_ARCHIVE), "stale").unwrap();

        let src = dir.path().join("libdep.a");
        std::fs::write(&src, "fresh").unwrap();

        let artifact = publish(
            BuildTarget::Lib,
            &src,
            &out,
            LIB_ARCHIVE,
            ArtifactKind::StaticArchive,
        )
        .unwrap();

        assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), "fresh");
        assert_eq!(artifact.sha256.as_deref().map(str::len), Some(64));
    }

    #[test]
    fn test_publish_missing_source() {
        let dir = tempdir().unwrap();
        let err = publish(
            BuildTarget::Node,
            &dir.path().join("build/bin/geth"),
            dir.path(),
            NODE_BINARY,
            ArtifactKind::Executable,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::MissingArtifact { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_launcher_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let src = dir.path().join("geth_run.py");
        std::fs::write(&src, "#!/usr/bin/python3\n").unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let artifact =
            publish(BuildTarget::Node, &src, &out, LAUNCHER, ArtifactKind::Launcher).unwrap();
        let mode = std::fs::metadata(&artifact.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a");
        std::fs::write(&file, "abc").unwrap();
        assert_eq!(
            file_digest(&file).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
