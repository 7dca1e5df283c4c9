//! Mirror a file or directory tree into a foreign repository.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::{DeptraceError, Result};

/// Replace `destination` with an exact copy of `source`.
///
/// Whatever was at `destination` before (file or tree) is removed first, so no
/// stale files from a differently shaped earlier copy survive.
pub fn transplant(source: &Path, destination: &Path) -> Result<()> {
    if !source.exists() {
        return Err(DeptraceError::MissingSource(source.to_path_buf()));
    }

    remove_path(destination)?;

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DeptraceError::io(parent, e))?;
    }

    if source.is_dir() {
        copy_tree(source, destination)?;
    } else {
        std::fs::copy(source, destination).map_err(|e| DeptraceError::io(destination, e))?;
    }

    debug!(
        source = %source.display(),
        destination = %destination.display(),
        "transplanted"
    );
    Ok(())
}

/// Remove a file or directory tree; absence is not an error.
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(DeptraceError::io(path, e)),
    };

    let removed = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DeptraceError::io(path, e)),
    }
}

fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    std::fs::create_dir_all(destination).map_err(|e| DeptraceError::io(destination, e))?;

    for entry in std::fs::read_dir(source).map_err(|e| DeptraceError::io(source, e))? {
        let entry = entry.map_err(|e| DeptraceError::io(source, e))?;
        let from = entry.path();
        let to = destination.join(entry.file_name());
        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| DeptraceError::io(&to, e))?;
        }
    }
    Ok(())
}
