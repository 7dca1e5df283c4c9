//! Anchored textual patching of upstream source files.
//!
//! A [`PatchSpec`] is one named regex substitution. A [`PatchSet`] is an
//! ordered list of specs for one file. Every set is rendered from the file's
//! pristine (checked-in) text, so re-running a build never double-patches.
//!
//! A spec that leaves the text unchanged is fatal ([`DeptraceError::PatchDrift`]):
//! the anchor it relies on is gone upstream and shipping the file unpatched
//! would produce a silently broken binary.

pub mod pristine;

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::error::{DeptraceError, Result};
pub use pristine::{GitIndex, MemoryPristine, PristineSource};

/// One named, anchored substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSpec {
    /// Stable rule name reported in drift diagnostics, e.g. `inspector.step`.
    pub name: String,
    /// Regex anchor. Every match is substituted.
    pub pattern: String,
    /// Replacement template; `$1`, `${name}` and `$0` refer to captures.
    pub replacement: String,
}

impl PatchSpec {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Apply this spec to `text`. `file` is only used for diagnostics.
    pub fn apply_to(&self, text: &str, file: &Path) -> Result<String> {
        let re = Regex::new(&self.pattern).map_err(|source| DeptraceError::InvalidPattern {
            rule: self.name.clone(),
            source,
        })?;

        let patched = re.replace_all(text, self.replacement.as_str());
        if patched == text {
            return Err(DeptraceError::PatchDrift {
                rule: self.name.clone(),
                file: file.to_path_buf(),
            });
        }

        debug!(rule = %self.name, file = %file.display(), "patch applied");
        Ok(patched.into_owned())
    }
}

/// Ordered specs scoped to one file of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    /// Path relative to the repository root.
    pub file: PathBuf,
    pub specs: Vec<PatchSpec>,
}

impl PatchSet {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            specs: Vec::new(),
        }
    }

    /// Append a spec; it sees the output of every spec added before it.
    pub fn with(mut self, spec: PatchSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Run every spec in order over `pristine`.
    pub fn render(&self, pristine: &str) -> Result<String> {
        let mut text = pristine.to_string();
        for spec in &self.specs {
            text = spec.apply_to(&text, &self.file)?;
        }
        Ok(text)
    }
}

/// A fully rendered file waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPatch {
    /// Absolute destination path.
    pub path: PathBuf,
    pub contents: String,
}

/// Render every set against its pristine text without touching the disk.
///
/// Fails on the first drift, before anything is written.
pub fn stage(
    repo: &Path,
    sets: &[PatchSet],
    pristine: &dyn PristineSource,
) -> Result<Vec<StagedPatch>> {
    sets.iter()
        .map(|set| -> Result<StagedPatch> {
            let original = pristine.read(repo, &set.file)?;
            Ok(StagedPatch {
                path: repo.join(&set.file),
                contents: set.render(&original)?,
            })
        })
        .collect()
}

/// Write staged files. Files already holding the staged contents are left
/// alone so their mtimes (and downstream incremental builds) are preserved.
pub fn commit(staged: &[StagedPatch]) -> Result<()> {
    for patch in staged {
        if let Ok(current) = std::fs::read_to_string(&patch.path) {
            if current == patch.contents {
                debug!(file = %patch.path.display(), "already patched");
                continue;
            }
        }
        std::fs::write(&patch.path, &patch.contents)
            .map_err(|e| DeptraceError::io(&patch.path, e))?;
        info!(file = %patch.path.display(), "patched");
    }
    Ok(())
}

/// Reset every file of `sets` to pristine and apply its specs.
///
/// Nothing is written unless all sets render cleanly.
pub fn apply_sets(repo: &Path, sets: &[PatchSet], pristine: &dyn PristineSource) -> Result<()> {
    let staged = stage(repo, sets, pristine)?;
    commit(&staged)
}

/// Apply one substitution to a file in place.
///
/// Reads the whole file, substitutes every match of `pattern`, and writes the
/// result back. A substitution that changes nothing is a
/// [`DeptraceError::PatchDrift`] and the file is left untouched.
pub fn apply(file: &Path, pattern: &str, replacement: &str) -> Result<()> {
    let text = std::fs::read_to_string(file).map_err(|e| DeptraceError::io(file, e))?;
    let spec = PatchSpec::new(pattern, pattern, replacement);
    let patched = spec.apply_to(&text, file)?;
    std::fs::write(file, patched).map_err(|e| DeptraceError::io(file, e))
}
