//! Runtime configuration for the instrumented node.
//!
//! The config is forwarded to the tracer verbatim as a JSON flag value, so it
//! is kept as a [`serde_json::Value`] (key order preserved) and only the path
//! fields the tracer reads from disk are rewritten:
//!
//! - `kv.root`, when `kv.engine` stores on disk and the root is relative
//! - `output`, when non-empty, relative and not an HTTP endpoint
//!
//! Relative paths are resolved against the config file's directory, never the
//! process working directory.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{DeptraceError, Result};

/// Engines that keep their data in a directory under `kv.root`.
pub const PERSISTENT_ENGINES: &[&str] = &["leveldb"];

/// A config with its path fields resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// The full config object, unrecognized keys included.
    pub value: Value,
    /// On-disk store created by this run, removable once the node exits.
    pub cleanup: Option<PathBuf>,
}

impl ResolvedConfig {
    /// `kv.engine`.
    pub fn engine(&self) -> &str {
        self.value["kv"]["engine"].as_str().unwrap_or_default()
    }

    /// `output`, if present and non-empty.
    pub fn output(&self) -> Option<&str> {
        self.value
            .get("output")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Compact JSON for the node's `--vmtrace.jsonconfig` flag.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.value)?)
    }
}

/// Read and resolve a config file.
pub fn load(path: &Path) -> Result<ResolvedConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| DeptraceError::io(path, e))?;
    let value: Value = serde_json::from_str(&text).map_err(|source| DeptraceError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    // Not canonicalized: a symlinked config resolves against the link's directory
    let absolute = std::path::absolute(path).map_err(|e| DeptraceError::io(path, e))?;
    let base_dir = absolute.parent().unwrap_or_else(|| Path::new("/"));
    resolve(value, base_dir)
}

/// Parse config text (e.g. from stdin), resolving paths against `base_dir`.
pub fn parse(text: &str, base_dir: &Path) -> Result<ResolvedConfig> {
    let value: Value = serde_json::from_str(text).map_err(|source| DeptraceError::ConfigParse {
        path: PathBuf::from("<stdin>"),
        source,
    })?;
    resolve(value, base_dir)
}

/// Validate the required structure and rewrite relative path fields.
pub fn resolve(mut value: Value, base_dir: &Path) -> Result<ResolvedConfig> {
    let root = value.as_object_mut().ok_or_else(|| invalid("config", "must be a JSON object"))?;

    let mut cleanup = None;

    let kv = root
        .get_mut("kv")
        .ok_or_else(|| invalid("kv", "is required"))?
        .as_object_mut()
        .ok_or_else(|| invalid("kv", "must be an object"))?;

    let engine = kv
        .get("engine")
        .ok_or_else(|| invalid("kv.engine", "is required"))?
        .as_str()
        .ok_or_else(|| invalid("kv.engine", "must be a string"))?
        .to_string();

    let kv_root = optional_str(kv.get("root"), "kv.root")?.map(str::to_string);

    if PERSISTENT_ENGINES.contains(&engine.as_str()) {
        let kv_root = kv_root
            .filter(|r| !r.is_empty())
            .ok_or_else(|| invalid("kv.root", &format!("is required for engine `{engine}`")))?;
        if Path::new(&kv_root).is_relative() {
            let resolved = base_dir.join(&kv_root);
            debug!(from = %kv_root, to = %resolved.display(), "resolved kv.root");
            kv.insert(
                "root".to_string(),
                Value::String(resolved.to_string_lossy().into_owned()),
            );
            cleanup = Some(resolved);
        }
    }

    let output = optional_str(root.get("output"), "output")?.map(str::to_string);
    if let Some(output) = output {
        if !output.is_empty() && !is_url(&output) && Path::new(&output).is_relative() {
            let resolved = base_dir.join(&output);
            debug!(from = %output, to = %resolved.display(), "resolved output");
            root.insert(
                "output".to_string(),
                Value::String(resolved.to_string_lossy().into_owned()),
            );
        }
    }

    Ok(ResolvedConfig { value, cleanup })
}

fn optional_str<'a>(value: Option<&'a Value>, field: &str) -> Result<Option<&'a str>> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(invalid(field, "must be a string")),
    }
}

fn is_url(output: &str) -> bool {
    output.starts_with("http://") || output.starts_with("https://")
}

fn invalid(field: &str, reason: &str) -> DeptraceError {
    DeptraceError::ConfigInvalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relative_leveldb_root_joins_config_dir() {
        let resolved = resolve(
            json!({"kv": {"engine": "leveldb", "root": "data/kv"}}),
            Path::new("/etc/deptrace"),
        )
        .unwrap();

        assert_eq!(resolved.value["kv"]["root"], "/etc/deptrace/data/kv");
        assert_eq!(resolved.cleanup, Some(PathBuf::from("/etc/deptrace/data/kv")));
    }

    #[test]
    fn absolute_leveldb_root_is_unchanged() {
        let resolved = resolve(
            json!({"kv": {"engine": "leveldb", "root": "/var/lib/dep"}}),
            Path::new("/etc/deptrace"),
        )
        .unwrap();

        assert_eq!(resolved.value["kv"]["root"], "/var/lib/dep");
        assert_eq!(resolved.cleanup, None);
    }

    #[test]
    fn in_memory_engine_root_is_not_resolved() {
        let resolved = resolve(
            json!({"kv": {"engine": "memory", "root": "relative"}}),
            Path::new("/cfg"),
        )
        .unwrap();
        assert_eq!(resolved.value["kv"]["root"], "relative");
        assert_eq!(resolved.cleanup, None);
    }

    #[test]
    fn leveldb_without_root_is_invalid() {
        let err = resolve(json!({"kv": {"engine": "leveldb"}}), Path::new("/cfg")).unwrap_err();
        assert!(err.to_string().contains("kv.root"));
    }

    #[test]
    fn empty_or_absent_output_stays_put() {
        let empty = resolve(json!({"kv": {"engine": "memory"}, "output": ""}), Path::new("/cfg"))
            .unwrap();
        assert_eq!(empty.value["output"], "");
        assert_eq!(empty.output(), None);

        let absent = resolve(json!({"kv": {"engine": "memory"}}), Path::new("/cfg")).unwrap();
        assert!(absent.value.get("output").is_none());
    }

    #[test]
    fn relative_output_joins_config_dir() {
        let resolved = resolve(
            json!({"kv": {"engine": "memory"}, "output": "trace.log"}),
            Path::new("/cfg"),
        )
        .unwrap();
        assert_eq!(resolved.output(), Some("/cfg/trace.log"));
    }

    #[test]
    fn http_output_is_left_alone() {
        let resolved = resolve(
            json!({"kv": {"engine": "memory"}, "output": "http://0.0.0.0:4334"}),
            Path::new("/cfg"),
        )
        .unwrap();
        assert_eq!(resolved.output(), Some("http://0.0.0.0:4334"));
    }

    #[test]
    fn unknown_keys_pass_through_in_order() {
        let text = r#"{"past_unknown":true,"kv":{"engine":"memory"},"logger":{"sol_view":true},"output":""}"#;
        let resolved = parse(text, Path::new("/cfg")).unwrap();
        assert_eq!(resolved.to_json().unwrap(), text);
    }

    #[test]
    fn missing_kv_is_invalid() {
        let err = resolve(json!({"output": ""}), Path::new("/cfg")).unwrap_err();
        assert!(matches!(err, DeptraceError::ConfigInvalid { ref field, .. } if field == "kv"));
    }

    #[test]
    fn non_object_config_is_invalid() {
        assert!(resolve(json!([1, 2]), Path::new("/cfg")).is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = parse("{not json", Path::new("/cfg")).unwrap_err();
        assert!(matches!(err, DeptraceError::ConfigParse { .. }));
    }

    #[test]
    fn load_resolves_against_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.json");
        std::fs::write(&path, r#"{"kv":{"engine":"leveldb","root":"db"},"output":"out.txt"}"#)
            .unwrap();

        let resolved = load(&path).unwrap();
        let base = dir.path();
        assert_eq!(
            resolved.value["kv"]["root"],
            base.join("db").to_string_lossy().as_ref()
        );
        assert_eq!(resolved.output(), Some(base.join("out.txt").to_str().unwrap()));
        assert_eq!(resolved.cleanup, Some(base.join("db")));
    }

    #[cfg(unix)]
    #[test]
    fn load_through_symlink_uses_link_directory() {
        let target_dir = tempfile::tempdir().unwrap();
        let link_dir = tempfile::tempdir().unwrap();
        let target = target_dir.path().join("conf.json");
        std::fs::write(&target, r#"{"kv":{"engine":"leveldb","root":"db"},"output":"out.txt"}"#)
            .unwrap();
        let link = link_dir.path().join("conf.json");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let resolved = load(&link).unwrap();
        assert_eq!(resolved.cleanup, Some(link_dir.path().join("db")));
        assert_eq!(
            resolved.output(),
            Some(link_dir.path().join("out.txt").to_str().unwrap())
        );
    }
}
