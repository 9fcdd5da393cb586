use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{FlowError, Result};

/// Write `content` to `path` via temp-file-in-same-dir + fsync + rename, so
/// concurrent readers see either the old or the new content, never a partial
/// write.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_path = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));

    let write_result = (|| -> Result<()> {
        let file = fs::File::create(&tmp_path)?;
        use std::io::Write;
        let mut file = file;
        file.write_all(content)?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(FlowError::Io(e));
    }
    Ok(())
}

pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Serialize `value` as sorted-key, two-space-indented JSON terminated with a
/// newline, and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_value(value).map_err(|source| FlowError::Json {
        path: path.display().to_string(),
        source,
    })?;
    let sorted = sort_json_keys(raw);
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, serde_json::ser::PrettyFormatter::with_indent(b"  "));
    sorted.serialize(&mut ser).map_err(|source| FlowError::Json {
        path: path.display().to_string(),
        source,
    })?;
    buf.push(b'\n');
    write_atomic(path, &buf)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| FlowError::Json {
        path: path.display().to_string(),
        source,
    })
}

pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(read_json(path)?))
}

/// `serde_json`'s `Value::Object` is backed by a `Map` that preserves
/// insertion order unless the `preserve_order` feature is dropped; sort keys
/// explicitly so output is deterministic regardless of feature flags.
fn sort_json_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(String, serde_json::Value)> =
                map.into_iter().map(|(k, v)| (k, sort_json_keys(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k, v);
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_json_keys).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Sample {
        zeta: i32,
        alpha: i32,
    }

    #[test]
    fn write_json_atomic_sorts_keys_and_appends_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.json");
        write_json_atomic(&path, &Sample { zeta: 1, alpha: 2 }).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("{\n  \"alpha\": 2,\n  \"zeta\": 1\n}"));
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn write_atomic_leaves_old_content_on_success_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.txt");
        write_text_atomic(&path, "first").unwrap();
        write_text_atomic(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn read_json_opt_returns_none_for_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let result: Option<Sample> = read_json_opt(&path).unwrap();
        assert!(result.is_none());
    }
}
