use serde_json::{Value, json};

use crate::error::Result;
use crate::io;
use crate::paths::Paths;

/// Built-in defaults, deep-merged under whatever `.flow/config.json`
/// supplies. Unknown keys in the user file are preserved untouched since
/// the store is not the authority on what future config keys mean.
pub fn defaults() -> Value {
    json!({
        "memory": {"enabled": false},
        "review": {"backend": "codex"}
    })
}

pub fn load(paths: &Paths) -> Result<Value> {
    let user: Option<Value> = io::read_json_opt(&paths.config_path())?;
    let mut merged = defaults();
    if let Some(user) = user {
        deep_merge(&mut merged, user);
    }
    Ok(merged)
}

pub fn save(paths: &Paths, config: &Value) -> Result<()> {
    io::write_json_atomic(&paths.config_path(), config)
}

/// Get a dotted-path key (`"review.backend"`) out of the merged config.
pub fn get(paths: &Paths, key: &str) -> Result<Option<Value>> {
    let config = load(paths)?;
    Ok(dotted_get(&config, key).cloned())
}

/// Set a dotted-path key in the user file (defaults are never written back
/// verbatim, only the override), creating nested objects as needed.
pub fn set(paths: &Paths, key: &str, value: Value) -> Result<()> {
    let user: Option<Value> = io::read_json_opt(&paths.config_path())?;
    let mut user = user.unwrap_or_else(|| json!({}));
    dotted_set(&mut user, key, value);
    save(paths, &user)
}

fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) if existing.is_object() && v.is_object() => {
                        deep_merge(existing, v);
                    }
                    _ => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

fn dotted_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in key.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn dotted_set(value: &mut Value, key: &str, new_value: Value) {
    let segments: Vec<&str> = key.split('.').collect();
    let mut current = value;
    for segment in &segments[..segments.len().saturating_sub(1)] {
        if !current.is_object() {
            *current = json!({});
        }
        let map = current.as_object_mut().unwrap();
        current = map.entry(segment.to_string()).or_insert_with(|| json!({}));
    }
    if !current.is_object() {
        *current = json!({});
    }
    if let Some(last) = segments.last() {
        current.as_object_mut().unwrap().insert(last.to_string(), new_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_overrides_leaf_and_keeps_siblings() {
        let mut base = json!({"memory": {"enabled": false}, "review": {"backend": "codex"}});
        deep_merge(&mut base, json!({"review": {"backend": "rp"}}));
        assert_eq!(base["review"]["backend"], "rp");
        assert_eq!(base["memory"]["enabled"], false);
    }

    #[test]
    fn dotted_get_and_set_roundtrip() {
        let mut v = json!({});
        dotted_set(&mut v, "review.backend", json!("rp"));
        assert_eq!(dotted_get(&v, "review.backend").unwrap(), &json!("rp"));
    }
}
