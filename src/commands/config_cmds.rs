use serde_json::Value;

use crate::error::Result;
use crate::output::{Format, emit_ok};
use crate::paths::Paths;
use crate::store::{config, definition};

pub fn get(paths: &Paths, format: Format, key: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let value = config::get(paths, key)?;
    let out = serde_json::json!({ "key": key, "value": value });
    emit_ok(format, &out, |v| format!("{} = {}", v["key"].as_str().unwrap_or(key), v["value"]));
    Ok(())
}

pub fn set(paths: &Paths, format: Format, key: &str, raw_value: &str) -> Result<()> {
    definition::require_initialized(paths)?;
    let value: Value = serde_json::from_str(raw_value).unwrap_or_else(|_| Value::String(raw_value.to_string()));
    config::set(paths, key, value.clone())?;
    let out = serde_json::json!({ "key": key, "value": value });
    emit_ok(format, &out, |v| format!("{} = {}", v["key"].as_str().unwrap_or(key), v["value"]));
    Ok(())
}

/// `review-backend`: resolves which reviewer backend is active, per spec
/// §9 — `FLOW_REVIEW_BACKEND` env override, falling back to the
/// `review.backend` config key.
pub fn review_backend(paths: &Paths, format: Format) -> Result<()> {
    definition::require_initialized(paths)?;
    let backend = std::env::var("FLOW_REVIEW_BACKEND")
        .ok()
        .filter(|v| matches!(v.as_str(), "rp" | "codex" | "none"))
        .or_else(|| {
            config::get(paths, "review.backend")
                .ok()
                .flatten()
                .and_then(|v| v.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| "codex".to_string());
    let out = serde_json::json!({ "backend": backend });
    emit_ok(format, &out, |v| v["backend"].as_str().unwrap_or("codex").to_string());
    Ok(())
}
