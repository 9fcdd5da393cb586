use clap::ValueEnum;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::FlowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum Format {
    Json,
    Text,
}

impl Default for Format {
    /// `json` is the default: flowctl is primarily invoked by agent
    /// orchestration, not typed interactively.
    fn default() -> Self {
        Self::Json
    }
}

/// Render a successful result per `format`. `text_line` is used only in
/// text mode; JSON mode wraps `value` in the `{"success": true, ...}`
/// envelope.
pub fn emit_ok<T: Serialize>(format: Format, value: &T, text_line: impl FnOnce(&T) -> String) {
    match format {
        Format::Json => {
            let mut envelope = json!({"success": true});
            if let Value::Object(map) = serde_json::to_value(value).unwrap_or(Value::Null) {
                if let Value::Object(ref mut env_map) = envelope {
                    for (k, v) in map {
                        env_map.insert(k, v);
                    }
                }
            } else {
                envelope["result"] = serde_json::to_value(value).unwrap_or(Value::Null);
            }
            println!("{envelope}");
        }
        Format::Text => println!("{}", text_line(value)),
    }
}

pub fn emit_err(format: Format, err: &FlowError) {
    match format {
        Format::Json => {
            let envelope = json!({"success": false, "error": err.to_string(), "code": err.code()});
            eprintln!("{envelope}");
        }
        Format::Text => eprintln!("error: {err}"),
    }
}
