//! Tool registration shared by the agents

use serde_json::{json, Value};
use wpcraft_error::{Error, ErrorKind, Result};
use wpcraft_llm::ToolDefinition;

/// The set of tools one agent exposes to the model.
///
/// Tools answer with plain text for the model to read. An `Err` is reserved
/// for calls that could not be carried out at all, such as an unknown tool
/// name or a subprocess that failed to spawn.
#[allow(async_fn_in_trait)]
pub trait Toolkit {
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<String>;

    fn tool_names(&self) -> Vec<String> {
        self.definitions().into_iter().map(|d| d.name).collect()
    }
}

/// Schema for the optional `lines` argument of the log tools
pub fn lines_parameter() -> Value {
    json!({
        "type": "object",
        "properties": {
            "lines": {
                "type": "integer",
                "description": "Number of log lines to retrieve (default: 50)",
                "minimum": 1
            }
        },
        "required": []
    })
}

/// Read an optional positive integer argument
pub fn optional_count(arguments: &Value, key: &'static str, default: usize) -> Result<usize> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::ToolArgumentsInvalid,
                    format!("'{}' must be a positive integer, got {}", key, value),
                )
                .with_context("argument", key)
            }),
    }
}
