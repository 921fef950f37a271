use serde_json::Value;
use tracing::warn;

use crate::domain::types::ToolDescriptor;

/// Flattens a tool-listing reply into an ordered catalog. Servers answer
/// `tools/list` in one of three shapes: a bare array, `{"tools": [...]}`, or
/// a full JSON-RPC envelope `{"result": {"tools": [...]}}`.
pub fn normalize_tool_listing(raw: &Value) -> Vec<ToolDescriptor> {
    let entries = if let Some(list) = raw.as_array() {
        list.as_slice()
    } else if let Some(list) = raw.get("tools").and_then(Value::as_array) {
        list.as_slice()
    } else if let Some(list) = raw
        .get("result")
        .and_then(|result| result.get("tools"))
        .and_then(Value::as_array)
    {
        list.as_slice()
    } else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(descriptor) => Some(descriptor),
            Err(error) => {
                warn!(%error, "Skipping malformed tool entry in listing");
                None
            }
        })
        .collect()
}
