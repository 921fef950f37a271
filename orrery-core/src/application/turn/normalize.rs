use serde_json::Value;
use tracing::debug;

// Servers wrap payloads differently; each strategy targets one known shape
// and they are tried in priority order.
const STRATEGIES: &[(&str, fn(&Value) -> Option<Value>)] = &[
    ("result", top_level_result),
    ("structured-content", structured_content_result),
    ("text-content", text_content_result),
];

/// Reduces an opaque tool invocation result to a display string. Never fails;
/// unrecognized shapes fall back to a labeled pretty-print of the whole value.
pub fn normalize_tool_result(raw: &Value) -> String {
    for (label, extract) in STRATEGIES {
        if let Some(payload) = extract(raw) {
            debug!(strategy = label, "Extracted tool result payload");
            return render(&payload);
        }
    }
    format!("Output: {}", pretty(raw))
}

fn render(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => pretty(other),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn top_level_result(raw: &Value) -> Option<Value> {
    raw.get("result").cloned()
}

fn structured_content_result(raw: &Value) -> Option<Value> {
    raw.get("structuredContent")?.get("result").cloned()
}

fn text_content_result(raw: &Value) -> Option<Value> {
    raw.get("content")?
        .as_array()?
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .find_map(|item| {
            let text = item.get("text")?.as_str()?;
            let parsed: Value = serde_json::from_str(text).ok()?;
            parsed.get("result").cloned()
        })
}
