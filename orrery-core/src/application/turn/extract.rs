use serde_json::{Map, Value};

/// A tool invocation parsed out of model output. Only the extractor builds
/// these; user input never does.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// What the model decided to do with the turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDecision {
    ToolCall(ToolCallRequest),
    Conversational(String),
}

/// Post-processing applied to output classified as conversational. Backends
/// differ in which chat-template role marker they echo into generated text,
/// so the marker rule is swappable.
pub trait ResponseCleanup: Send + Sync {
    fn clean(&self, raw: &str) -> String;
}

/// Keeps only the text after the last case-insensitive occurrence of a role
/// marker word. The default marker is "assistant".
pub struct RoleMarkerCleanup {
    marker: String,
}

impl RoleMarkerCleanup {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for RoleMarkerCleanup {
    fn default() -> Self {
        Self::new("assistant")
    }
}

impl ResponseCleanup for RoleMarkerCleanup {
    fn clean(&self, raw: &str) -> String {
        if self.marker.is_empty() {
            return raw.to_string();
        }
        let haystack = raw.to_ascii_lowercase();
        let needle = self.marker.to_ascii_lowercase();
        match haystack.rfind(&needle) {
            Some(position) => raw[position + self.marker.len()..].trim().to_string(),
            None => raw.to_string(),
        }
    }
}

/// Classifies raw model output as a tool call or a conversational answer.
///
/// Fenced code blocks are collapsed to their inner content first, then the
/// text qualifies as a tool call only when it ends in a balanced JSON object
/// whose `tool_name` is a non-empty string. Everything else is conversational
/// and goes through the cleanup strategy, which sees the raw text.
pub fn classify_model_output(raw: &str, cleanup: &dyn ResponseCleanup) -> ModelDecision {
    let unfenced = strip_code_fences(raw);
    match extract_trailing_request(&unfenced) {
        Some(request) => ModelDecision::ToolCall(request),
        None => ModelDecision::Conversational(cleanup.clean(raw)),
    }
}

fn strip_code_fences(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(open) = rest.find("```") else { break };
        let Some(close) = rest[open + 3..].find("```") else {
            break;
        };
        output.push_str(&rest[..open]);
        let inner = &rest[open + 3..open + 3 + close];
        output.push_str(strip_fence_tag(inner).trim());
        rest = &rest[open + 3 + close + 3..];
    }
    output.push_str(rest);
    output
}

// The optional language tag occupies the rest of the opening fence line.
fn strip_fence_tag(inner: &str) -> &str {
    match inner.find('\n') {
        Some(line_end)
            if inner[..line_end]
                .trim_end_matches('\r')
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_') =>
        {
            &inner[line_end + 1..]
        }
        _ => inner,
    }
}

fn extract_trailing_request(text: &str) -> Option<ToolCallRequest> {
    let trimmed = text.trim();
    // Gate: JSON that is not the terminal content of the response is never
    // extracted, so quoted schemas inside prose stay prose.
    if !trimmed.ends_with('}') {
        return None;
    }

    let bytes = trimmed.as_bytes();
    let mut depth: i64 = 0;
    for index in (0..bytes.len()).rev() {
        match bytes[index] {
            b'}' => depth += 1,
            b'{' => depth -= 1,
            _ => {}
        }
        if depth == 0 {
            // Single candidate; no retry with a wider boundary.
            return parse_candidate(&trimmed[index..]);
        }
    }
    None
}

fn parse_candidate(candidate: &str) -> Option<ToolCallRequest> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let name = value
        .get("tool_name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())?;
    let arguments = value
        .get("tool_arguments")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Some(ToolCallRequest {
        name: name.to_string(),
        arguments,
    })
}
