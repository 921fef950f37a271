use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "system" => Some(MessageRole::System),
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// One advertised tool as reported by a tool server. The input schema is kept
/// as raw JSON; servers differ in how much of JSON Schema they emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "inputSchema",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roles_round_trip_through_strings() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            assert_eq!(MessageRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::from_str("tool"), None);
    }

    #[test]
    fn chat_message_serializes_with_lowercase_role() {
        let message = ChatMessage::user("hello");
        let value = serde_json::to_value(&message).expect("serialize message");
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn descriptor_accepts_camel_case_schema_field() {
        let value = json!({
            "name": "lookup",
            "description": "Find a record",
            "inputSchema": {"type": "object", "properties": {"id": {"type": "string"}}}
        });
        let descriptor: ToolDescriptor =
            serde_json::from_value(value).expect("decode descriptor");
        assert_eq!(descriptor.name, "lookup");
        assert_eq!(descriptor.description.as_deref(), Some("Find a record"));
        assert!(descriptor.input_schema.is_some());
    }

    #[test]
    fn descriptor_tolerates_missing_optional_fields() {
        let descriptor: ToolDescriptor =
            serde_json::from_value(json!({"name": "ping"})).expect("decode descriptor");
        assert!(descriptor.description.is_none());
        assert!(descriptor.input_schema.is_none());
    }
}
