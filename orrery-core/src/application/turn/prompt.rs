use serde_json::Value;

use crate::domain::types::{ChatMessage, ToolDescriptor};

const MISSING_DESCRIPTION: &str = "No description provided.";

/// Builds the `[system, user]` message pair for one turn. The system message
/// carries the full tool contract; no prior history is threaded through.
pub fn compile_turn_messages(catalog: &[ToolDescriptor], user_message: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(compose_system_instruction(catalog)),
        ChatMessage::user(user_message),
    ]
}

/// The system instruction states the assistant role, the JSON-or-prose
/// exclusivity rule, the tool-call schema, and then enumerates the catalog
/// 1-indexed in catalog order.
pub fn compose_system_instruction(catalog: &[ToolDescriptor]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a helpful, expert server assistant capable of utilizing external tools \
         to answer user queries (as opposed to answering them yourself).",
    );
    prompt.push_str(
        " Your primary function is to analyze the user's request and determine if one of \
         the AVAILABLE TOOLS is appropriate to answer the query.",
    );
    prompt.push_str(
        " If an APPROPRIATE tool is available, your entire response MUST be a valid JSON \
         object matching the Tool Use Request Format.",
    );
    prompt.push_str(
        " If NONE of the AVAILABLE TOOLS are relevant to the user's request, DO NOT return \
         a tool call. Only respond with RELEVANT conversational text.\n\n",
    );
    prompt.push_str(
        "**INSTRUCTION:** If a tool is to be utilized, your entire response MUST ONLY be a \
         valid JSON object matching the Tool Use Request Format. DO NOT output any other \
         text or explanation. If no tool is appropriate, you MUST NOT output any JSON or \
         tool call. Only respond with conversational text.\n\n",
    );
    prompt.push_str(
        "**Tool Use Request Format (MANDATORY JSON SCHEMA ONLY WHEN RETURNING A TOOL CALL):**\n",
    );
    prompt.push_str(
        "{\n  \"tool_name\": \"<name_of_tool_to_use>\",\n  \"tool_arguments\": {\n    \
         \"<argument_name>\": \"<value>\",\n    ...\n  }\n}\n\n",
    );
    prompt.push_str("**AVAILABLE TOOLS:**\n\n");

    for (index, tool) in catalog.iter().enumerate() {
        prompt.push_str(&format!("{}.  **Tool Name: {}**\n", index + 1, tool.name));
        let description = tool
            .description
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(MISSING_DESCRIPTION);
        prompt.push_str(&format!("    * Description: {description}\n"));
        match schema_properties(tool) {
            Some(properties) if !properties.is_empty() => {
                prompt.push_str("    * Arguments:");
                for (name, property) in properties {
                    let type_tag = property
                        .get("type")
                        .and_then(Value::as_str)
                        .filter(|tag| !tag.is_empty())
                        .unwrap_or("unknown");
                    let description = property
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    prompt.push_str(&format!("\n        * {name} ({type_tag}): {description}"));
                }
                prompt.push('\n');
            }
            _ => prompt.push_str("    * Arguments: None.\n"),
        }
        prompt.push('\n');
    }

    prompt
}

fn schema_properties(tool: &ToolDescriptor) -> Option<&serde_json::Map<String, Value>> {
    tool.input_schema
        .as_ref()
        .and_then(|schema| schema.get("properties"))
        .and_then(Value::as_object)
}
