use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::catalog::normalize_tool_listing;
use super::errors::TurnError;
use super::extract::{classify_model_output, ModelDecision, ResponseCleanup, RoleMarkerCleanup};
use super::normalize::normalize_tool_result;
use super::prompt::compile_turn_messages;
use crate::infrastructure::generation::service::GenerationService;
use crate::infrastructure::generation::types::ProgressSink;
use crate::infrastructure::tooling::ToolTransport;

/// The result of one turn. Owned by the engine, never mutated after
/// construction. Seconds fields carry fixed two-decimal renderings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub response_text: String,
    pub model_select_seconds: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_seconds: Option<String>,
    pub total_seconds: String,
}

/// Runs one user message through the catalog → prompt → generation →
/// classification → dispatch pipeline. Reentrant across turns; callers
/// serialize turns per conversation.
pub struct TurnEngine {
    generation: Arc<GenerationService>,
    transport: Arc<dyn ToolTransport>,
    cleanup: Arc<dyn ResponseCleanup>,
}

impl TurnEngine {
    pub fn new(generation: Arc<GenerationService>, transport: Arc<dyn ToolTransport>) -> Self {
        Self::with_cleanup(generation, transport, Arc::new(RoleMarkerCleanup::default()))
    }

    pub fn with_cleanup(
        generation: Arc<GenerationService>,
        transport: Arc<dyn ToolTransport>,
        cleanup: Arc<dyn ResponseCleanup>,
    ) -> Self {
        Self {
            generation,
            transport,
            cleanup,
        }
    }

    /// Fetches a fresh catalog for the transport's current tool set. Listing
    /// failures degrade to an empty catalog; the turn proceeds either way.
    pub async fn discover_tools(&self) -> Vec<crate::domain::types::ToolDescriptor> {
        match self.transport.list_tools().await {
            Ok(raw) => normalize_tool_listing(&raw),
            Err(error) => {
                warn!(%error, "Tool listing failed; continuing with empty catalog");
                Vec::new()
            }
        }
    }

    /// One request/response cycle: zero or one tool call, no retries.
    pub async fn process_turn(
        &self,
        user_message: &str,
        progress: Option<ProgressSink>,
    ) -> Result<TurnOutcome, TurnError> {
        let turn_start = Instant::now();

        let catalog = self.discover_tools().await;
        debug!(tools = catalog.len(), "Compiling turn prompt");
        let messages = compile_turn_messages(&catalog, user_message);

        let generated = self
            .generation
            .generate(&messages, progress)
            .await
            .map_err(TurnError::generation)?;
        let model_select = turn_start.elapsed();

        match classify_model_output(&generated, self.cleanup.as_ref()) {
            ModelDecision::ToolCall(request) => {
                info!(tool = request.name.as_str(), "Model selected a tool");
                // The tool name is dispatched as-is, without checking it
                // against the catalog snapshot; the transport owns the
                // authoritative tool set.
                let dispatch_start = Instant::now();
                let raw = self
                    .transport
                    .call_tool(&request.name, Value::Object(request.arguments.clone()))
                    .await
                    .map_err(|source| TurnError::tool_dispatch(request.name.clone(), source))?;
                let dispatch = dispatch_start.elapsed();
                let total = turn_start.elapsed();

                let output = normalize_tool_result(&raw);
                Ok(TurnOutcome {
                    response_text: format!("Response from '{}':\n{}", request.name, output),
                    model_select_seconds: format_seconds(model_select),
                    tool_call_seconds: Some(format_seconds(dispatch)),
                    total_seconds: format_seconds(total),
                })
            }
            ModelDecision::Conversational(text) => {
                info!("Model answered conversationally");
                Ok(TurnOutcome {
                    response_text: text,
                    model_select_seconds: format_seconds(model_select),
                    tool_call_seconds: None,
                    total_seconds: format_seconds(model_select),
                })
            }
        }
    }
}

fn format_seconds(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64())
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn seconds_render_with_two_decimals() {
        assert_eq!(format_seconds(Duration::from_millis(0)), "0.00");
        assert_eq!(format_seconds(Duration::from_millis(1234)), "1.23");
        assert_eq!(format_seconds(Duration::from_millis(1236)), "1.24");
        assert_eq!(format_seconds(Duration::from_secs(61)), "61.00");
    }
}
