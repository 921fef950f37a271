use thiserror::Error;

use crate::infrastructure::generation::types::GenerationError;
use crate::infrastructure::tooling::TransportError;

/// Fatal turn-level failures. Catalog listing problems never reach this type;
/// the engine degrades to an empty catalog instead.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("text generation failed: {source}")]
    Generation {
        #[source]
        source: GenerationError,
    },
    #[error("dispatch of tool '{tool}' failed: {source}")]
    ToolDispatch {
        tool: String,
        #[source]
        source: TransportError,
    },
}

impl TurnError {
    pub fn generation(source: GenerationError) -> Self {
        Self::Generation { source }
    }

    pub fn tool_dispatch(tool: impl Into<String>, source: TransportError) -> Self {
        Self::ToolDispatch {
            tool: tool.into(),
            source,
        }
    }

    /// User-facing rendering without the source chain.
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Generation { source } => source.user_message(),
            TurnError::ToolDispatch { tool, .. } => {
                format!("The tool '{tool}' could not be executed.")
            }
        }
    }
}
