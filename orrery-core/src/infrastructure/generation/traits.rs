//! Generation gateway trait

use async_trait::async_trait;

use super::types::{GenerationError, ProgressSink};
use crate::domain::types::ChatMessage;

/// A text-generation backend. One asynchronous call that may take unbounded
/// time and may stream progress through the sink; only the final assembled
/// text matters to callers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Stable identifier used in logs and error messages.
    fn id(&self) -> &str;

    /// One-time warm-up run before the first generation. The default does
    /// nothing.
    async fn prepare(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    /// Generate a completion for the message sequence.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        progress: Option<ProgressSink>,
    ) -> Result<String, GenerationError>;
}
