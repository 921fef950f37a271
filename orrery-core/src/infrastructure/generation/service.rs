use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::traits::TextGenerator;
use super::types::{GenerationError, ProgressSink};
use crate::domain::types::ChatMessage;

/// Owns a generation backend behind a single-initialization guard. The
/// backend's `prepare` runs at most once even under concurrent callers; a
/// failed attempt leaves the guard unset so a later call can retry.
pub struct GenerationService {
    backend: Arc<dyn TextGenerator>,
    ready: OnceCell<()>,
}

impl GenerationService {
    pub fn new(backend: Arc<dyn TextGenerator>) -> Self {
        Self {
            backend,
            ready: OnceCell::new(),
        }
    }

    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    pub async fn initialize(&self) -> Result<(), GenerationError> {
        self.ready
            .get_or_try_init(|| async {
                info!(backend = self.backend.id(), "Preparing generation backend");
                self.backend.prepare().await
            })
            .await
            .map(|_| ())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        progress: Option<ProgressSink>,
    ) -> Result<String, GenerationError> {
        self.initialize().await?;
        debug!(
            backend = self.backend.id(),
            messages = messages.len(),
            "Dispatching generation request"
        );
        self.backend.generate(messages, progress).await
    }
}
