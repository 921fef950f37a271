//! Ollama client implementation

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::domain::types::ChatMessage;
use crate::infrastructure::generation::traits::TextGenerator;
use crate::infrastructure::generation::types::{
    GenerationError, GenerationProgress, ProgressSink,
};

/// Local Ollama backend (`/api/chat`, no auth). Responses stream as NDJSON;
/// every chunk advances the progress token count and the terminal chunk's
/// evaluation stats feed the final throughput estimate.
pub struct OllamaClient {
    base: HttpClientBase,
    model: String,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base: HttpClientBase::new("ollama".to_string(), endpoint.into(), None),
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn prepare(&self) -> Result<(), GenerationError> {
        let url = self.base.build_url("/api/tags");
        let listing: TagsResponse = self.base.get_no_auth(&url).await?;
        let available = listing.models.iter().any(|entry| {
            entry.name == self.model
                || entry
                    .name
                    .strip_suffix(":latest")
                    .is_some_and(|bare| bare == self.model)
        });
        if available {
            Ok(())
        } else {
            Err(GenerationError::model_not_found(&self.base.id, &self.model))
        }
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        progress: Option<ProgressSink>,
    ) -> Result<String, GenerationError> {
        let url = self.base.build_url("/api/chat");
        let payload = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: true,
        };

        info!(
            backend = self.base.id.as_str(),
            model = self.model.as_str(),
            messages = messages.len(),
            "Sending streaming request to Ollama"
        );

        let response = self.base.post_streaming_no_auth(&url, &payload).await?;
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut content = String::new();
        let mut tokens: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| GenerationError::network(&self.base.id, e))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);
                if line.is_empty() {
                    continue;
                }
                let parsed: OllamaChunk = serde_json::from_str(&line).map_err(|e| {
                    GenerationError::invalid_response(
                        &self.base.id,
                        format!("bad stream chunk: {e}"),
                    )
                })?;

                if let Some(message) = &parsed.message {
                    content.push_str(&message.content);
                }
                tokens += 1;

                if parsed.done {
                    if let Some(sink) = &progress {
                        sink(final_progress(tokens, &parsed));
                    }
                } else if let Some(sink) = &progress {
                    sink(GenerationProgress {
                        tokens,
                        tokens_per_second: None,
                    });
                }
            }
        }

        debug!(
            backend = self.base.id.as_str(),
            chars = content.len(),
            "Assembled streamed response"
        );
        Ok(content)
    }
}

fn final_progress(seen: u64, terminal: &OllamaChunk) -> GenerationProgress {
    let tokens = terminal.eval_count.unwrap_or(seen);
    let tokens_per_second = match (terminal.eval_count, terminal.eval_duration) {
        (Some(count), Some(nanos)) if nanos > 0 => {
            Some(count as f64 / (nanos as f64 / 1_000_000_000.0))
        }
        _ => None,
    };
    GenerationProgress {
        tokens,
        tokens_per_second,
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: String,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChunk {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    eval_count: Option<u64>,
    eval_duration: Option<u64>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}
