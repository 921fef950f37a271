//! OpenAI-compatible client implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::domain::types::ChatMessage;
use crate::infrastructure::generation::traits::TextGenerator;
use crate::infrastructure::generation::types::{
    GenerationError, GenerationProgress, ProgressSink,
};

const API_PATH: &str = "/v1/chat/completions";

/// OpenAI-compatible backend (Bearer auth, non-streaming). Reports a single
/// terminal progress event from the usage stats when the server returns them.
pub struct OpenAiClient {
    base: HttpClientBase,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base: HttpClientBase::new("openai".to_string(), endpoint.into(), api_key),
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        progress: Option<ProgressSink>,
    ) -> Result<String, GenerationError> {
        let url = self.base.build_url(API_PATH);
        let payload = OpenAiRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.7,
            stream: false,
        };

        info!(
            backend = self.base.id.as_str(),
            model = self.model.as_str(),
            messages = messages.len(),
            "Sending request to OpenAI-compatible backend"
        );

        let response: OpenAiResponse = self.base.post_with_bearer(&url, &payload).await?;
        debug!(backend = self.base.id.as_str(), "Received completion");

        if let (Some(sink), Some(usage)) = (&progress, &response.usage) {
            if let Some(tokens) = usage.completion_tokens {
                sink(GenerationProgress {
                    tokens,
                    tokens_per_second: None,
                });
            }
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .ok_or_else(|| GenerationError::invalid_response(&self.base.id, "missing content"))
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: String,
    messages: &'a [ChatMessage],
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    completion_tokens: Option<u64>,
}
