//! Generation backend clients

mod base;
mod ollama;
mod openai;

pub use base::HttpClientBase;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
