//! Text-generation gateway
//!
//! - `types` - progress events and errors
//! - `traits` - the `TextGenerator` backend seam
//! - `service` - lazily initialized backend owner
//! - `clients` - concrete backend implementations

pub mod clients;
pub mod service;
pub mod traits;
pub mod types;

pub use clients::{OllamaClient, OpenAiClient};
pub use service::GenerationService;
pub use traits::TextGenerator;
pub use types::{GenerationError, GenerationProgress, ProgressSink};
