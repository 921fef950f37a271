//! Orrery: a chat client core in which a language model decides, per turn,
//! whether to answer in prose or invoke one tool from a dynamically
//! discovered catalog.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::turn::{TurnEngine, TurnError, TurnOutcome};
pub use config::AppConfig;
pub use domain::types::{ChatMessage, MessageRole, ToolDescriptor};
pub use infrastructure::generation::{GenerationService, TextGenerator};
pub use infrastructure::tooling::ToolTransport;
