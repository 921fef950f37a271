//! Tool-call orchestration
//!
//! One turn runs catalog → prompt → generation → classification → at most one
//! tool dispatch. The submodules are the pipeline stages in that order.

mod catalog;
mod engine;
mod errors;
mod extract;
mod normalize;
mod prompt;

#[cfg(test)]
mod tests;

pub use catalog::normalize_tool_listing;
pub use engine::{TurnEngine, TurnOutcome};
pub use errors::TurnError;
pub use extract::{
    classify_model_output, ModelDecision, ResponseCleanup, RoleMarkerCleanup, ToolCallRequest,
};
pub use normalize::normalize_tool_result;
pub use prompt::{compile_turn_messages, compose_system_instruction};
