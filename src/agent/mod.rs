//! Agent module: core orchestration.
//!
//! This module contains:
//! - Conversation types (Message, ContentBlock, Conversation)
//! - Decision sources (model-backed and heuristic)
//! - The bounded agent loop
//!
//! # Adding a New Decision Source
//!
//! See [`decision::DecisionRegistry`].

mod loop_impl;
mod message;
pub mod prompt;

pub mod decision;

// Re-exports for convenience
pub use decision::{ConverseClient, DecisionRegistry, DecisionSource, HeuristicDecision, Verdict};
pub use loop_impl::{AgentLoop, Outcome, ToolTrace};
pub use message::{
    ContentBlock, Conversation, Message, Role, ToolContent, ToolInvocationRequest, ToolResult,
};
