//! skyclock - weather and time assistant
//!
//! This library provides the tool-use loop behind the assistant: a decision
//! source picks tools, the tool runner executes them, and the agent loop
//! feeds results back until an answer comes out or the budget runs out.

pub mod agent;
pub mod tools;
pub mod adapters;
pub mod config;
pub mod error;
pub mod ui;

pub use error::{Error, Result};
