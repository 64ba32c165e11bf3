//! Error types for skyclock
//!
//! Tool failures are not errors at this level: they travel as
//! [`crate::tools::ToolError`] payloads inside the conversation. This enum
//! only covers failures that end an orchestration run.

use thiserror::Error;

/// Result type alias for skyclock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can terminate a run
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decision source error: {0}")]
    Decision(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Maximum recursion reached.")]
    MaxRecursion,

    #[error("No tool use found in response")]
    NoToolUse,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Machine-distinguishable kind, rendered next to the message by callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MaxRecursion => "max_recursion",
            Error::NoToolUse => "no_tool_use",
            Error::Decision(_) | Error::Http(_) | Error::Json(_) => "processing_error",
            Error::Config(_) => "config_error",
            Error::Io(_) | Error::Other(_) => "internal_error",
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
