//! Tools module - assistant capabilities
//!
//! A tool is a named, schema-described unit of external functionality the
//! decision source can ask for. Every failure a tool hits is returned as a
//! [`ToolError`] payload, never raised past the [`ToolRunner`].

mod runner;
mod time;
mod weather;

pub use runner::ToolRunner;
pub use time::{TimeTool, TIME_TOOL};
pub use weather::{
    clamp_forecast_days, clamp_requested_days, OpenWeatherClient, WeatherTool, WEATHER_TOOL,
};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capability descriptor advertised to the decision source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What a tool execution produces
pub type ToolOutcome = std::result::Result<Value, ToolError>;

/// Tool trait - interface for all capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in invocation requests
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema for the input mapping
    fn parameters(&self) -> Value;

    /// Execute the tool with the given input mapping
    async fn execute(&self, input: Value) -> ToolOutcome;

    /// Convert to a descriptor for the decision source
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Failure category carried in a tool error payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    ToolNotFound,
    InvalidInput,
    InvalidTimezone,
    NotFound,
    Unauthorized,
    Forbidden,
    RequestError,
    DecodeError,
    NoApiKey,
    InternalError,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolNotFound => "tool_not_found",
            Self::InvalidInput => "invalid_input",
            Self::InvalidTimezone => "invalid_timezone",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::RequestError => "request_error",
            Self::DecodeError => "decode_error",
            Self::NoApiKey => "no_api_key",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error payload returned by a tool.
///
/// Serializes as `{"error": <kind>, "message": ..., "status_code"?, "body"?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ToolError {
    #[serde(rename = "error")]
    pub kind: ToolErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            body: None,
        }
    }

    pub fn with_status(mut self, status_code: u16, body: impl Into<String>) -> Self {
        self.status_code = Some(status_code);
        self.body = Some(body.into());
        self
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(ToolErrorKind::ToolNotFound, format!("Tool {name} not found"))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidInput, message)
    }

    pub fn request_error(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::RequestError, message)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({"error": self.kind.as_str(), "message": self.message})
        })
    }
}

/// Read a loosely typed string parameter: strings are trimmed, numbers are
/// rendered, blanks count as absent.
pub(crate) fn input_str(input: &Value, key: &str) -> Option<String> {
    match input.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a loosely typed integer parameter. Absent, null and non-numeric
/// values all read as `None`.
pub(crate) fn input_i64(input: &Value, key: &str) -> Option<i64> {
    match input.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
