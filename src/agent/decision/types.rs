//! Wire types for the Bedrock Converse API response.

use serde::Deserialize;
use serde_json::Value;

/// Top-level Converse response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseResponse {
    pub output: ConverseOutput,
    pub stop_reason: String,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Output wrapper.
#[derive(Debug, Deserialize)]
pub struct ConverseOutput {
    pub message: Option<ConverseMessage>,
}

/// Assistant message.
#[derive(Debug, Deserialize)]
pub struct ConverseMessage {
    pub role: String,
    #[serde(default)]
    pub content: Vec<ConverseBlock>,
}

/// A single content block (text or tool use).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseBlock {
    pub text: Option<String>,
    pub tool_use: Option<ConverseToolUse>,
}

/// Tool invocation requested by the model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseToolUse {
    pub tool_use_id: String,
    pub name: String,
    #[serde(default = "empty_input")]
    pub input: Value,
}

fn empty_input() -> Value {
    Value::Object(Default::default())
}

/// Token usage.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: Option<usize>,
    pub output_tokens: Option<usize>,
    pub total_tokens: Option<usize>,
}
