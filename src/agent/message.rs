//! Message types for agent communication

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolError;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A tool invocation requested by the decision source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Correlation id, echoed by the paired [`ToolResult`]
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolInvocationRequest {
    /// Create a request with a fresh correlation id
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), name, input)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Success or error payload of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolContent {
    Error(ToolError),
    Success(Value),
}

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: ToolContent,
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: ToolContent::Success(payload),
        }
    }

    pub fn error(tool_use_id: impl Into<String>, error: ToolError) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: ToolContent::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.content, ToolContent::Error(_))
    }

    /// Payload as JSON, errors rendered as `{"error", "message"}`
    pub fn payload(&self) -> Value {
        match &self.content {
            ToolContent::Success(value) => value.clone(),
            ToolContent::Error(err) => err.to_json(),
        }
    }
}

/// One block of a turn's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse(ToolInvocationRequest),
    ToolResult(ToolResult),
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }
}

/// A turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a user text turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant text turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant turn requesting tools
    pub fn assistant_with_tools(requests: &[ToolInvocationRequest]) -> Self {
        Self::assistant_blocks(requests.iter().cloned().map(ContentBlock::ToolUse).collect())
    }

    /// Create an assistant turn from blocks in emitted order
    pub fn assistant_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Create a user turn carrying tool results, order preserved
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::ToolResult).collect(),
        }
    }

    /// First text block, if any
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn tool_result_blocks(&self) -> impl Iterator<Item = &ToolResult> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    pub fn has_tool_results(&self) -> bool {
        self.tool_result_blocks().next().is_some()
    }
}

/// Append-only transcript of one interaction.
///
/// Turns can be added and read; nothing hands out mutable access to a turn
/// once it is in.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    turns: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.turns.push(message);
    }

    pub fn push_user_text(&mut self, text: impl Into<String>) {
        self.push(Message::user(text));
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Message> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Text of the most recent user turn that carries text
    pub fn latest_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .filter(|m| m.role == Role::User)
            .find_map(Message::first_text)
    }

    /// Tool invocation matching a correlation id
    pub fn find_request(&self, id: &str) -> Option<&ToolInvocationRequest> {
        self.turns.iter().flat_map(|m| m.content.iter()).find_map(|block| match block {
            ContentBlock::ToolUse(request) if request.id == id => Some(request),
            _ => None,
        })
    }
}
